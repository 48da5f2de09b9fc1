//! Lenient deserialisers for exchange payloads.
//!
//! Exchanges disagree on whether numbers arrive as JSON numbers, numeric strings or `null`.
//! These helpers map anything unusable to `None` rather than failing the whole document.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Interpret a raw JSON [`Value`] as a finite `f64`, accepting numbers and numeric strings.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed.filter(|value| value.is_finite())
}

/// Deserialise an optional `f64` that may be encoded as a number, a string or `null`.
pub fn de_opt_f64_lenient<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

/// Deserialise an optional millisecond timestamp that may be encoded as a number or string.
pub fn de_opt_millis_lenient<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(value_as_f64)
        .map(|millis| millis as i64))
}

/// Deserialise `null` as `T::default()`.
pub fn de_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
