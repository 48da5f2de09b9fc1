use crate::de::{de_opt_f64_lenient, de_opt_millis_lenient, value_as_f64};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::time::Duration;

/// Tickers of one exchange keyed by unified symbol.
pub type Tickers = FnvHashMap<SmolStr, Ticker>;

/// Normalised 24h ticker snapshot for a single market.
///
/// Field names follow the unified ticker shape most exchange connectors emit. The exchange
/// specific payload is kept verbatim in `info` and used as a fallback volume source.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    #[serde(default, deserialize_with = "de_opt_f64_lenient")]
    pub last: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64_lenient")]
    pub bid: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64_lenient")]
    pub ask: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64_lenient")]
    pub quote_volume: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64_lenient")]
    pub base_volume: Option<f64>,
    /// Milliseconds since epoch of the last exchange update.
    #[serde(default, deserialize_with = "de_opt_millis_lenient")]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub info: serde_json::Value,
}

impl Ticker {
    /// Usable market price: the last trade price, else the bid/ask mid.
    ///
    /// A reported but unusable last price (eg/ `0`) yields `None` rather than the mid.
    pub fn price(&self) -> Option<f64> {
        if let Some(last) = self.last {
            return Some(last).filter(|last| is_usable(*last));
        }

        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0).filter(|mid| is_usable(*mid)),
            _ => None,
        }
    }

    /// Determine if the ticker was updated within `max_age` of `now`.
    ///
    /// Tickers without a timestamp are always considered fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.timestamp {
            None => true,
            Some(timestamp) => {
                let age_ms = now.timestamp_millis().saturating_sub(timestamp);
                age_ms <= i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX)
            }
        }
    }

    /// Numeric value of a field inside the exchange specific payload.
    pub fn raw_f64(&self, field: &str) -> Option<f64> {
        self.info.get(field).and_then(value_as_f64)
    }
}

fn is_usable(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    #[test]
    fn test_ticker_price() {
        struct TestCase {
            input: Ticker,
            expected: Option<f64>,
        }

        let tests = vec![
            TestCase {
                // TC0: last price preferred over mid
                input: Ticker {
                    last: Some(101.0),
                    bid: Some(99.0),
                    ask: Some(100.0),
                    ..Ticker::default()
                },
                expected: Some(101.0),
            },
            TestCase {
                // TC1: mid used when last is missing
                input: Ticker {
                    bid: Some(99.0),
                    ask: Some(101.0),
                    ..Ticker::default()
                },
                expected: Some(100.0),
            },
            TestCase {
                // TC2: one-sided book yields no price
                input: Ticker {
                    bid: Some(99.0),
                    ..Ticker::default()
                },
                expected: None,
            },
            TestCase {
                // TC3: zero last does not fall back to mid
                input: Ticker {
                    last: Some(0.0),
                    bid: Some(1.0),
                    ask: Some(3.0),
                    ..Ticker::default()
                },
                expected: None,
            },
            TestCase {
                // TC4: negative last does not fall back to mid
                input: Ticker {
                    last: Some(-1.0),
                    bid: Some(1.0),
                    ask: Some(3.0),
                    ..Ticker::default()
                },
                expected: None,
            },
            TestCase {
                // TC5: empty ticker
                input: Ticker::default(),
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.price();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_ticker_freshness() {
        let max_age = Duration::from_secs(300);
        let at = |age_ms: i64| Ticker {
            timestamp: Some(now().timestamp_millis() - age_ms),
            ..Ticker::default()
        };

        assert!(Ticker::default().is_fresh(now(), max_age));
        assert!(at(0).is_fresh(now(), max_age));
        assert!(at(300_000).is_fresh(now(), max_age));
        assert!(!at(300_001).is_fresh(now(), max_age));
        assert!(at(-5_000).is_fresh(now(), max_age));
    }

    #[test]
    fn test_ticker_deserialises_lenient_fields() {
        let ticker: Ticker = serde_json::from_value(json!({
            "symbol": "BTC/USDT",
            "last": "64000.5",
            "bid": null,
            "ask": 64001,
            "quoteVolume": "not-a-number",
            "timestamp": 1700000000000u64,
            "info": { "volValue": "123.4" }
        }))
        .unwrap();

        assert_eq!(ticker.last, Some(64000.5));
        assert_eq!(ticker.bid, None);
        assert_eq!(ticker.ask, Some(64001.0));
        assert_eq!(ticker.quote_volume, None);
        assert_eq!(ticker.base_volume, None);
        assert_eq!(ticker.timestamp, Some(1_700_000_000_000));
        assert_eq!(ticker.raw_f64("volValue"), Some(123.4));
        assert_eq!(ticker.raw_f64("missing"), None);
    }
}
