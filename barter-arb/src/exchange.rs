use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Exchange identifiers the scanner ships display names for, in catalogue order.
pub const SUPPORTED_EXCHANGES: [&str; 21] = [
    "binance",
    "okx",
    "coinbase",
    "kraken",
    "bybit",
    "kucoin",
    "mexc",
    "bitfinex",
    "bitget",
    "gateio",
    "crypto_com",
    "upbit",
    "whitebit",
    "poloniex",
    "bingx",
    "lbank",
    "bitstamp",
    "gemini",
    "bitrue",
    "xt",
    "huobi",
];

/// Lower-cased exchange identifier (eg/ "binance", "gateio").
///
/// Identifiers are normalised on construction so `"Binance"` and `" binance"` compare equal.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Deserialize, Serialize,
)]
#[serde(from = "SmolStr", into = "SmolStr")]
pub struct ExchangeId(SmolStr);

impl ExchangeId {
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        Self(SmolStr::new(id.as_ref().trim().to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Human readable exchange name, falling back to the raw identifier.
    pub fn display_name(&self) -> &str {
        display_name(self.as_str()).unwrap_or(self.as_str())
    }
}

impl From<SmolStr> for ExchangeId {
    fn from(value: SmolStr) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ExchangeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<ExchangeId> for SmolStr {
    fn from(value: ExchangeId) -> Self {
        value.0
    }
}

impl AsRef<str> for ExchangeId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Display name for a known exchange identifier.
pub fn display_name(id: &str) -> Option<&'static str> {
    let name = match id {
        "binance" => "Binance",
        "okx" => "OKX",
        "coinbase" => "Coinbase",
        "kraken" => "Kraken",
        "bybit" => "Bybit",
        "kucoin" => "KuCoin",
        "mexc" => "MEXC",
        "bitfinex" => "Bitfinex",
        "bitget" => "Bitget",
        "gateio" => "Gate.io",
        "crypto_com" => "Crypto.com",
        "upbit" => "Upbit",
        "whitebit" => "WhiteBIT",
        "poloniex" => "Poloniex",
        "bingx" => "BingX",
        "lbank" => "LBank",
        "bitstamp" => "Bitstamp",
        "gemini" => "Gemini",
        "bitrue" => "Bitrue",
        "xt" => "XT",
        "huobi" => "Huobi",
        _ => return None,
    };

    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_id_normalises_case_and_whitespace() {
        assert_eq!(ExchangeId::new(" Binance "), ExchangeId::new("binance"));
        assert_eq!(ExchangeId::new("GateIO").as_str(), "gateio");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(ExchangeId::new("gateio").display_name(), "Gate.io");
        assert_eq!(ExchangeId::new("crypto_com").display_name(), "Crypto.com");
        assert_eq!(ExchangeId::new("someexchange").display_name(), "someexchange");
    }

    #[test]
    fn test_every_supported_exchange_has_a_display_name() {
        for id in SUPPORTED_EXCHANGES {
            assert!(display_name(id).is_some(), "missing display name for {id}");
        }
    }

    #[test]
    fn test_exchange_id_deserialises_lowercased() {
        let ids: Vec<ExchangeId> = serde_json::from_str(r#"["OKX", "kraken"]"#).unwrap();
        assert_eq!(ids, vec![ExchangeId::new("okx"), ExchangeId::new("kraken")]);
    }
}
