use crate::de::de_opt_f64_lenient;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Default set of quote assets treated as USD-equivalent.
pub const DEFAULT_USD_QUOTES: [&str; 4] = ["USDT", "USD", "USDC", "BUSD"];

/// Whole-word tokens marking leveraged or inverse tokens, in addition to `<digits>L` / `<digits>S`.
const LEVERAGED_WORDS: [&str; 4] = ["UP", "DOWN", "BULL", "BEAR"];

/// Trading pair parsed from a unified `BASE/QUOTE` or `BASE/QUOTE:SETTLE` symbol.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct Symbol {
    pub base: SmolStr,
    pub quote: SmolStr,
    pub settle: Option<SmolStr>,
}

impl Symbol {
    /// Parse a unified symbol. Returns `None` for input without a `/` separator or with an
    /// empty base or quote.
    pub fn parse(symbol: &str) -> Option<Self> {
        let (base, rest) = symbol.split_once('/')?;
        let rest = rest.split('/').next().unwrap_or_default();
        let (quote, settle) = match rest.split_once(':') {
            Some((quote, settle)) => (quote, Some(settle)),
            None => (rest, None),
        };

        let base = base.trim();
        let quote = quote.trim();
        if base.is_empty() || quote.is_empty() {
            return None;
        }

        Some(Self {
            base: SmolStr::new(base),
            quote: SmolStr::new(quote),
            settle: settle
                .map(str::trim)
                .filter(|settle| !settle.is_empty())
                .map(SmolStr::new),
        })
    }
}

/// Split a unified symbol into `(base, quote)`, dropping any settlement suffix.
pub fn parse_symbol(symbol: &str) -> Option<(SmolStr, SmolStr)> {
    Symbol::parse(symbol).map(|symbol| (symbol.base, symbol.quote))
}

/// Set of quote assets considered USD-equivalent. Matching is case-insensitive.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct UsdQuotes(Vec<SmolStr>);

impl UsdQuotes {
    pub fn new<I, S>(quotes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            quotes
                .into_iter()
                .map(|quote| SmolStr::new(quote.as_ref().trim().to_uppercase()))
                .collect(),
        )
    }

    pub fn is_usd_quote(&self, quote: &str) -> bool {
        let quote = quote.trim();
        self.0
            .iter()
            .any(|usd| usd.as_str().eq_ignore_ascii_case(quote))
    }
}

impl Default for UsdQuotes {
    fn default() -> Self {
        Self::new(DEFAULT_USD_QUOTES)
    }
}

/// Per-market metadata reported by an exchange.
///
/// Absent flags are interpreted permissively: a market is spot and active unless the exchange
/// explicitly says otherwise.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct MarketMeta {
    /// Taker fee rate as a fraction (eg/ `0.001` for 0.1%).
    #[serde(default, deserialize_with = "de_opt_f64_lenient")]
    pub taker: Option<f64>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub spot: Option<bool>,
}

impl MarketMeta {
    pub fn is_spot(&self) -> bool {
        self.spot.unwrap_or(true)
    }

    pub fn is_active(&self) -> bool {
        self.active != Some(false)
    }

    /// Taker fee rate as a fraction, using `default` when unknown or nonsensical.
    pub fn taker_fee(&self, default: f64) -> f64 {
        self.taker
            .filter(|fee| fee.is_finite() && *fee >= 0.0)
            .unwrap_or(default)
    }
}

/// Check if a symbol names a leveraged or inverse token (eg/ `BTC3L/USDT`, `ETHUP/USDT` are
/// not matched, `BTC 3L/USDT`, `XRP-BULL/USDT` and `ADA DOWN/USDT` are).
///
/// Tokens are compared as whole words, where a word is a run of ASCII alphanumerics or `_`.
pub fn is_leveraged_token(symbol: &str) -> bool {
    symbol
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty())
        .any(is_leveraged_word)
}

fn is_leveraged_word(word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    if LEVERAGED_WORDS.contains(&upper.as_str()) {
        return true;
    }

    match upper.as_bytes().split_last() {
        Some((last, digits)) => {
            matches!(*last, b'L' | b'S')
                && !digits.is_empty()
                && digits.iter().all(u8::is_ascii_digit)
        }
        None => false,
    }
}

/// Determine if a market may take part in a scan: spot, active, USD-equivalent quote and not a
/// leveraged token.
pub fn symbol_is_eligible(market: &MarketMeta, symbol: &str, usd_quotes: &UsdQuotes) -> bool {
    if !market.is_spot() || !market.is_active() {
        return false;
    }

    let Some(parsed) = Symbol::parse(symbol) else {
        return false;
    };

    usd_quotes.is_usd_quote(&parsed.quote) && !is_leveraged_token(symbol)
}
