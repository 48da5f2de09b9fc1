//! Estimation of comparable USD 24h volume from heterogeneous exchange tickers.
//!
//! Exchanges report volume under different field names and in different currencies. The
//! estimator walks a fixed chain of fallbacks and reports which one produced the figure, or
//! [`VolumeEstimate::Unresolved`] when none did.

use crate::{
    market::{Symbol, UsdQuotes},
    ticker::{Ticker, Tickers},
};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Quote currencies tried, in order, when converting a non-USD volume into USD.
pub const DEFAULT_CONVERSION_QUOTES: [&str; 3] = ["USDT", "USDC", "USD"];

/// Alternate volume fields searched inside the exchange specific ticker payload.
pub const DEFAULT_RAW_VOLUME_FIELDS: [&str; 14] = [
    "quoteVolume",
    "baseVolume",
    "vol",
    "vol24h",
    "volCcy24h",
    "volValue",
    "turnover",
    "turnover24h",
    "quoteVolume24h",
    "amount",
    "value",
    "acc_trade_price_24h",
    "quote_volume_24h",
    "base_volume_24h",
];

/// Lookup tables used by the volume estimator.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VolumeConfig {
    pub usd_quotes: UsdQuotes,
    pub conversion_quotes: Vec<SmolStr>,
    pub raw_volume_fields: Vec<SmolStr>,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            usd_quotes: UsdQuotes::default(),
            conversion_quotes: DEFAULT_CONVERSION_QUOTES
                .into_iter()
                .map(SmolStr::new)
                .collect(),
            raw_volume_fields: DEFAULT_RAW_VOLUME_FIELDS
                .into_iter()
                .map(SmolStr::new)
                .collect(),
        }
    }
}

/// Which fallback produced a [`VolumeEstimate`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum VolumeSource {
    /// Reported quote volume of a USD-quoted market.
    QuoteVolume,
    /// Reported base volume multiplied by the market price.
    BaseVolume,
    /// Alternate field of the raw payload, already denominated in USD.
    RawField { field: SmolStr },
    /// Alternate field of the raw payload converted via a `QUOTE/<via>` ticker.
    RawFieldConverted { field: SmolStr, via: SmolStr },
    /// Reported quote volume converted via a `QUOTE/<via>` ticker.
    QuoteVolumeConverted { via: SmolStr },
}

/// Outcome of estimating a market's USD 24h volume.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum VolumeEstimate {
    Resolved { usd: f64, source: VolumeSource },
    Unresolved,
}

impl VolumeEstimate {
    /// Estimated USD volume, `0.0` when unresolved.
    pub fn usd(&self) -> f64 {
        match self {
            Self::Resolved { usd, .. } => *usd,
            Self::Unresolved => 0.0,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

/// Estimate the USD 24h volume of `symbol` on one exchange.
///
/// `price` is the market's current price if known and `tickers` are all tickers of the same
/// exchange, used to find a conversion rate for non-USD quotes. Never fails: malformed input
/// yields [`VolumeEstimate::Unresolved`].
pub fn estimate_usd_volume(
    config: &VolumeConfig,
    symbol: &str,
    ticker: Option<&Ticker>,
    price: Option<f64>,
    tickers: &Tickers,
) -> VolumeEstimate {
    let (Some(ticker), Some(parsed)) = (ticker, Symbol::parse(symbol)) else {
        return VolumeEstimate::Unresolved;
    };

    let quote = parsed.quote.to_uppercase();
    let usd_quoted = config.usd_quotes.is_usd_quote(&quote);
    let quote_volume = ticker.quote_volume.filter(|volume| *volume > 0.0);

    if usd_quoted {
        if let Some(usd) = quote_volume {
            return resolved(usd, VolumeSource::QuoteVolume);
        }
    }

    let base_volume = ticker.base_volume.filter(|volume| *volume > 0.0);
    if let (Some(base_volume), Some(price)) = (base_volume, price.filter(|price| *price > 0.0)) {
        if let Some(estimate) = checked(base_volume * price, VolumeSource::BaseVolume) {
            return estimate;
        }
    }

    let raw = config.raw_volume_fields.iter().find_map(|field| {
        ticker
            .raw_f64(field)
            .filter(|value| *value > 0.0)
            .map(|value| (field.clone(), value))
    });

    if let Some((field, raw)) = raw {
        if usd_quoted {
            return resolved(raw, VolumeSource::RawField { field });
        }

        if let Some((via, rate)) = conversion_rate(config, &quote, tickers) {
            if let Some(estimate) =
                checked(raw * rate, VolumeSource::RawFieldConverted { field, via })
            {
                return estimate;
            }
        }
    }

    if let Some(quote_volume) = quote_volume {
        if let Some((via, rate)) = conversion_rate(config, &quote, tickers) {
            if let Some(estimate) =
                checked(quote_volume * rate, VolumeSource::QuoteVolumeConverted { via })
            {
                return estimate;
            }
        }
    }

    // A USD market that reports exactly zero quote volume is genuinely idle, not unknown
    if usd_quoted && ticker.quote_volume == Some(0.0) {
        return resolved(0.0, VolumeSource::QuoteVolume);
    }

    VolumeEstimate::Unresolved
}

/// Price of `quote` in USD from the first available `QUOTE/<conversion>` ticker.
fn conversion_rate(config: &VolumeConfig, quote: &str, tickers: &Tickers) -> Option<(SmolStr, f64)> {
    config.conversion_quotes.iter().find_map(|via| {
        let symbol = format!("{quote}/{via}");
        tickers
            .get(symbol.as_str())
            .and_then(Ticker::price)
            .map(|rate| (via.clone(), rate))
    })
}

fn resolved(usd: f64, source: VolumeSource) -> VolumeEstimate {
    VolumeEstimate::Resolved { usd, source }
}

fn checked(usd: f64, source: VolumeSource) -> Option<VolumeEstimate> {
    usd.is_finite().then(|| resolved(usd, source))
}
