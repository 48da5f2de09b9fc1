use crate::exchange::ExchangeId;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by an [`ExchangeGateway`](crate::gateway::ExchangeGateway).
///
/// These are collaborator failures: the affected exchange is skipped for the remainder of the
/// scan, the scan itself carries on.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no market data source configured for exchange: {0}")]
    UnknownExchange(ExchangeId),

    #[error("failed to load markets for {exchange}: {reason}")]
    LoadMarkets { exchange: ExchangeId, reason: String },

    #[error("failed to fetch tickers for {exchange}: {reason}")]
    FetchTickers { exchange: ExchangeId, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid gateway url: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to decode exchange snapshot: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read exchange snapshot {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Side of a scan request an exchange list belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, Deserialize, Serialize)]
pub enum ScanSide {
    #[display("buy")]
    Buy,
    #[display("sell")]
    Sell,
}

/// Errors that fail an entire scan.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ScanError {
    #[error("need at least one buy exchange")]
    EmptyBuyExchanges,

    #[error("need at least one sell exchange")]
    EmptySellExchanges,

    #[error("too many {side} exchanges: {count} requested, at most {max} allowed")]
    TooManyExchanges {
        side: ScanSide,
        count: usize,
        max: usize,
    },

    #[error("scan did not complete within {0:?}, partial results discarded")]
    Timeout(Duration),
}

impl ScanError {
    /// Determine if the error stems from an invalid scan request rather than a runtime limit.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_configuration(&self) -> bool {
        match self {
            ScanError::Timeout(_) => false,
            _ => true,
        }
    }
}
