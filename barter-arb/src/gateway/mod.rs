use crate::{
    error::GatewayError, exchange::ExchangeId, market::MarketMeta, network::CurrencyInfo,
    ticker::Tickers,
};
use async_trait::async_trait;
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::sync::Arc;

/// In-memory [`ExchangeGateway`] backed by preloaded snapshots.
pub mod memory;

/// [`ExchangeGateway`] reading one JSON snapshot file per exchange from a directory.
pub mod snapshot;

/// [`ExchangeGateway`] polling a market data service over HTTP, with ticker retries.
pub mod http;

pub use http::{HttpGateway, RetryPolicy};
pub use memory::MemoryGateway;
pub use snapshot::SnapshotGateway;

/// Market metadata and currency network info of one exchange.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct MarketData {
    #[serde(default)]
    pub markets: FnvHashMap<SmolStr, MarketMeta>,
    #[serde(default)]
    pub currencies: FnvHashMap<SmolStr, CurrencyInfo>,
}

/// Everything the detection pipeline needs from one exchange for one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeSnapshot {
    pub exchange: ExchangeId,
    pub markets: MarketData,
    pub tickers: Tickers,
}

/// Source of exchange market data consumed by a [`Scanner`](crate::scan::Scanner).
///
/// Transport concerns (authentication, rate limiting, retries) live behind this trait.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Load market metadata and currency networks. Failure excludes the exchange from a scan.
    async fn load_markets(&self, exchange: &ExchangeId) -> Result<MarketData, GatewayError>;

    /// Fetch the latest tickers. Implementations should return partial or empty maps rather
    /// than fail once their own retries are exhausted.
    async fn fetch_tickers(&self, exchange: &ExchangeId) -> Result<Tickers, GatewayError>;
}

#[async_trait]
impl<G> ExchangeGateway for Box<G>
where
    G: ExchangeGateway + ?Sized,
{
    async fn load_markets(&self, exchange: &ExchangeId) -> Result<MarketData, GatewayError> {
        (**self).load_markets(exchange).await
    }

    async fn fetch_tickers(&self, exchange: &ExchangeId) -> Result<Tickers, GatewayError> {
        (**self).fetch_tickers(exchange).await
    }
}

#[async_trait]
impl<G> ExchangeGateway for Arc<G>
where
    G: ExchangeGateway + ?Sized,
{
    async fn load_markets(&self, exchange: &ExchangeId) -> Result<MarketData, GatewayError> {
        (**self).load_markets(exchange).await
    }

    async fn fetch_tickers(&self, exchange: &ExchangeId) -> Result<Tickers, GatewayError> {
        (**self).fetch_tickers(exchange).await
    }
}
