use super::{ExchangeGateway, MarketData};
use crate::{error::GatewayError, exchange::ExchangeId, ticker::Tickers};
use async_trait::async_trait;
use fnv::{FnvHashMap, FnvHashSet};

/// Gateway serving fixed snapshots, for tests and callers that fetch data themselves.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    exchanges: FnvHashMap<ExchangeId, (MarketData, Tickers)>,
    failing_markets: FnvHashSet<ExchangeId>,
    failing_tickers: FnvHashSet<ExchangeId>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exchange<E>(mut self, exchange: E, markets: MarketData, tickers: Tickers) -> Self
    where
        E: Into<ExchangeId>,
    {
        self.exchanges.insert(exchange.into(), (markets, tickers));
        self
    }

    /// Make [`ExchangeGateway::load_markets`] fail for `exchange`.
    pub fn with_failing_markets<E: Into<ExchangeId>>(mut self, exchange: E) -> Self {
        self.failing_markets.insert(exchange.into());
        self
    }

    /// Make [`ExchangeGateway::fetch_tickers`] fail for `exchange`.
    pub fn with_failing_tickers<E: Into<ExchangeId>>(mut self, exchange: E) -> Self {
        self.failing_tickers.insert(exchange.into());
        self
    }
}

#[async_trait]
impl ExchangeGateway for MemoryGateway {
    async fn load_markets(&self, exchange: &ExchangeId) -> Result<MarketData, GatewayError> {
        if self.failing_markets.contains(exchange) {
            return Err(GatewayError::LoadMarkets {
                exchange: exchange.clone(),
                reason: "configured to fail".to_string(),
            });
        }

        self.exchanges
            .get(exchange)
            .map(|(markets, _)| markets.clone())
            .ok_or_else(|| GatewayError::UnknownExchange(exchange.clone()))
    }

    async fn fetch_tickers(&self, exchange: &ExchangeId) -> Result<Tickers, GatewayError> {
        if self.failing_tickers.contains(exchange) {
            return Err(GatewayError::FetchTickers {
                exchange: exchange.clone(),
                reason: "configured to fail".to_string(),
            });
        }

        self.exchanges
            .get(exchange)
            .map(|(_, tickers)| tickers.clone())
            .ok_or_else(|| GatewayError::UnknownExchange(exchange.clone()))
    }
}
