use super::{ExchangeGateway, MarketData};
use crate::{error::GatewayError, exchange::ExchangeId, ticker::Tickers};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

/// On-disk layout of one exchange snapshot: `{ "markets": {..}, "currencies": {..}, "tickers": {..} }`.
#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(flatten)]
    markets: MarketData,
    #[serde(default)]
    tickers: Tickers,
}

/// Gateway reading `<dir>/<exchange>.json` snapshot files.
///
/// Useful for replaying captured market data, or pairing with an external process that dumps
/// exchange state on an interval.
#[derive(Debug, Clone)]
pub struct SnapshotGateway {
    dir: PathBuf,
}

impl SnapshotGateway {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, exchange: &ExchangeId) -> PathBuf {
        self.dir.join(format!("{}.json", exchange.as_str()))
    }

    async fn read(&self, exchange: &ExchangeId) -> Result<SnapshotFile, GatewayError> {
        let path = self.path(exchange);
        let contents = tokio::fs::read_to_string(&path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                GatewayError::UnknownExchange(exchange.clone())
            } else {
                GatewayError::Io {
                    path: path.display().to_string(),
                    source,
                }
            }
        })?;

        debug!(%exchange, path = %path.display(), bytes = contents.len(), "read exchange snapshot");
        Ok(serde_json::from_str(&contents)?)
    }
}

#[async_trait]
impl ExchangeGateway for SnapshotGateway {
    async fn load_markets(&self, exchange: &ExchangeId) -> Result<MarketData, GatewayError> {
        self.read(exchange).await.map(|snapshot| snapshot.markets)
    }

    async fn fetch_tickers(&self, exchange: &ExchangeId) -> Result<Tickers, GatewayError> {
        self.read(exchange).await.map(|snapshot| snapshot.tickers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "barter-arb-{name}-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_snapshot_gateway_reads_markets_and_tickers() {
        let dir = scratch_dir("read");
        std::fs::write(
            dir.join("kraken.json"),
            r#"{
                "markets": {
                    "BTC/USD": { "taker": 0.0026, "active": true, "spot": true }
                },
                "currencies": {
                    "BTC": { "networks": { "BTC": { "withdraw": true, "deposit": true } } },
                    "XRP": { "networks": null }
                },
                "tickers": {
                    "BTC/USD": { "last": 64000.0, "quoteVolume": "1500000", "timestamp": 1700000000000 }
                }
            }"#,
        )
        .unwrap();

        let gateway = SnapshotGateway::new(&dir);
        let exchange = ExchangeId::new("Kraken");

        let markets = gateway.load_markets(&exchange).await.unwrap();
        assert_eq!(markets.markets["BTC/USD"].taker, Some(0.0026));
        assert!(markets.currencies["BTC"].networks["BTC"].can_withdraw());
        assert!(markets.currencies["XRP"].networks.is_empty());

        let tickers = gateway.fetch_tickers(&exchange).await.unwrap();
        assert_eq!(tickers["BTC/USD"].quote_volume, Some(1_500_000.0));

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_snapshot_gateway_missing_file_is_unknown_exchange() {
        let dir = scratch_dir("missing");
        let gateway = SnapshotGateway::new(&dir);

        let error = gateway
            .load_markets(&ExchangeId::new("okx"))
            .await
            .unwrap_err();
        assert!(matches!(error, GatewayError::UnknownExchange(_)));

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_snapshot_gateway_malformed_file_is_decode_error() {
        let dir = scratch_dir("malformed");
        std::fs::write(dir.join("okx.json"), "{ not json").unwrap();
        let gateway = SnapshotGateway::new(&dir);

        let error = gateway
            .fetch_tickers(&ExchangeId::new("okx"))
            .await
            .unwrap_err();
        assert!(matches!(error, GatewayError::Decode(_)));

        std::fs::remove_dir_all(dir).ok();
    }
}
