use super::{ExchangeGateway, MarketData};
use crate::{error::GatewayError, exchange::ExchangeId, ticker::Tickers};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Bounded exponential backoff used when fetching tickers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the zero-based `attempt` failed: `base_delay * 2^attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Gateway polling a market data service exposing unified exchange data:
///
/// - `GET <base>/<exchange>/markets` -> [`MarketData`]
/// - `GET <base>/<exchange>/tickers` -> [`Tickers`]
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base: Url,
    retry: RetryPolicy,
}

impl HttpGateway {
    pub fn new(base: &str) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(DEFAULT_REQUEST_TIMEOUT).build()?;
        Self::with_client(client, base, RetryPolicy::default())
    }

    pub fn with_client(client: Client, base: &str, retry: RetryPolicy) -> Result<Self, GatewayError> {
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            client,
            base,
            retry,
        })
    }

    /// Endpoint url of a `resource` for `exchange`.
    pub fn endpoint(&self, exchange: &ExchangeId, resource: &str) -> Result<Url, GatewayError> {
        Ok(self.base.join(&format!("{}/{resource}", exchange.as_str()))?)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, GatewayError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ExchangeGateway for HttpGateway {
    async fn load_markets(&self, exchange: &ExchangeId) -> Result<MarketData, GatewayError> {
        let url = self.endpoint(exchange, "markets")?;
        self.get(url).await.map_err(|error| GatewayError::LoadMarkets {
            exchange: exchange.clone(),
            reason: error.to_string(),
        })
    }

    async fn fetch_tickers(&self, exchange: &ExchangeId) -> Result<Tickers, GatewayError> {
        let url = self.endpoint(exchange, "tickers")?;
        let attempts = self.retry.max_attempts.max(1);

        for attempt in 0..attempts {
            match self.get::<Tickers>(url.clone()).await {
                Ok(tickers) => return Ok(tickers),
                Err(error) if attempt + 1 < attempts => {
                    let delay = self.retry.delay(attempt);
                    debug!(
                        %exchange,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "ticker fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    warn!(%exchange, attempts, %error, "ticker fetch failed, continuing without tickers");
                }
            }
        }

        Ok(Tickers::default())
    }
}
