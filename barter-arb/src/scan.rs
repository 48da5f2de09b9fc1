use crate::{
    config::ScanPolicy,
    error::{ScanError, ScanSide},
    exchange::ExchangeId,
    gateway::{ExchangeGateway, ExchangeSnapshot, MarketData},
    opportunity::Opportunity,
    scorer::{PairContext, PairOutcome, Rejection, ScanFilters, evaluate_pair},
    stability::{OpportunityKey, StabilityTracker},
    ticker::Tickers,
};
use chrono::{DateTime, Utc};
use fnv::{FnvHashMap, FnvHashSet};
use futures::future::join_all;
use itertools::{Itertools, iproduct};
use parking_lot::{Mutex, MutexGuard};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{collections::BTreeMap, time::Duration};
use tracing::{debug, info, warn};

/// Default minimum fee-adjusted profit, in percent.
pub const DEFAULT_MIN_PROFIT: f64 = 1.0;

/// Default maximum fee-adjusted profit, in percent. Larger spreads are usually bad data.
pub const DEFAULT_MAX_PROFIT: f64 = 20.0;

/// Default minimum 24h USD volume required on both legs.
pub const DEFAULT_MIN_VOLUME_USD: f64 = 100_000.0;

/// Parameters of one scan, as submitted by a user.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanRequest {
    pub buy_exchanges: Vec<ExchangeId>,
    pub sell_exchanges: Vec<ExchangeId>,
    pub min_profit: f64,
    pub max_profit: f64,
    #[serde(rename = "min_24h_vol_usd")]
    pub min_volume_usd: f64,
    pub exclude_chains: Vec<SmolStr>,
    pub include_all_chains: bool,
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            buy_exchanges: Vec::new(),
            sell_exchanges: Vec::new(),
            min_profit: DEFAULT_MIN_PROFIT,
            max_profit: DEFAULT_MAX_PROFIT,
            min_volume_usd: DEFAULT_MIN_VOLUME_USD,
            exclude_chains: vec![SmolStr::new_static("ETH")],
            include_all_chains: false,
        }
    }
}

impl ScanRequest {
    pub fn new<B, S>(buy_exchanges: B, sell_exchanges: S) -> Self
    where
        B: IntoIterator,
        B::Item: Into<ExchangeId>,
        S: IntoIterator,
        S::Item: Into<ExchangeId>,
    {
        Self {
            buy_exchanges: buy_exchanges.into_iter().map(Into::into).collect(),
            sell_exchanges: sell_exchanges.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Human readable progress log of a scan: `[HH:MM:SS] message` lines, mirrored to `tracing`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScanLog(Vec<String>);

impl ScanLog {
    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.push(message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.push(message);
    }

    fn push(&mut self, message: String) {
        self.0
            .push(format!("[{}] {message}", Utc::now().format("%H:%M:%S")));
    }

    pub fn lines(&self) -> &[String] {
        &self.0
    }

    /// Determine if any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.0.iter().any(|line| line.contains(needle))
    }
}

/// Counters describing the work done by a scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanStats {
    pub exchanges_requested: usize,
    pub exchanges_loaded: usize,
    pub pairs_evaluated: usize,
    pub symbols_evaluated: usize,
    pub opportunities: usize,
    pub rejections: BTreeMap<Rejection, usize>,
}

impl ScanStats {
    fn absorb(&mut self, outcome: &PairOutcome) {
        self.pairs_evaluated += 1;
        self.symbols_evaluated += outcome.symbols_evaluated;
        for (rejection, count) in &outcome.rejections {
            *self.rejections.entry(*rejection).or_default() += count;
        }
    }

    /// Number of triples excluded by any filter.
    pub fn rejected(&self) -> usize {
        self.rejections.values().sum()
    }
}

/// Output of one scan. Results follow the buy x sell x symbol enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanResponse {
    pub results: Vec<Opportunity>,
    pub logs: ScanLog,
    pub stats: ScanStats,
}

/// Drives full scans against an [`ExchangeGateway`], owning the [`StabilityTracker`] that
/// carries opportunity history from one scan to the next.
#[derive(Debug)]
pub struct Scanner<G> {
    gateway: G,
    policy: ScanPolicy,
    tracker: Mutex<StabilityTracker>,
}

impl<G> Scanner<G>
where
    G: ExchangeGateway,
{
    pub fn new(gateway: G, policy: ScanPolicy) -> Self {
        let tracker = StabilityTracker::new(policy.stability);
        Self::with_tracker(gateway, policy, tracker)
    }

    pub fn with_tracker(gateway: G, policy: ScanPolicy, tracker: StabilityTracker) -> Self {
        Self {
            gateway,
            policy,
            tracker: Mutex::new(tracker),
        }
    }

    pub fn policy(&self) -> &ScanPolicy {
        &self.policy
    }

    /// Lock the stability state shared by consecutive scans.
    pub fn tracker(&self) -> MutexGuard<'_, StabilityTracker> {
        self.tracker.lock()
    }

    /// Run a scan, judging ticker freshness against the wall clock once all data is gathered.
    pub async fn scan(&self, request: &ScanRequest) -> Result<ScanResponse, ScanError> {
        self.execute(request, None).await
    }

    /// Run a scan as of `now`.
    pub async fn scan_at(
        &self,
        request: &ScanRequest,
        now: DateTime<Utc>,
    ) -> Result<ScanResponse, ScanError> {
        self.execute(request, Some(now)).await
    }

    /// Run a scan, discarding it entirely if it does not finish within `timeout`.
    ///
    /// Stability state is only updated by a scan that completes.
    pub async fn scan_with_timeout(
        &self,
        request: &ScanRequest,
        timeout: Duration,
    ) -> Result<ScanResponse, ScanError> {
        tokio::time::timeout(timeout, self.scan(request))
            .await
            .map_err(|_| ScanError::Timeout(timeout))?
    }

    async fn execute(
        &self,
        request: &ScanRequest,
        now: Option<DateTime<Utc>>,
    ) -> Result<ScanResponse, ScanError> {
        let buy = normalise_exchanges(&request.buy_exchanges);
        let sell = normalise_exchanges(&request.sell_exchanges);

        let mut logs = ScanLog::default();
        logs.info("🚀 Starting scan");
        logs.info(format!(
            "Buy: [{}] | Sell: [{}]",
            buy.iter().join(", "),
            sell.iter().join(", ")
        ));
        if let Err(error) = self.validate(&buy, &sell) {
            logs.warn(format!("❌ {error}"));
            return Err(error);
        }

        let mut stats = ScanStats::default();
        let exchanges = buy.iter().chain(sell.iter()).unique().cloned().collect::<Vec<_>>();
        stats.exchanges_requested = exchanges.len();

        debug!(?buy, ?sell, min_profit = request.min_profit, "scan started");

        let snapshots = self.gather(&exchanges, &mut logs).await;
        stats.exchanges_loaded = snapshots.len();
        let now = now.unwrap_or_else(Utc::now);

        let filters = ScanFilters::new(request, &self.policy);
        let pairs = iproduct!(buy.iter(), sell.iter())
            .filter(|(buy, sell)| buy != sell)
            .filter_map(|(buy, sell)| Some((snapshots.get(buy)?, snapshots.get(sell)?)))
            .collect::<Vec<_>>();

        let outcomes = pairs
            .par_iter()
            .map(|&(buy, sell)| {
                let ctx = PairContext {
                    policy: &self.policy,
                    filters: &filters,
                    buy,
                    sell,
                };
                evaluate_pair(&ctx, now)
            })
            .collect::<Vec<_>>();

        let results = self.record(outcomes, now, &mut stats);
        stats.opportunities = results.len();

        debug!(rejections = ?stats.rejections, "scan rejections");
        logs.info(format!(
            "Scan finished: {} opportunities ({} symbols across {} pairs, {} rejected)",
            results.len(),
            stats.symbols_evaluated,
            stats.pairs_evaluated,
            stats.rejected()
        ));

        Ok(ScanResponse {
            results,
            logs,
            stats,
        })
    }

    fn validate(&self, buy: &[ExchangeId], sell: &[ExchangeId]) -> Result<(), ScanError> {
        if buy.is_empty() {
            return Err(ScanError::EmptyBuyExchanges);
        }
        if sell.is_empty() {
            return Err(ScanError::EmptySellExchanges);
        }

        let max = self.policy.max_exchanges_per_side;
        for (side, list) in [(ScanSide::Buy, buy), (ScanSide::Sell, sell)] {
            if list.len() > max {
                return Err(ScanError::TooManyExchanges {
                    side,
                    count: list.len(),
                    max,
                });
            }
        }

        Ok(())
    }

    /// Load markets for every exchange, then tickers for those that loaded.
    ///
    /// Market failures drop the exchange, ticker failures leave it with no tickers.
    async fn gather(
        &self,
        exchanges: &[ExchangeId],
        logs: &mut ScanLog,
    ) -> FnvHashMap<ExchangeId, ExchangeSnapshot> {
        let markets = join_all(exchanges.iter().map(|exchange| async move {
            (exchange, self.gateway.load_markets(exchange).await)
        }))
        .await;

        let mut loaded: Vec<(&ExchangeId, MarketData)> = Vec::with_capacity(markets.len());
        for (exchange, result) in markets {
            match result {
                Ok(markets) => {
                    logs.info(format!("✓ Loaded markets → {}", exchange.display_name()));
                    loaded.push((exchange, markets));
                }
                Err(error) => {
                    warn!(%exchange, %error, "failed to load markets, skipping exchange");
                    logs.warn(format!(
                        "⚠️ Skipped {} (load failed)",
                        exchange.display_name()
                    ));
                }
            }
        }

        let tickers = join_all(loaded.iter().map(|(exchange, _)| async move {
            self.gateway.fetch_tickers(exchange).await
        }))
        .await;

        loaded
            .into_iter()
            .zip(tickers)
            .map(|((exchange, markets), result)| {
                let tickers = match result {
                    Ok(tickers) => {
                        logs.info(format!("✓ Fetched tickers → {}", exchange.display_name()));
                        tickers
                    }
                    Err(error) => {
                        warn!(%exchange, %error, "failed to fetch tickers, continuing without");
                        logs.warn(format!(
                            "⚠️ No tickers from {}",
                            exchange.display_name()
                        ));
                        Tickers::default()
                    }
                };

                let snapshot = ExchangeSnapshot {
                    exchange: exchange.clone(),
                    markets,
                    tickers,
                };
                (exchange.clone(), snapshot)
            })
            .collect()
    }

    /// Annotate candidates with stability in enumeration order, then close out the scan.
    fn record(
        &self,
        outcomes: Vec<PairOutcome>,
        now: DateTime<Utc>,
        stats: &mut ScanStats,
    ) -> Vec<Opportunity> {
        let mut tracker = self.tracker.lock();
        let mut current = FnvHashSet::<OpportunityKey>::default();
        let mut results = Vec::new();

        for outcome in outcomes {
            stats.absorb(&outcome);
            for candidate in outcome.candidates {
                let (stability, expiry) =
                    tracker.record_observation(&candidate.key, candidate.profit_pct, now);
                current.insert(candidate.key.clone());
                results.push(candidate.into_opportunity(stability, expiry));
            }
        }

        tracker.reconcile(current);
        results
    }
}

/// Lower-case and de-duplicate exchange ids, keeping first occurrence order.
fn normalise_exchanges(exchanges: &[ExchangeId]) -> Vec<ExchangeId> {
    exchanges
        .iter()
        .map(|exchange| ExchangeId::new(exchange.as_str()))
        .filter(|exchange| !exchange.as_str().is_empty())
        .unique()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;

    #[test]
    fn test_scan_request_defaults() {
        let request: ScanRequest =
            serde_json::from_str(r#"{ "buy_exchanges": ["Binance"], "sell_exchanges": ["okx"] }"#)
                .unwrap();

        assert_eq!(request.buy_exchanges, vec![ExchangeId::new("binance")]);
        assert_eq!(request.min_profit, 1.0);
        assert_eq!(request.max_profit, 20.0);
        assert_eq!(request.min_volume_usd, 100_000.0);
        assert_eq!(request.exclude_chains, vec![SmolStr::new("ETH")]);
        assert!(!request.include_all_chains);
    }

    #[test]
    fn test_scan_request_settings_field_names() {
        let request: ScanRequest = serde_json::from_str(
            r#"{
                "buy_exchanges": ["kraken"],
                "sell_exchanges": ["gateio"],
                "min_profit": 0.5,
                "max_profit": 10,
                "min_24h_vol_usd": 25000,
                "exclude_chains": [],
                "include_all_chains": true
            }"#,
        )
        .unwrap();

        assert_eq!(request.min_profit, 0.5);
        assert_eq!(request.max_profit, 10.0);
        assert_eq!(request.min_volume_usd, 25_000.0);
        assert!(request.exclude_chains.is_empty());
        assert!(request.include_all_chains);
    }

    #[test]
    fn test_normalise_exchanges() {
        let actual = normalise_exchanges(&[
            ExchangeId::new("Binance"),
            ExchangeId::new("okx"),
            ExchangeId::new("binance"),
            ExchangeId::new(" "),
        ]);
        assert_eq!(actual, vec![ExchangeId::new("binance"), ExchangeId::new("okx")]);
    }

    #[tokio::test]
    async fn test_scan_validates_exchange_lists() {
        struct TestCase {
            input: ScanRequest,
            expected: ScanError,
        }

        let eleven = (0..11).map(|index| format!("exchange{index}")).collect::<Vec<_>>();

        let tests = vec![
            TestCase {
                // TC0: empty buy list
                input: ScanRequest::new(Vec::<ExchangeId>::new(), ["okx"]),
                expected: ScanError::EmptyBuyExchanges,
            },
            TestCase {
                // TC1: empty sell list
                input: ScanRequest::new(["okx"], Vec::<ExchangeId>::new()),
                expected: ScanError::EmptySellExchanges,
            },
            TestCase {
                // TC2: too many sell exchanges
                input: ScanRequest::new(["okx"], eleven.iter().map(String::as_str)),
                expected: ScanError::TooManyExchanges {
                    side: ScanSide::Sell,
                    count: 11,
                    max: 10,
                },
            },
        ];

        let scanner = Scanner::new(MemoryGateway::new(), ScanPolicy::default());
        for (index, test) in tests.into_iter().enumerate() {
            let actual = scanner.scan(&test.input).await.unwrap_err();
            assert_eq!(actual, test.expected, "TC{} failed", index);
            assert!(actual.is_configuration(), "TC{} failed", index);
        }
    }

    #[tokio::test]
    async fn test_scan_skips_unknown_exchanges() {
        let scanner = Scanner::new(MemoryGateway::new(), ScanPolicy::default());
        let response = scanner
            .scan(&ScanRequest::new(["binance"], ["okx"]))
            .await
            .unwrap();

        assert!(response.results.is_empty());
        assert_eq!(response.stats.exchanges_requested, 2);
        assert_eq!(response.stats.exchanges_loaded, 0);
        assert!(response.logs.lines()[0].ends_with("🚀 Starting scan"));
        assert!(response.logs.contains("Buy: [binance] | Sell: [okx]"));
        assert!(response.logs.contains("Skipped Binance (load failed)"));
        assert!(response.logs.contains("Scan finished: 0 opportunities"));
    }

    #[test]
    fn test_scanner_tracker_uses_policy_stability() {
        let mut policy = ScanPolicy::default();
        policy.stability.trail_capacity = 5;
        policy.stability.evict_after_scans = 7;

        let scanner = Scanner::new(MemoryGateway::new(), policy);
        assert_eq!(scanner.tracker().config(), &scanner.policy().stability);
        assert_eq!(scanner.tracker().config().trail_capacity, 5);
    }
}
