use crate::{network::NetworkPolicy, stability::StabilityConfig, volume::VolumeConfig};
use std::{str::FromStr, time::Duration};

/// Default ticker staleness threshold.
pub const DEFAULT_TICKER_MAX_AGE: Duration = Duration::from_secs(300);

/// Default taker fee rate (0.1%) for markets that do not report one.
pub const DEFAULT_TAKER_FEE: f64 = 0.001;

/// Default maximum relative price difference between the two legs before the pair is treated
/// as mismatched data.
pub const DEFAULT_MAX_PRICE_DEVIATION: f64 = 0.5;

/// Default number of symbols evaluated per exchange pair, ranked by combined volume.
pub const DEFAULT_SYMBOL_LIMIT: usize = 1000;

/// Default maximum number of exchanges on each side of a scan request.
pub const DEFAULT_MAX_EXCHANGES_PER_SIDE: usize = 10;

/// Immutable parameters of the detection pipeline, injected into a
/// [`Scanner`](crate::scan::Scanner).
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPolicy {
    /// Tickers older than this are ignored.
    pub ticker_max_age: Duration,
    /// Taker fee rate as a fraction, used when a market reports none.
    pub default_taker_fee: f64,
    /// Maximum `|sell - buy| / buy` accepted.
    pub max_price_deviation: f64,
    /// Symbols evaluated per exchange pair.
    pub symbol_limit: usize,
    pub max_exchanges_per_side: usize,
    pub volume: VolumeConfig,
    pub network: NetworkPolicy,
    pub stability: StabilityConfig,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            ticker_max_age: DEFAULT_TICKER_MAX_AGE,
            default_taker_fee: DEFAULT_TAKER_FEE,
            max_price_deviation: DEFAULT_MAX_PRICE_DEVIATION,
            symbol_limit: DEFAULT_SYMBOL_LIMIT,
            max_exchanges_per_side: DEFAULT_MAX_EXCHANGES_PER_SIDE,
            volume: VolumeConfig::default(),
            network: NetworkPolicy::default(),
            stability: StabilityConfig::default(),
        }
    }
}

impl ScanPolicy {
    /// Construct a [`ScanPolicy`] from defaults overridden by `ARB_*` environment variables.
    ///
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construct a [`ScanPolicy`] from defaults overridden by the `ARB_*` values `lookup`
    /// returns.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            ticker_max_age: Duration::from_secs(parse_or(
                lookup("ARB_TICKER_MAX_AGE_SECS"),
                defaults.ticker_max_age.as_secs(),
            )),
            default_taker_fee: parse_or(lookup("ARB_DEFAULT_TAKER_FEE"), defaults.default_taker_fee),
            max_price_deviation: parse_or(
                lookup("ARB_MAX_PRICE_DEVIATION"),
                defaults.max_price_deviation,
            ),
            symbol_limit: parse_or(lookup("ARB_SYMBOL_LIMIT"), defaults.symbol_limit),
            max_exchanges_per_side: parse_or(
                lookup("ARB_MAX_EXCHANGES_PER_SIDE"),
                defaults.max_exchanges_per_side,
            ),
            stability: StabilityConfig {
                trail_capacity: parse_or(
                    lookup("ARB_TRAIL_CAPACITY"),
                    defaults.stability.trail_capacity,
                ),
                max_lifetime_samples: parse_or(
                    lookup("ARB_MAX_LIFETIME_SAMPLES"),
                    defaults.stability.max_lifetime_samples,
                ),
                max_tracked_keys: parse_or(
                    lookup("ARB_MAX_TRACKED_KEYS"),
                    defaults.stability.max_tracked_keys,
                ),
                evict_after_scans: parse_or(
                    lookup("ARB_EVICT_AFTER_SCANS"),
                    defaults.stability.evict_after_scans,
                ),
            },
            ..defaults
        }
    }
}

/// Read and parse an environment variable, falling back to `default`.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    parse_or(std::env::var(key).ok(), default)
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
