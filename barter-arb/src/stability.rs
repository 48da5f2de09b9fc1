//! Temporal stability of detected opportunities across repeated scans.
//!
//! Each [`OpportunityKey`] carries a rolling trail of `(time, profit)` samples while it keeps
//! being detected, and a history of completed lifetimes once it disappears. The average
//! lifetime is used to estimate how long a currently observed opportunity has left.
//!
//! ```text
//! Unseen -> Observed (trail grows, capped) -> Expired (one lifetime sample) -> Observed ...
//! ```

use crate::exchange::ExchangeId;
use chrono::{DateTime, Utc};
use derive_more::Display;
use fnv::{FnvHashMap, FnvHashSet};
use serde::{Deserialize, Serialize, Serializer};
use smol_str::{SmolStr, format_smolstr};
use std::{collections::VecDeque, fmt};
use tracing::debug;

/// Identity of an opportunity across scans: `symbol|buy>sell`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Deserialize, Serialize)]
#[serde(transparent)]
pub struct OpportunityKey(SmolStr);

impl OpportunityKey {
    pub fn new(symbol: &str, buy: &ExchangeId, sell: &ExchangeId) -> Self {
        Self(format_smolstr!("{symbol}|{buy}>{sell}"))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// How long an opportunity has been continuously observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stability {
    /// First sighting.
    New,
    /// Observed for the given number of seconds.
    Observed(f64),
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stability::New => write!(f, "new"),
            Stability::Observed(secs) => write!(f, "{} observed", time_label(*secs)),
        }
    }
}

/// Estimated remaining lifetime of an opportunity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expiry {
    /// No completed lifetimes recorded for this key yet.
    Unknown,
    /// Already observed for longer than the average lifetime.
    PastAverage,
    /// Seconds left until the average lifetime is reached.
    Remaining(f64),
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiry::Unknown => write!(f, "~unknown"),
            Expiry::PastAverage => write!(f, "past avg"),
            Expiry::Remaining(secs) => write!(f, "~{} left", time_label(*secs)),
        }
    }
}

impl Serialize for Stability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Serialize for Expiry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Render a duration in seconds: whole seconds below 90s (`"42s"`), else minutes to one
/// decimal (`"3.2m"`).
pub fn time_label(secs: f64) -> String {
    if secs < 90.0 {
        format!("{}s", secs.trunc() as i64)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Bounds of the [`StabilityTracker`] store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct StabilityConfig {
    /// Most recent samples kept per trail.
    pub trail_capacity: usize,
    /// Most recent lifetime samples kept per key.
    pub max_lifetime_samples: usize,
    /// Upper bound on tracked keys, least recently seen evicted first.
    pub max_tracked_keys: usize,
    /// Keys absent for this many reconciles are dropped along with their history.
    pub evict_after_scans: u64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            trail_capacity: 30,
            max_lifetime_samples: 50,
            max_tracked_keys: 50_000,
            evict_after_scans: 100,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct KeyState {
    trail: VecDeque<(DateTime<Utc>, f64)>,
    lifetimes: VecDeque<f64>,
    last_seen_scan: u64,
}

impl KeyState {
    fn observed_secs(&self) -> Option<f64> {
        let (first, _) = self.trail.front()?;
        let (last, _) = self.trail.back()?;
        Some(((*last - *first).num_milliseconds() as f64 / 1000.0).max(0.0))
    }

    fn average_lifetime(&self) -> Option<f64> {
        if self.lifetimes.is_empty() {
            return None;
        }
        Some(self.lifetimes.iter().sum::<f64>() / self.lifetimes.len() as f64)
    }
}

/// Per-opportunity observation trails and lifetime history, owned by the scan lifecycle.
#[derive(Debug, Clone, Default)]
pub struct StabilityTracker {
    config: StabilityConfig,
    keys: FnvHashMap<OpportunityKey, KeyState>,
    last_seen: FnvHashSet<OpportunityKey>,
    scans: u64,
}

impl StabilityTracker {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &StabilityConfig {
        &self.config
    }

    /// Record that `key` was detected at `now` with `profit`, returning its stability and
    /// expiry estimate.
    pub fn record_observation(
        &mut self,
        key: &OpportunityKey,
        profit: f64,
        now: DateTime<Utc>,
    ) -> (Stability, Expiry) {
        let scans = self.scans;
        let capacity = self.config.trail_capacity.max(1);
        let state = self.keys.entry(key.clone()).or_insert_with(|| KeyState {
            last_seen_scan: scans,
            ..KeyState::default()
        });

        if state.trail.is_empty() {
            state.trail.push_back((now, profit));
            return (Stability::New, Expiry::Unknown);
        }

        state.trail.push_back((now, profit));
        while state.trail.len() > capacity {
            state.trail.pop_front();
        }

        let observed = state.observed_secs().unwrap_or_default();
        let expiry = match state.average_lifetime() {
            None => Expiry::Unknown,
            Some(average) => {
                let remaining = average - observed;
                if remaining <= 0.0 {
                    Expiry::PastAverage
                } else {
                    Expiry::Remaining(remaining)
                }
            }
        };

        (Stability::Observed(observed), expiry)
    }

    /// Close out a scan. Keys seen in the previous scan but absent from `current` record their
    /// observed lifetime and restart with an empty trail.
    pub fn reconcile(&mut self, current: FnvHashSet<OpportunityKey>) {
        self.scans += 1;

        for key in self.last_seen.difference(&current) {
            let Some(state) = self.keys.get_mut(key) else {
                continue;
            };

            if let Some(duration) = state.observed_secs().filter(|secs| *secs > 0.0) {
                state.lifetimes.push_back(duration);
                while state.lifetimes.len() > self.config.max_lifetime_samples.max(1) {
                    state.lifetimes.pop_front();
                }
            }
            state.trail.clear();
        }

        for key in &current {
            if let Some(state) = self.keys.get_mut(key) {
                state.last_seen_scan = self.scans;
            }
        }

        self.last_seen = current;
        self.evict();
    }

    fn evict(&mut self) {
        let scans = self.scans;
        let evict_after = self.config.evict_after_scans;
        let before = self.keys.len();

        self.keys
            .retain(|_, state| scans.saturating_sub(state.last_seen_scan) < evict_after);

        let max_keys = self.config.max_tracked_keys;
        if self.keys.len() > max_keys {
            let mut by_age = self
                .keys
                .iter()
                .map(|(key, state)| (state.last_seen_scan, key.clone()))
                .collect::<Vec<_>>();
            by_age.sort();

            let excess = self.keys.len() - max_keys;
            for (_, key) in by_age.into_iter().take(excess) {
                self.keys.remove(&key);
            }
        }

        let evicted = before - self.keys.len();
        if evicted > 0 {
            debug!(evicted, tracked = self.keys.len(), "evicted stale opportunity keys");
        }
    }

    /// Number of keys currently held in the store.
    pub fn tracked_keys(&self) -> usize {
        self.keys.len()
    }

    /// Completed lifetimes, in seconds, recorded for `key`.
    pub fn lifetimes(&self, key: &OpportunityKey) -> Vec<f64> {
        self.keys
            .get(key)
            .map(|state| state.lifetimes.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of samples in the current trail of `key`.
    pub fn trail_len(&self, key: &OpportunityKey) -> usize {
        self.keys.get(key).map_or(0, |state| state.trail.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + TimeDelta::seconds(secs)
    }

    fn key(symbol: &str) -> OpportunityKey {
        OpportunityKey::new(symbol, &ExchangeId::new("binance"), &ExchangeId::new("kraken"))
    }

    fn keys(keys: &[&OpportunityKey]) -> FnvHashSet<OpportunityKey> {
        keys.iter().map(|key| (*key).clone()).collect()
    }

    #[test]
    fn test_opportunity_key_format() {
        assert_eq!(key("BTC/USDT").as_str(), "BTC/USDT|binance>kraken");
    }

    #[test]
    fn test_time_label() {
        struct TestCase {
            input: f64,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: zero
                input: 0.0,
                expected: "0s",
            },
            TestCase {
                // TC1: fractional seconds truncated
                input: 42.9,
                expected: "42s",
            },
            TestCase {
                // TC2: just below the minute branch
                input: 89.9,
                expected: "89s",
            },
            TestCase {
                // TC3: minute branch
                input: 90.0,
                expected: "1.5m",
            },
            TestCase {
                // TC4: minutes to one decimal
                input: 192.0,
                expected: "3.2m",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = time_label(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_first_observation_is_new() {
        let mut tracker = StabilityTracker::default();
        let (stability, expiry) = tracker.record_observation(&key("BTC/USDT"), 1.5, t(0));

        assert_eq!(stability, Stability::New);
        assert_eq!(expiry, Expiry::Unknown);
        assert_eq!(stability.to_string(), "new");
        assert_eq!(expiry.to_string(), "~unknown");
    }

    #[test]
    fn test_observations_ten_seconds_apart() {
        let mut tracker = StabilityTracker::default();
        let key = key("BTC/USDT");

        tracker.record_observation(&key, 1.5, t(0));
        tracker.record_observation(&key, 1.6, t(10));
        let (stability, expiry) = tracker.record_observation(&key, 1.7, t(20));

        assert_eq!(stability, Stability::Observed(20.0));
        assert_eq!(stability.to_string(), "20s observed");
        assert_eq!(expiry, Expiry::Unknown);
    }

    #[test]
    fn test_reappearance_estimates_remaining_time() {
        let mut tracker = StabilityTracker::default();
        let key = key("ETH/USDT");

        tracker.record_observation(&key, 2.0, t(0));
        tracker.reconcile(keys(&[&key]));
        tracker.record_observation(&key, 2.0, t(50));
        tracker.reconcile(keys(&[&key]));

        // Disappears: one lifetime sample of 50s
        tracker.reconcile(keys(&[]));
        assert_eq!(tracker.lifetimes(&key), vec![50.0]);
        assert_eq!(tracker.trail_len(&key), 0);

        // Fresh reappearance
        let (stability, expiry) = tracker.record_observation(&key, 2.0, t(500));
        assert_eq!(stability, Stability::New);
        assert_eq!(expiry, Expiry::Unknown);

        let (stability, expiry) = tracker.record_observation(&key, 2.0, t(510));
        assert_eq!(stability, Stability::Observed(10.0));
        assert_eq!(expiry, Expiry::Remaining(40.0));
        assert_eq!(expiry.to_string(), "~40s left");
    }

    #[test]
    fn test_expiry_past_average() {
        let mut tracker = StabilityTracker::default();
        let key = key("SOL/USDT");

        tracker.record_observation(&key, 1.0, t(0));
        tracker.record_observation(&key, 1.0, t(30));
        tracker.reconcile(keys(&[&key]));
        tracker.reconcile(keys(&[]));

        tracker.record_observation(&key, 1.0, t(100));
        let (_, expiry) = tracker.record_observation(&key, 1.0, t(130));
        assert_eq!(expiry, Expiry::PastAverage);
        assert_eq!(expiry.to_string(), "past avg");
    }

    #[test]
    fn test_single_sample_disappearance_records_no_lifetime() {
        let mut tracker = StabilityTracker::default();
        let key = key("ADA/USDT");

        tracker.record_observation(&key, 1.0, t(0));
        tracker.reconcile(keys(&[&key]));
        tracker.reconcile(keys(&[]));

        assert!(tracker.lifetimes(&key).is_empty());
    }

    #[test]
    fn test_trail_capped() {
        let mut tracker = StabilityTracker::new(StabilityConfig {
            trail_capacity: 30,
            ..StabilityConfig::default()
        });
        let key = key("XRP/USDT");

        for second in 0..40 {
            tracker.record_observation(&key, 1.0, t(second));
        }

        // Oldest 10 samples dropped, so the trail spans 10s..=39s
        assert_eq!(tracker.trail_len(&key), 30);

        // Next sample pushes out 10s, leaving 11s..=40s
        let (stability, _) = tracker.record_observation(&key, 1.0, t(40));
        assert_eq!(stability, Stability::Observed(29.0));
        assert_eq!(tracker.trail_len(&key), 30);
    }

    #[test]
    fn test_lifetime_history_capped() {
        let mut tracker = StabilityTracker::new(StabilityConfig {
            max_lifetime_samples: 2,
            ..StabilityConfig::default()
        });
        let key = key("DOT/USDT");

        for (start, duration) in [(0, 10), (100, 20), (200, 30)] {
            tracker.record_observation(&key, 1.0, t(start));
            tracker.record_observation(&key, 1.0, t(start + duration));
            tracker.reconcile(keys(&[&key]));
            tracker.reconcile(keys(&[]));
        }

        assert_eq!(tracker.lifetimes(&key), vec![20.0, 30.0]);
    }

    #[test]
    fn test_keys_evicted_after_absent_scans() {
        let mut tracker = StabilityTracker::new(StabilityConfig {
            evict_after_scans: 3,
            ..StabilityConfig::default()
        });
        let gone = key("OLD/USDT");
        let stays = key("NEW/USDT");

        tracker.record_observation(&gone, 1.0, t(0));
        tracker.record_observation(&stays, 1.0, t(0));
        tracker.reconcile(keys(&[&gone, &stays]));
        assert_eq!(tracker.tracked_keys(), 2);

        for scan in 1..=3 {
            tracker.record_observation(&stays, 1.0, t(scan));
            tracker.reconcile(keys(&[&stays]));
        }

        assert_eq!(tracker.tracked_keys(), 1);
        assert_eq!(tracker.trail_len(&stays), 4);
        assert_eq!(tracker.trail_len(&gone), 0);
    }

    #[test]
    fn test_max_tracked_keys_evicts_least_recently_seen() {
        let mut tracker = StabilityTracker::new(StabilityConfig {
            max_tracked_keys: 2,
            ..StabilityConfig::default()
        });
        let first = key("A/USDT");
        let second = key("B/USDT");
        let third = key("C/USDT");

        tracker.record_observation(&first, 1.0, t(0));
        tracker.reconcile(keys(&[&first]));
        tracker.record_observation(&second, 1.0, t(1));
        tracker.reconcile(keys(&[&second]));
        tracker.record_observation(&third, 1.0, t(2));
        tracker.reconcile(keys(&[&third]));

        assert_eq!(tracker.tracked_keys(), 2);
        assert_eq!(tracker.trail_len(&first), 0);
        assert_eq!(tracker.trail_len(&third), 1);
    }

    #[test]
    fn test_stability_serialises_as_label() {
        let json = serde_json::to_string(&(Stability::Observed(192.0), Expiry::Remaining(42.0)))
            .unwrap();
        assert_eq!(json, r#"["3.2m observed","~42s left"]"#);
    }
}
