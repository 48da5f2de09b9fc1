//! Settlement network selection between two exchanges.
//!
//! Exchanges name the same chain differently (eg/ "BEP20" vs "BSC"), so every network key is
//! canonicalised through a [`NetworkPolicy`] before the two sides are compared.

use crate::de::de_null_default;
use fnv::{FnvHashMap, FnvHashSet};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Default alias groups as `(canonical, aliases)`.
pub const DEFAULT_CHAIN_ALIASES: [(&str, &[&str]); 5] = [
    ("BSC", &["BEP20"]),
    ("MATIC", &["POLYGON"]),
    ("OP", &["OPTIMISM"]),
    ("ARB", &["ARBITRUM"]),
    ("TRC20", &["TRON"]),
];

/// Default preference order, cheapest transfers first.
pub const DEFAULT_CHAIN_PRIORITY: [&str; 9] =
    ["TRC20", "BSC", "SOL", "MATIC", "ARB", "OP", "TON", "AVAX", "ETH"];

/// Transfer capabilities of one asset on one network of one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct NetworkInfo {
    #[serde(default)]
    pub withdraw: Option<bool>,
    #[serde(default)]
    pub deposit: Option<bool>,
}

impl NetworkInfo {
    pub fn can_withdraw(&self) -> bool {
        self.withdraw.unwrap_or(false)
    }

    pub fn can_deposit(&self) -> bool {
        self.deposit.unwrap_or(false)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            withdraw: Some(self.can_withdraw() || other.can_withdraw()),
            deposit: Some(self.can_deposit() || other.can_deposit()),
        }
    }
}

/// Networks an exchange supports for one asset, keyed by the exchange's own network id.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct CurrencyInfo {
    #[serde(default, deserialize_with = "de_null_default")]
    pub networks: FnvHashMap<SmolStr, NetworkInfo>,
}

/// Chain alias table and low-fee preference order used to pick a settlement network.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkPolicy {
    aliases: FnvHashMap<SmolStr, SmolStr>,
    priority: Vec<SmolStr>,
}

impl NetworkPolicy {
    /// Construct a policy from `(canonical, aliases)` groups and a preference order.
    ///
    /// Names are upper-cased, and priority entries are canonicalised, so callers may use any
    /// alias spelling.
    pub fn new<G, A, P>(alias_groups: G, priority: P) -> Self
    where
        G: IntoIterator<Item = (SmolStr, A)>,
        A: IntoIterator<Item = SmolStr>,
        P: IntoIterator<Item = SmolStr>,
    {
        let mut aliases = FnvHashMap::default();
        for (canonical, group) in alias_groups {
            let canonical = upper(&canonical);
            for alias in group {
                aliases.insert(upper(&alias), canonical.clone());
            }
            aliases.insert(canonical.clone(), canonical);
        }

        let mut policy = Self {
            aliases,
            priority: Vec::new(),
        };
        policy.priority = priority
            .into_iter()
            .map(|network| policy.canonicalize(&network))
            .collect();
        policy
    }

    /// Canonical upper-case name for a network id. Idempotent.
    pub fn canonicalize(&self, network: &str) -> SmolStr {
        let network = upper(network);
        self.aliases.get(&network).cloned().unwrap_or(network)
    }

    pub fn priority(&self) -> &[SmolStr] {
        &self.priority
    }

    /// Canonicalise a list of excluded network ids.
    pub fn canonical_set<I, S>(&self, networks: I) -> FnvHashSet<SmolStr>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        networks
            .into_iter()
            .map(|network| self.canonicalize(network.as_ref()))
            .collect()
    }

    fn canonical_networks(&self, currency: &CurrencyInfo) -> BTreeMap<SmolStr, NetworkInfo> {
        let mut networks = BTreeMap::new();
        for (network, info) in &currency.networks {
            networks
                .entry(self.canonicalize(network))
                .and_modify(|existing: &mut NetworkInfo| *existing = existing.merge(*info))
                .or_insert(*info);
        }
        networks
    }
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_CHAIN_ALIASES.iter().map(|(canonical, aliases)| {
                (
                    SmolStr::new(canonical),
                    aliases.iter().map(SmolStr::new).collect::<Vec<_>>(),
                )
            }),
            DEFAULT_CHAIN_PRIORITY.into_iter().map(SmolStr::new),
        )
    }
}

/// Network chosen to move an asset from the buy exchange to the sell exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SelectedChain {
    /// Canonical network name.
    pub network: SmolStr,
    /// Withdrawals enabled on the buy exchange.
    pub can_withdraw: bool,
    /// Deposits enabled on the sell exchange.
    pub can_deposit: bool,
}

impl SelectedChain {
    pub fn is_viable(&self) -> bool {
        self.can_withdraw && self.can_deposit
    }
}

/// Outcome of [`select_chain`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum ChainSelection {
    Selected(SelectedChain),
    /// Both exchanges list the asset but share no allowed network.
    NoCommonChain,
    /// Network data for the asset is missing on at least one exchange.
    Unknown,
}

impl ChainSelection {
    pub fn selected(&self) -> Option<&SelectedChain> {
        match self {
            Self::Selected(chain) => Some(chain),
            _ => None,
        }
    }
}

/// Select the settlement network for moving an asset from `buy` to `sell`.
///
/// Prefers the first entry of the policy priority present on both sides, otherwise the
/// lexicographically smallest common network. `excluded` must already be canonical and is
/// ignored when `include_all` is set.
pub fn select_chain(
    policy: &NetworkPolicy,
    buy: Option<&CurrencyInfo>,
    sell: Option<&CurrencyInfo>,
    excluded: &FnvHashSet<SmolStr>,
    include_all: bool,
) -> ChainSelection {
    let (Some(buy), Some(sell)) = (buy, sell) else {
        return ChainSelection::Unknown;
    };

    let buy_networks = policy.canonical_networks(buy);
    let sell_networks = policy.canonical_networks(sell);

    let allowed = |network: &SmolStr| include_all || !excluded.contains(network);
    let candidates = buy_networks
        .keys()
        .filter(|network| sell_networks.contains_key(*network))
        .filter(|network| allowed(network))
        .collect::<Vec<_>>();

    let best = policy
        .priority()
        .iter()
        .find(|preferred| candidates.contains(preferred))
        .or_else(|| candidates.first().copied());

    let Some(network) = best else {
        return ChainSelection::NoCommonChain;
    };

    match (buy_networks.get(network), sell_networks.get(network)) {
        (Some(buy_info), Some(sell_info)) => ChainSelection::Selected(SelectedChain {
            network: network.clone(),
            can_withdraw: buy_info.can_withdraw(),
            can_deposit: sell_info.can_deposit(),
        }),
        _ => ChainSelection::Unknown,
    }
}

fn upper(network: &str) -> SmolStr {
    SmolStr::new(network.trim().to_uppercase())
}
