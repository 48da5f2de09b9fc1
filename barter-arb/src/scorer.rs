//! Per (buy exchange, sell exchange, symbol) evaluation of a scan.
//!
//! For one exchange pair, [`rank_symbols`] selects the common eligible symbols with the most
//! combined USD volume, and [`score`] runs each of them through the filter chain:
//!
//! ```text
//! tickers present & fresh -> prices -> sanity bound -> profit range -> volume floor -> chain
//! ```
//!
//! The first failing filter is reported as a [`Rejection`].

use crate::{
    config::ScanPolicy,
    gateway::ExchangeSnapshot,
    market::{Symbol, symbol_is_eligible},
    network::{ChainSelection, select_chain},
    opportunity::Candidate,
    scan::ScanRequest,
    stability::OpportunityKey,
    volume::estimate_usd_volume,
};
use chrono::{DateTime, Utc};
use derive_more::Display;
use fnv::FnvHashSet;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Filter that excluded a triple from the results.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Display,
    Deserialize,
    Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    #[display("malformed_symbol")]
    MalformedSymbol,
    #[display("missing_ticker")]
    MissingTicker,
    #[display("stale_ticker")]
    StaleTicker,
    #[display("missing_price")]
    MissingPrice,
    #[display("price_deviation")]
    PriceDeviation,
    #[display("profit_out_of_range")]
    ProfitOutOfRange,
    #[display("insufficient_volume")]
    InsufficientVolume,
    #[display("no_viable_chain")]
    NoViableChain,
    #[display("excluded_chain")]
    ExcludedChain,
    #[display("transfer_disabled")]
    TransferDisabled,
}

/// Caller thresholds of one scan, with excluded chains already canonicalised.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanFilters {
    pub min_profit: f64,
    pub max_profit: f64,
    pub min_volume_usd: f64,
    pub excluded_chains: FnvHashSet<SmolStr>,
    pub include_all_chains: bool,
}

impl ScanFilters {
    pub fn new(request: &ScanRequest, policy: &ScanPolicy) -> Self {
        Self {
            min_profit: request.min_profit,
            max_profit: request.max_profit,
            min_volume_usd: request.min_volume_usd,
            excluded_chains: policy.network.canonical_set(&request.exclude_chains),
            include_all_chains: request.include_all_chains,
        }
    }

    fn is_excluded(&self, network: &SmolStr) -> bool {
        !self.include_all_chains && self.excluded_chains.contains(network)
    }
}

/// Everything needed to evaluate the symbols of one exchange pair.
#[derive(Debug, Copy, Clone)]
pub struct PairContext<'a> {
    pub policy: &'a ScanPolicy,
    pub filters: &'a ScanFilters,
    pub buy: &'a ExchangeSnapshot,
    pub sell: &'a ExchangeSnapshot,
}

/// Symbol listed on both exchanges of a pair, with its estimated USD volume per leg.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSymbol {
    pub symbol: SmolStr,
    pub buy_volume_usd: f64,
    pub sell_volume_usd: f64,
}

impl RankedSymbol {
    pub fn combined_volume_usd(&self) -> f64 {
        self.buy_volume_usd + self.sell_volume_usd
    }
}

/// Result of evaluating one exchange pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairOutcome {
    pub candidates: Vec<Candidate>,
    pub symbols_evaluated: usize,
    pub rejections: BTreeMap<Rejection, usize>,
}

/// Raw percentage difference between sell and buy price.
pub fn spread_pct(buy_price: f64, sell_price: f64) -> f64 {
    (sell_price - buy_price) / buy_price * 100.0
}

/// Spread minus both taker fees, with fees given as fractions.
pub fn profit_pct(spread_pct: f64, buy_fee: f64, sell_fee: f64) -> f64 {
    spread_pct - (buy_fee * 100.0 + sell_fee * 100.0)
}

/// Symbols eligible on both exchanges of the pair, in no particular order.
pub fn eligible_symbols<'a>(ctx: &PairContext<'a>) -> Vec<&'a SmolStr> {
    let usd_quotes = &ctx.policy.volume.usd_quotes;
    ctx.buy
        .markets
        .markets
        .iter()
        .filter(|(symbol, buy_market)| symbol_is_eligible(buy_market, symbol, usd_quotes))
        .filter(|(symbol, _)| {
            ctx.sell
                .markets
                .markets
                .get(*symbol)
                .is_some_and(|sell_market| symbol_is_eligible(sell_market, symbol, usd_quotes))
        })
        .map(|(symbol, _)| symbol)
        .collect()
}

/// Eligible symbols sorted by combined USD volume (descending, ties by symbol) and truncated
/// to the policy symbol limit.
pub fn rank_symbols(ctx: &PairContext<'_>) -> Vec<RankedSymbol> {
    let mut ranked = eligible_symbols(ctx)
        .into_iter()
        .map(|symbol| RankedSymbol {
            symbol: symbol.clone(),
            buy_volume_usd: leg_volume(ctx.policy, ctx.buy, symbol),
            sell_volume_usd: leg_volume(ctx.policy, ctx.sell, symbol),
        })
        .collect::<Vec<_>>();

    ranked.sort_by(|a, b| {
        b.combined_volume_usd()
            .total_cmp(&a.combined_volume_usd())
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    ranked.truncate(ctx.policy.symbol_limit);
    ranked
}

fn leg_volume(policy: &ScanPolicy, snapshot: &ExchangeSnapshot, symbol: &str) -> f64 {
    let ticker = snapshot.tickers.get(symbol);
    let price = ticker.and_then(|ticker| ticker.price());
    estimate_usd_volume(&policy.volume, symbol, ticker, price, &snapshot.tickers).usd()
}

/// Run one ranked symbol of the pair through every filter.
pub fn score(
    ctx: &PairContext<'_>,
    ranked: &RankedSymbol,
    now: DateTime<Utc>,
) -> Result<Candidate, Rejection> {
    let symbol = ranked.symbol.as_str();
    let parsed = Symbol::parse(symbol).ok_or(Rejection::MalformedSymbol)?;

    let (Some(buy_ticker), Some(sell_ticker)) =
        (ctx.buy.tickers.get(symbol), ctx.sell.tickers.get(symbol))
    else {
        return Err(Rejection::MissingTicker);
    };

    let max_age = ctx.policy.ticker_max_age;
    if !buy_ticker.is_fresh(now, max_age) || !sell_ticker.is_fresh(now, max_age) {
        return Err(Rejection::StaleTicker);
    }

    let (Some(buy_price), Some(sell_price)) = (buy_ticker.price(), sell_ticker.price()) else {
        return Err(Rejection::MissingPrice);
    };

    if (sell_price - buy_price).abs() / buy_price > ctx.policy.max_price_deviation {
        return Err(Rejection::PriceDeviation);
    }

    let fee = |snapshot: &ExchangeSnapshot| {
        snapshot
            .markets
            .markets
            .get(symbol)
            .map_or(ctx.policy.default_taker_fee, |market| {
                market.taker_fee(ctx.policy.default_taker_fee)
            })
    };

    let spread = spread_pct(buy_price, sell_price);
    let profit = profit_pct(spread, fee(ctx.buy), fee(ctx.sell));
    if profit < ctx.filters.min_profit || profit > ctx.filters.max_profit {
        return Err(Rejection::ProfitOutOfRange);
    }

    if ranked.buy_volume_usd < ctx.filters.min_volume_usd
        || ranked.sell_volume_usd < ctx.filters.min_volume_usd
    {
        return Err(Rejection::InsufficientVolume);
    }

    let selection = select_chain(
        &ctx.policy.network,
        ctx.buy.markets.currencies.get(parsed.base.as_str()),
        ctx.sell.markets.currencies.get(parsed.base.as_str()),
        &ctx.filters.excluded_chains,
        ctx.filters.include_all_chains,
    );
    let chain = match selection {
        ChainSelection::Selected(chain) => chain,
        ChainSelection::NoCommonChain | ChainSelection::Unknown => {
            return Err(Rejection::NoViableChain);
        }
    };
    if ctx.filters.is_excluded(&chain.network) {
        return Err(Rejection::ExcludedChain);
    }
    if !chain.is_viable() {
        return Err(Rejection::TransferDisabled);
    }

    Ok(Candidate {
        key: OpportunityKey::new(symbol, &ctx.buy.exchange, &ctx.sell.exchange),
        symbol: ranked.symbol.clone(),
        quote: parsed.quote,
        buy_exchange: ctx.buy.exchange.clone(),
        sell_exchange: ctx.sell.exchange.clone(),
        buy_price,
        sell_price,
        spread_pct: spread,
        profit_pct: profit,
        buy_volume_usd: ranked.buy_volume_usd,
        sell_volume_usd: ranked.sell_volume_usd,
        chain,
    })
}

/// Rank and score every common symbol of the pair.
pub fn evaluate_pair(ctx: &PairContext<'_>, now: DateTime<Utc>) -> PairOutcome {
    let ranked = rank_symbols(ctx);
    let mut outcome = PairOutcome {
        symbols_evaluated: ranked.len(),
        ..PairOutcome::default()
    };

    for symbol in &ranked {
        match score(ctx, symbol, now) {
            Ok(candidate) => outcome.candidates.push(candidate),
            Err(rejection) => *outcome.rejections.entry(rejection).or_default() += 1,
        }
    }

    outcome
}
