use crate::{
    exchange::ExchangeId,
    network::SelectedChain,
    stability::{Expiry, OpportunityKey, Stability},
};
use serde::Serialize;
use smol_str::SmolStr;

/// Decimal places kept for prices in emitted records.
pub const PRICE_DECIMALS: i32 = 10;

/// Decimal places kept for percentages in emitted records.
pub const PERCENT_DECIMALS: i32 = 4;

/// A (symbol, buy exchange, sell exchange) triple that passed every filter of a scan.
///
/// Records are rebuilt from scratch on every scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub key: OpportunityKey,
    pub symbol: SmolStr,
    pub quote: SmolStr,
    pub buy_exchange: ExchangeId,
    pub buy_exchange_name: SmolStr,
    pub buy_price: f64,
    pub sell_exchange: ExchangeId,
    pub sell_exchange_name: SmolStr,
    pub sell_price: f64,
    /// Raw price difference in percent, before fees.
    pub spread_pct: f64,
    /// Spread minus both taker fees, in percent.
    pub profit_pct: f64,
    pub buy_volume_usd: f64,
    pub sell_volume_usd: f64,
    pub network: SmolStr,
    pub can_withdraw: bool,
    pub can_deposit: bool,
    pub stability: Stability,
    pub expiry: Expiry,
}

/// Scored triple awaiting its stability annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub key: OpportunityKey,
    pub symbol: SmolStr,
    pub quote: SmolStr,
    pub buy_exchange: ExchangeId,
    pub sell_exchange: ExchangeId,
    pub buy_price: f64,
    pub sell_price: f64,
    pub spread_pct: f64,
    pub profit_pct: f64,
    pub buy_volume_usd: f64,
    pub sell_volume_usd: f64,
    pub chain: SelectedChain,
}

impl Candidate {
    /// Build the emitted [`Opportunity`], rounding prices and percentages for presentation.
    pub fn into_opportunity(self, stability: Stability, expiry: Expiry) -> Opportunity {
        Opportunity {
            key: self.key,
            symbol: self.symbol,
            quote: self.quote,
            buy_exchange_name: SmolStr::new(self.buy_exchange.display_name()),
            buy_exchange: self.buy_exchange,
            buy_price: round_dp(self.buy_price, PRICE_DECIMALS),
            sell_exchange_name: SmolStr::new(self.sell_exchange.display_name()),
            sell_exchange: self.sell_exchange,
            sell_price: round_dp(self.sell_price, PRICE_DECIMALS),
            spread_pct: round_dp(self.spread_pct, PERCENT_DECIMALS),
            profit_pct: round_dp(self.profit_pct, PERCENT_DECIMALS),
            buy_volume_usd: self.buy_volume_usd,
            sell_volume_usd: self.sell_volume_usd,
            network: self.chain.network,
            can_withdraw: self.chain.can_withdraw,
            can_deposit: self.chain.can_deposit,
            stability,
            expiry,
        }
    }
}

/// Round `value` to `decimals` decimal places.
pub fn round_dp(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    if rounded.is_finite() { rounded } else { value }
}

/// Compact USD label: `$1.23B`, `$4.56M`, `$789K`, otherwise whole dollars.
pub fn format_usd(value: f64) -> String {
    if !value.is_finite() || value <= 0.0 {
        return "$0".to_string();
    }

    if value >= 1e9 {
        format!("${:.2}B", value / 1e9)
    } else if value >= 1e6 {
        format!("${:.2}M", value / 1e6)
    } else if value >= 1e3 {
        format!("${:.0}K", value / 1e3)
    } else {
        format!("${}", thousands(value.round() as u64))
    }
}

fn thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_usd() {
        struct TestCase {
            input: f64,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: billions
                input: 1_234_000_000.0,
                expected: "$1.23B",
            },
            TestCase {
                // TC1: millions
                input: 4_560_000.0,
                expected: "$4.56M",
            },
            TestCase {
                // TC2: thousands without decimals
                input: 789_400.0,
                expected: "$789K",
            },
            TestCase {
                // TC3: below a thousand
                input: 512.4,
                expected: "$512",
            },
            TestCase {
                // TC4: rounding up to a thousand keeps the separator
                input: 999.6,
                expected: "$1,000",
            },
            TestCase {
                // TC5: negative
                input: -5.0,
                expected: "$0",
            },
            TestCase {
                // TC6: NaN
                input: f64::NAN,
                expected: "$0",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(format_usd(test.input), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_round_dp() {
        assert_eq!(round_dp(1.234_567_89, 4), 1.2346);
        assert_eq!(round_dp(0.000_012_345_678_91, 10), 0.000_012_345_7);
        assert_eq!(round_dp(64_000.5, 10), 64_000.5);
    }

    #[test]
    fn test_candidate_into_opportunity() {
        let buy = ExchangeId::new("binance");
        let sell = ExchangeId::new("gateio");
        let candidate = Candidate {
            key: OpportunityKey::new("ABC/USDT", &buy, &sell),
            symbol: SmolStr::new("ABC/USDT"),
            quote: SmolStr::new("USDT"),
            buy_exchange: buy,
            sell_exchange: sell,
            buy_price: 1.000_000_000_04,
            sell_price: 1.02,
            spread_pct: 1.999_999_99,
            profit_pct: 1.799_999_99,
            buy_volume_usd: 250_000.0,
            sell_volume_usd: 300_000.0,
            chain: SelectedChain {
                network: SmolStr::new("TRC20"),
                can_withdraw: true,
                can_deposit: true,
            },
        };

        let opportunity = candidate.into_opportunity(Stability::New, Expiry::Unknown);
        assert_eq!(opportunity.key.as_str(), "ABC/USDT|binance>gateio");
        assert_eq!(opportunity.buy_exchange_name, "Binance");
        assert_eq!(opportunity.sell_exchange_name, "Gate.io");
        assert_eq!(opportunity.buy_price, 1.0);
        assert_eq!(opportunity.spread_pct, 2.0);
        assert_eq!(opportunity.profit_pct, 1.8);
        assert_eq!(opportunity.network, "TRC20");

        let json = serde_json::to_value(&opportunity).unwrap();
        assert_eq!(json["stability"], "new");
        assert_eq!(json["expiry"], "~unknown");
        assert_eq!(json["buy_exchange"], "binance");
    }
}
