#![forbid(unsafe_code)]
#![warn(unused, rust_2018_idioms)]

//! # Barter-Arb
//! Cross-exchange spot arbitrage detection for the Barter ecosystem.
//!
//! Given market metadata and tickers from a set of buy and sell exchanges, a [`Scanner`]:
//! - normalises symbols and keeps spot, active, USD-quoted markets ([`market`]).
//! - estimates a comparable USD 24h volume per market ([`volume`]).
//! - computes spread and fee-adjusted profit per (buy, sell, symbol) triple ([`scorer`]).
//! - selects a settlement network both exchanges support ([`network`]).
//! - tracks how long each opportunity has persisted across scans ([`stability`]).
//!
//! Market data is sourced through the [`ExchangeGateway`] trait, with in-memory, snapshot
//! file and HTTP implementations provided in [`gateway`].
//!
//! ## Example
//! ```rust,no_run
//! use barter_arb::{ScanPolicy, ScanRequest, Scanner, gateway::SnapshotGateway};
//!
//! #[tokio::main]
//! async fn main() {
//!     let scanner = Scanner::new(SnapshotGateway::new("snapshots"), ScanPolicy::default());
//!
//!     let response = scanner
//!         .scan(&ScanRequest::new(["binance", "okx"], ["gateio", "kraken"]))
//!         .await
//!         .unwrap();
//!
//!     for opportunity in response.results {
//!         println!("{} {:.2}% via {}", opportunity.key, opportunity.profit_pct, opportunity.network);
//!     }
//! }
//! ```

/// [`ScanPolicy`] defaults and `ARB_*` environment overrides.
pub mod config;

/// Lenient deserialisers for loosely typed exchange payloads.
pub mod de;

/// All [`Error`](std::error::Error)s generated in Barter-Arb.
pub mod error;

/// [`ExchangeId`] and the catalogue of known exchanges.
pub mod exchange;

/// [`ExchangeGateway`] trait and its implementations.
pub mod gateway;

/// Symbol parsing and market eligibility.
pub mod market;

/// Settlement network canonicalisation and selection.
pub mod network;

/// Emitted [`Opportunity`] records and their presentation helpers.
pub mod opportunity;

/// Scan requests, responses and the [`Scanner`] orchestrating them.
pub mod scan;

/// Per-triple filters and exchange pair evaluation.
pub mod scorer;

/// Opportunity stability and remaining lifetime estimates across scans.
pub mod stability;

/// Normalised ticker snapshots.
pub mod ticker;

/// USD 24h volume estimation.
pub mod volume;

pub use config::ScanPolicy;
pub use error::{GatewayError, ScanError};
pub use exchange::ExchangeId;
pub use gateway::{ExchangeGateway, ExchangeSnapshot, MarketData};
pub use opportunity::{Opportunity, format_usd};
pub use scan::{ScanRequest, ScanResponse, Scanner};
pub use stability::{Expiry, OpportunityKey, Stability, StabilityTracker};
