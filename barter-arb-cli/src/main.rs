use barter_arb::{
    ExchangeGateway, ExchangeId, ScanError, ScanPolicy, ScanRequest, ScanResponse, Scanner,
    config::env_or,
    exchange::SUPPORTED_EXCHANGES,
    format_usd,
    gateway::{HttpGateway, SnapshotGateway},
};
use chrono::Utc;
use std::{error::Error, time::Duration};
use tracing::{error, info, warn};

const DEFAULT_SNAPSHOT_DIR: &str = "snapshots";
const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 120;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let gateway = build_gateway()?;
    let request = load_request().await?;
    let policy = ScanPolicy::from_env();
    let interval = Duration::from_secs(env_or("ARB_SCAN_INTERVAL_SECS", 0u64));
    let timeout = Duration::from_secs(env_or("ARB_SCAN_TIMEOUT_SECS", DEFAULT_SCAN_TIMEOUT_SECS));

    let scanner = Scanner::new(gateway, policy);

    info!(
        buy = ?request.buy_exchanges,
        sell = ?request.sell_exchanges,
        min_profit = request.min_profit,
        max_profit = request.max_profit,
        min_volume_usd = request.min_volume_usd,
        symbol_limit = scanner.policy().symbol_limit,
        ticker_max_age_secs = scanner.policy().ticker_max_age.as_secs(),
        interval_secs = interval.as_secs(),
        "starting arbitrage scanner"
    );

    if interval.is_zero() {
        let response = scanner.scan_with_timeout(&request, timeout).await?;
        print_response(&response);
        return Ok(());
    }

    let scans = scan_loop(&scanner, &request, interval, timeout, tokio::signal::ctrl_c()).await?;
    info!(scans, "scanner stopped");

    Ok(())
}

/// Scan every `interval` until `shutdown` resolves, returning the number of completed scans.
///
/// A scan in flight when `shutdown` resolves is abandoned. Configuration errors end the loop.
async fn scan_loop<G, S>(
    scanner: &Scanner<G>,
    request: &ScanRequest,
    interval: Duration,
    timeout: Duration,
    shutdown: S,
) -> Result<usize, ScanError>
where
    G: ExchangeGateway,
    S: Future,
{
    tokio::pin!(shutdown);
    let mut ticks = tokio::time::interval(interval);
    let mut scans = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticks.tick() => {}
        }

        tokio::select! {
            _ = &mut shutdown => break,
            result = scanner.scan_with_timeout(request, timeout) => match result {
                Ok(response) => {
                    scans += 1;
                    print_response(&response);
                }
                Err(error) if error.is_configuration() => return Err(error),
                Err(error) => warn!(%error, "scan abandoned"),
            }
        }
    }

    info!("received shutdown signal, stopping scanner");
    Ok(scans)
}

/// Select the market data source from `ARB_GATEWAY` (`snapshot` | `http`).
fn build_gateway() -> Result<Box<dyn ExchangeGateway>, Box<dyn Error>> {
    let kind = std::env::var("ARB_GATEWAY").unwrap_or_else(|_| "snapshot".to_string());

    match kind.trim().to_lowercase().as_str() {
        "http" => {
            let url = std::env::var("ARB_GATEWAY_URL")
                .unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string());
            info!(%url, "using HTTP market data gateway");
            Ok(Box::new(HttpGateway::new(&url)?))
        }
        "snapshot" => {
            let dir = std::env::var("ARB_SNAPSHOT_DIR")
                .unwrap_or_else(|_| DEFAULT_SNAPSHOT_DIR.to_string());
            info!(%dir, "using snapshot market data gateway");
            Ok(Box::new(SnapshotGateway::new(dir)))
        }
        other => Err(format!("unsupported ARB_GATEWAY: {other} (expected snapshot or http)").into()),
    }
}

/// Read the scan request from `ARB_REQUEST_FILE`, otherwise build one from
/// `ARB_BUY_EXCHANGES` / `ARB_SELL_EXCHANGES` comma separated lists.
async fn load_request() -> Result<ScanRequest, Box<dyn Error>> {
    if let Ok(path) = std::env::var("ARB_REQUEST_FILE") {
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|error| format!("failed to read {path}: {error}"))?;
        let request = serde_json::from_str::<ScanRequest>(&contents)?;
        info!(%path, "loaded scan request");
        return Ok(request);
    }

    let exchanges = |key: &str, default: &str| -> Vec<ExchangeId> {
        std::env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ExchangeId::new)
            .collect()
    };

    Ok(ScanRequest::new(
        exchanges("ARB_BUY_EXCHANGES", SUPPORTED_EXCHANGES[0]),
        exchanges("ARB_SELL_EXCHANGES", SUPPORTED_EXCHANGES[1]),
    ))
}

fn print_response(response: &ScanResponse) {
    for line in response.logs.lines() {
        println!("{line}");
    }

    let mut results = response.results.iter().collect::<Vec<_>>();
    results.sort_by(|a, b| b.profit_pct.total_cmp(&a.profit_pct));

    if results.is_empty() {
        println!("[{}] No opportunities matched the filters", Utc::now().format("%H:%M:%S"));
        return;
    }

    println!(
        "{:<16} {:<12} {:<12} {:>14} {:>14} {:>8} {:>8} {:>9} {:>9} {:<7} {:<14} {}",
        "SYMBOL", "BUY", "SELL", "BUY PRICE", "SELL PRICE", "SPREAD", "PROFIT", "BUY VOL",
        "SELL VOL", "CHAIN", "STABILITY", "EXPIRY"
    );
    for opportunity in results {
        println!(
            "{:<16} {:<12} {:<12} {:>14} {:>14} {:>7.2}% {:>7.2}% {:>9} {:>9} {:<7} {:<14} {}",
            opportunity.symbol,
            opportunity.buy_exchange_name,
            opportunity.sell_exchange_name,
            opportunity.buy_price,
            opportunity.sell_price,
            opportunity.spread_pct,
            opportunity.profit_pct,
            format_usd(opportunity.buy_volume_usd),
            format_usd(opportunity.sell_volume_usd),
            opportunity.network,
            opportunity.stability,
            opportunity.expiry,
        );
    }

    match serde_json::to_string(&response.stats) {
        Ok(stats) => info!(%stats, "scan stats"),
        Err(error) => error!(%error, "failed to serialise scan stats"),
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if env_or("ARB_LOG_JSON", 0u8) == 1 {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .flatten_event(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
