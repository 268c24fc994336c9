//! Print the quota state of every region recorded in the quota database.
//!
//! ```text
//! cargo run -p scout-ratelimit --example quota-status
//! cargo run -p scout-ratelimit --example quota-status -- Eastern_Europe
//! ```
//!
//! Configuration is read from the usual config file plus `SCOUT_*`
//! environment overrides, so `SCOUT_DATABASE_PATH` selects the database.

use scout_core::{AppConfig, LogFormat, LoggingConfig, RegionId};
use scout_ratelimit::{QuotaSnapshot, RateLimiterService};

fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

fn print_snapshot(snapshot: &QuotaSnapshot) {
    println!(
        "{:<20} day {:>3}/{:<3} hour {:>3}/{:<3} next {}  last {}",
        snapshot.region,
        snapshot.day_count,
        snapshot.day_limit,
        snapshot.hour_count,
        snapshot.hour_limit,
        snapshot.next_eligible_at.format("%Y-%m-%d %H:%M:%S"),
        snapshot
            .last_request_at
            .map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load_with_env()?;
    init_tracing(&config.logging);

    let limiter = RateLimiterService::from_config(&config).await?;

    let snapshots = match std::env::args().nth(1) {
        Some(name) => vec![limiter.status(&RegionId::new(name)?).await?],
        None => limiter.status_all().await?,
    };

    if snapshots.is_empty() {
        println!("No quota records yet");
    }
    for snapshot in &snapshots {
        print_snapshot(snapshot);
    }

    Ok(())
}
