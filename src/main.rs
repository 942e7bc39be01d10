mod api;
mod clock;
mod config;
mod db;
mod error;
mod market;
mod pricing;
mod registry;
mod stats;
mod trade;
mod types;

use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db::Store;
use crate::error::Result;
use crate::stats::FortniteApiClient;
use crate::trade::SqliteTradeExecutor;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let store = Store::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    if cfg.stats_api_key.is_empty() {
        warn!("FORTNITE_API_KEY not set; stats requests go out unauthenticated");
    }
    info!(
        coins = cfg.coins.len(),
        ttl_secs = cfg.stats_ttl_secs,
        "Coin catalog: {}",
        cfg.coins.iter().map(|c| c.symbol.as_str()).collect::<Vec<_>>().join(", "),
    );

    let cfg = Arc::new(cfg);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let provider = Arc::new(FortniteApiClient::new(&cfg)?);
    let executor = Arc::new(SqliteTradeExecutor::new(cfg.clone(), store.clone(), clock.clone()));

    // HTTP API server
    let api_state = ApiState::new(cfg.clone(), store, provider, executor, clock);
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
