use crate::error::{AppError, Result};
use crate::types::{CoinProfile, Platform};

pub const STATS_API_URL: &str = "https://fortnite-api.com";

/// Fundamental stats stay fresh for this long after a live fetch (seconds).
pub const STATS_TTL_SECS: u64 = 600;

/// Request timeout for the stats API (seconds).
pub const STATS_TIMEOUT_SECS: u64 = 10;

/// Share of the displayed price taken from the trading ledger.
/// The remainder comes from the fundamental-adjusted seed price.
pub const PRICE_BLEND_ALPHA: f64 = 0.7;

/// Max fractional nudge of the seed price from the fundamental score.
pub const FUNDAMENTAL_DELTA_CLAMP: f64 = 0.25;

/// Score used when the stats lookup fails.
pub const FALLBACK_SCORE: f64 = 0.5;

/// Spread given to newly created rooms, in basis points.
pub const DEFAULT_SPREAD_BPS: f64 = 50.0;

/// Cash balance of a freshly created player.
pub const STARTING_CASH: f64 = 100_000.0;

/// Max price ticks read per coin for a market snapshot.
pub const PRICE_HISTORY_LIMIT: i64 = 200;

/// Number of series points returned for charting.
pub const SERIES_POINTS: usize = 60;

/// Trailing window for open/high/low/change (milliseconds).
pub const WINDOW_24H_MS: i64 = 24 * 60 * 60 * 1000;

/// Fundamental score policy. These weights and denominators are product
/// choices, not fitted values.
pub mod score_weights {
    pub const KD_WEIGHT: f64 = 0.5;
    pub const WIN_RATE_WEIGHT: f64 = 0.3;
    pub const WINS_WEIGHT: f64 = 0.2;

    /// kd at or above this saturates its sub-score.
    pub const KD_CAP: f64 = 5.0;
    /// Win rate (percent) at or above this saturates its sub-score.
    pub const WIN_RATE_CAP: f64 = 25.0;
    /// Win count at or above this saturates its sub-score.
    pub const WINS_CAP: f64 = 100.0;
}

pub fn default_catalog() -> Vec<CoinProfile> {
    vec![
        CoinProfile::new("JUANO", "JuanoYoloXd", Platform::Pc, 50_000.0),
        CoinProfile::new("ZOM", "ZomHeldD", Platform::Pc, 60_000.0),
        CoinProfile::new("CRIS", "cristofprime", Platform::Xbl, 55_000.0),
    ]
}

/// Immutable process configuration. Built once in `main` and shared via `Arc`.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    pub stats_api_url: String,
    /// Sent verbatim as the `Authorization` header (FORTNITE_API_KEY).
    pub stats_api_key: String,
    pub stats_ttl_secs: u64,
    pub stats_timeout_secs: u64,
    /// Tradable coins (COIN_CATALOG, see `parse_catalog`).
    pub coins: Vec<CoinProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            db_path: "market.db".to_string(),
            api_port: 8787,
            stats_api_url: STATS_API_URL.to_string(),
            stats_api_key: String::new(),
            stats_ttl_secs: STATS_TTL_SECS,
            stats_timeout_secs: STATS_TIMEOUT_SECS,
            coins: default_catalog(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let coins = match std::env::var("COIN_CATALOG") {
            Ok(raw) if !raw.trim().is_empty() => parse_catalog(&raw)?,
            _ => default_catalog(),
        };

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "market.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "8787".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            stats_api_url: std::env::var("STATS_API_URL")
                .unwrap_or_else(|_| STATS_API_URL.to_string()),
            stats_api_key: std::env::var("FORTNITE_API_KEY").unwrap_or_default(),
            stats_ttl_secs: std::env::var("STATS_TTL_SECS")
                .unwrap_or_else(|_| STATS_TTL_SECS.to_string())
                .parse::<u64>()
                .unwrap_or(STATS_TTL_SECS),
            stats_timeout_secs: std::env::var("STATS_TIMEOUT_SECS")
                .unwrap_or_else(|_| STATS_TIMEOUT_SECS.to_string())
                .parse::<u64>()
                .unwrap_or(STATS_TIMEOUT_SECS),
            coins,
        })
    }

    pub fn coin(&self, symbol: &str) -> Option<&CoinProfile> {
        self.coins.iter().find(|c| c.symbol == symbol)
    }

    pub fn stats_ttl_ms(&self) -> i64 {
        i64::try_from(self.stats_ttl_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000)
    }
}

/// Parse `SYMBOL:player:platform:seed[:label]` entries separated by commas.
/// Example: `JUANO:JuanoYoloXd:pc:50000,CRIS:cristofprime:xbl:55000:Cris`
pub fn parse_catalog(raw: &str) -> Result<Vec<CoinProfile>> {
    let mut coins: Vec<CoinProfile> = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
        if parts.len() < 4 || parts.len() > 5 {
            return Err(AppError::Config(format!(
                "COIN_CATALOG entry '{entry}' must be SYMBOL:player:platform:seed[:label]"
            )));
        }

        let platform = Platform::parse(parts[2]).ok_or_else(|| {
            AppError::Config(format!("COIN_CATALOG entry '{entry}': platform must be pc or xbl"))
        })?;
        let seed_price = parts[3]
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| {
                AppError::Config(format!("COIN_CATALOG entry '{entry}': seed must be a positive number"))
            })?;

        let mut coin = CoinProfile::new(parts[0], parts[1], platform, seed_price);
        if let Some(label) = parts.get(4).filter(|l| !l.is_empty()) {
            coin.label = label.to_string();
        }

        if coin.symbol.is_empty() || coins.iter().any(|c| c.symbol == coin.symbol) {
            return Err(AppError::Config(format!(
                "COIN_CATALOG entry '{entry}': symbol must be non-empty and unique"
            )));
        }
        coins.push(coin);
    }

    if coins.is_empty() {
        return Err(AppError::Config("COIN_CATALOG has no entries".to_string()));
    }
    Ok(coins)
}
