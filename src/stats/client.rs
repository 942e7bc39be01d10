use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::stats::StatsError;
use crate::types::MarketType;

/// Source of raw player statistics payloads.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    async fn fetch(&self, player: &str, scope: MarketType) -> Result<Value, StatsError>;
}

/// fortnite-api.com `GET /v2/stats/br/v2` client.
pub struct FortniteApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FortniteApiClient {
    pub fn new(cfg: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.stats_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.stats_api_url.trim_end_matches('/').to_string(),
            api_key: cfg.stats_api_key.clone(),
        })
    }

    async fn fetch_stats(&self, player: &str, scope: MarketType) -> Result<Value, StatsError> {
        let url = format!("{}/v2/stats/br/v2", self.base_url);
        debug!(player, time_window = scope.time_window(), "fetching player stats");

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("name", player),
                ("accountType", "epic"),
                ("timeWindow", scope.time_window()),
            ])
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StatsError::NotFound(player.to_string()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(StatsError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StatsError::Upstream {
                status: status.as_u16(),
                body: body.chars().take(180).collect(),
            });
        }

        Ok(resp.json::<Value>().await?)
    }
}

#[async_trait]
impl StatsProvider for FortniteApiClient {
    async fn fetch(&self, player: &str, scope: MarketType) -> Result<Value, StatsError> {
        self.fetch_stats(player, scope).await
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::StatsProvider;
    use crate::stats::StatsError;
    use crate::types::MarketType;

    /// In-memory provider. Unknown players return `NotFound`; `set_failing`
    /// makes every call rate-limited.
    #[derive(Default)]
    pub struct StubProvider {
        payloads: Mutex<HashMap<(String, MarketType), Value>>,
        failing: AtomicBool,
        calls: AtomicUsize,
    }

    impl StubProvider {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a payload whose `pc` and `all` overall blocks carry the given stats.
        pub fn with_stats(self, player: &str, scope: MarketType, kd: f64, win_rate: f64, wins: f64) -> Self {
            let overall = json!({ "kd": kd, "winRate": win_rate, "wins": wins, "matches": 100, "kills": 250 });
            let payload = json!({ "status": 200, "data": { "stats": {
                "all": { "overall": overall.clone() },
                "pc": { "overall": overall },
            }}});
            self.set_payload(player, scope, payload);
            self
        }

        pub fn set_payload(&self, player: &str, scope: MarketType, payload: Value) {
            if let Ok(mut map) = self.payloads.lock() {
                map.insert((player.to_string(), scope), payload);
            }
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::Relaxed);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl StatsProvider for StubProvider {
        async fn fetch(&self, player: &str, scope: MarketType) -> Result<Value, StatsError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.failing.load(Ordering::Relaxed) {
                Err(StatsError::RateLimited)
            } else {
                self.payloads
                    .lock()
                    .ok()
                    .and_then(|map| map.get(&(player.to_string(), scope)).cloned())
                    .ok_or_else(|| StatsError::NotFound(player.to_string()))
            }
        }
    }
}
