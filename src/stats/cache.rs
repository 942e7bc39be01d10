use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::FALLBACK_SCORE;
use crate::db::models::StatsCacheRow;
use crate::db::Store;
use crate::stats::normalizer::normalize;
use crate::stats::{FundamentalStats, StatsError, StatsProvider};
use crate::types::{CoinProfile, FundamentalStatus, MarketType, Platform};

/// TTL cache for fundamental stats, persisted in `fundamental_stats_cache`.
///
/// No locking around fetch-and-upsert: two requests that miss at the same
/// time both fetch and the last upsert wins.
#[derive(Clone)]
pub struct FundamentalCache {
    store: Store,
    provider: Arc<dyn StatsProvider>,
    clock: Arc<dyn Clock>,
    ttl_ms: i64,
}

impl FundamentalCache {
    pub fn new(store: Store, provider: Arc<dyn StatsProvider>, clock: Arc<dyn Clock>, ttl_ms: i64) -> Self {
        Self { store, provider, clock, ttl_ms }
    }

    /// Cached stats if the row has not expired, otherwise a live fetch that
    /// refreshes the row. Only the provider call can fail this.
    pub async fn get(
        &self,
        player: &str,
        platform: Platform,
        scope: MarketType,
    ) -> Result<(FundamentalStats, FundamentalStatus), StatsError> {
        let now = self.clock.now_ms();

        match self.store.stats_cache_row(player, platform.as_str(), scope.as_str()).await {
            Ok(Some(row)) if row.expires_at > now => {
                return Ok((from_row(row, platform, scope), FundamentalStatus::Cached));
            }
            Ok(_) => {}
            Err(e) => warn!(player, %platform, %scope, "stats cache read failed, treating as miss: {e}"),
        }

        let raw = self.provider.fetch(player, scope).await?;
        let stats = normalize(player, platform, scope, raw);
        info!(player, %platform, %scope, score = stats.score, "fetched live player stats");

        let row = to_row(&stats, now, now.saturating_add(self.ttl_ms));
        if let Err(e) = self.store.upsert_stats_cache(&row).await {
            warn!(player, %platform, %scope, "stats cache upsert failed: {e}");
        }

        Ok((stats, FundamentalStatus::Live))
    }

    /// Score for a coin's tracked player. Lookup failures degrade to the
    /// neutral score tagged `Fallback`.
    pub async fn score_or_fallback(&self, coin: &CoinProfile, scope: MarketType) -> (f64, FundamentalStatus) {
        match self.get(&coin.player, coin.platform, scope).await {
            Ok((stats, status)) => (stats.score, status),
            Err(e) => {
                warn!(coin = %coin.symbol, player = %coin.player, %scope, "fundamental fallback: {e}");
                (FALLBACK_SCORE, FundamentalStatus::Fallback)
            }
        }
    }
}

fn from_row(row: StatsCacheRow, platform: Platform, scope: MarketType) -> FundamentalStats {
    FundamentalStats {
        player: row.player_name,
        platform,
        scope,
        wins: row.wins,
        kd: row.kd,
        win_rate: row.win_rate,
        matches: row.matches,
        kills: row.kills,
        score: row.computed_score,
        raw: serde_json::from_str(&row.payload).unwrap_or(serde_json::Value::Null),
    }
}

fn to_row(stats: &FundamentalStats, observed_at: i64, expires_at: i64) -> StatsCacheRow {
    StatsCacheRow {
        player_name: stats.player.clone(),
        platform: stats.platform.as_str().to_string(),
        scope: stats.scope.as_str().to_string(),
        wins: stats.wins,
        kd: stats.kd,
        win_rate: stats.win_rate,
        matches: stats.matches,
        kills: stats.kills,
        computed_score: stats.score,
        payload: stats.raw.to_string(),
        observed_at,
        expires_at,
    }
}
