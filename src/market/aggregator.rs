use std::sync::Arc;

use futures_util::future::try_join_all;
use serde::Serialize;
use tracing::debug;

use crate::clock::Clock;
use crate::config::{Config, PRICE_HISTORY_LIMIT, SERIES_POINTS, WINDOW_24H_MS};
use crate::db::models::PriceTickRow;
use crate::db::Store;
use crate::error::Result;
use crate::pricing::{combine, round2, round_dp};
use crate::stats::FundamentalCache;
use crate::types::{CoinProfile, FundamentalStatus, MarketType};

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// Tick creation time, Unix ms.
    pub t: i64,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoinMarket {
    pub coin_symbol: String,
    pub player_label: String,
    pub market_type: MarketType,
    pub price: f64,
    pub open24: f64,
    pub high24: f64,
    pub low24: f64,
    pub change24_pct: f64,
    pub trading_price_component: f64,
    pub fundamental_component: f64,
    pub fundamental_score: f64,
    pub fundamental_status: FundamentalStatus,
    /// Oldest first.
    pub series: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub market_type: MarketType,
    pub coins: Vec<CoinMarket>,
}

// ---------------------------------------------------------------------------
// MarketAggregator
// ---------------------------------------------------------------------------

/// Builds the per-coin market view for one room and market type.
#[derive(Clone)]
pub struct MarketAggregator {
    config: Arc<Config>,
    store: Store,
    fundamentals: FundamentalCache,
    clock: Arc<dyn Clock>,
}

impl MarketAggregator {
    pub fn new(config: Arc<Config>, store: Store, fundamentals: FundamentalCache, clock: Arc<dyn Clock>) -> Self {
        Self { config, store, fundamentals, clock }
    }

    pub async fn snapshot(&self, room_code: &str, market: MarketType) -> Result<MarketSnapshot> {
        let now = self.clock.now_ms();
        let coins = try_join_all(
            self.config
                .coins
                .iter()
                .map(|coin| self.coin_market(room_code, coin, market, now)),
        )
        .await?;

        Ok(MarketSnapshot { market_type: market, coins })
    }

    async fn coin_market(
        &self,
        room_code: &str,
        coin: &CoinProfile,
        market: MarketType,
        now_ms: i64,
    ) -> Result<CoinMarket> {
        let ticks = self
            .store
            .recent_prices(room_code, &coin.symbol, market, PRICE_HISTORY_LIMIT)
            .await?;
        let (score, status) = self.fundamentals.score_or_fallback(coin, market).await;
        debug!(room_code, coin = %coin.symbol, %market, ticks = ticks.len(), score, %status, "coin market");

        Ok(summarize_coin(coin, market, &ticks, score, status, now_ms))
    }
}

/// Blend every tick with the fundamental score and derive the 24h stats.
/// `ticks` must be newest first.
pub fn summarize_coin(
    coin: &CoinProfile,
    market: MarketType,
    ticks: &[PriceTickRow],
    score: f64,
    status: FundamentalStatus,
    now_ms: i64,
) -> CoinMarket {
    let blend = |price: f64| combine(coin.seed_price, price, score);

    let combined: Vec<SeriesPoint> = ticks
        .iter()
        .map(|tick| SeriesPoint { t: tick.created_at, price: blend(tick.price) })
        .collect();

    let trading_latest = ticks.first().map_or(coin.seed_price, |tick| tick.price);
    let latest = combined
        .first()
        .map_or_else(|| blend(coin.seed_price), |point| point.price);

    let since = now_ms - WINDOW_24H_MS;
    let window: Vec<f64> = combined
        .iter()
        .filter(|point| point.t >= since)
        .map(|point| point.price)
        .collect();

    let open24 = window.last().copied().unwrap_or(latest);
    let high24 = window.iter().copied().reduce(f64::max).unwrap_or(latest);
    let low24 = window.iter().copied().reduce(f64::min).unwrap_or(latest);
    let change24 = if open24 != 0.0 {
        (latest - open24) / open24 * 100.0
    } else {
        0.0
    };

    let series = combined
        .iter()
        .take(SERIES_POINTS)
        .rev()
        .map(|point| SeriesPoint { t: point.t, price: round2(point.price) })
        .collect();

    CoinMarket {
        coin_symbol: coin.symbol.clone(),
        player_label: coin.label.clone(),
        market_type: market,
        price: round2(latest),
        open24: round2(open24),
        high24: round2(high24),
        low24: round2(low24),
        change24_pct: round2(change24),
        trading_price_component: round2(trading_latest),
        fundamental_component: round2(blend(coin.seed_price)),
        fundamental_score: round_dp(score, 4),
        fundamental_status: status,
        series,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::ManualClock;
    use crate::stats::client::testing::StubProvider;
    use crate::types::Platform;

    const NOW: i64 = 1_700_000_000_000;
    const HOUR_MS: i64 = 60 * 60 * 1000;

    fn coin() -> CoinProfile {
        CoinProfile::new("JUANO", "JuanoYoloXd", Platform::Pc, 50_000.0)
    }

    fn tick(id: i64, price: f64, created_at: i64) -> PriceTickRow {
        PriceTickRow { id, price, source: "seed".to_string(), created_at }
    }

    #[test]
    fn no_ticks_uses_seed_and_flat_stats() {
        let m = summarize_coin(&coin(), MarketType::Season, &[], 0.9, FundamentalStatus::Live, NOW);
        // combine(50000, 50000, 0.9): delta capped at 0.25
        assert_eq!(m.price, 53_750.0);
        assert_eq!(m.open24, m.price);
        assert_eq!(m.high24, m.price);
        assert_eq!(m.low24, m.price);
        assert_eq!(m.change24_pct, 0.0);
        assert_eq!(m.trading_price_component, 50_000.0);
        assert_eq!(m.fundamental_component, 53_750.0);
        assert!(m.series.is_empty());
    }

    #[test]
    fn window_stats_ignore_ticks_older_than_24h() {
        // Newest first. With score 0.5 the blend is 0.7*p + 15000.
        let ticks = vec![
            tick(4, 60_000.0, NOW - HOUR_MS),
            tick(3, 40_000.0, NOW - 2 * HOUR_MS),
            tick(2, 50_000.0, NOW - 3 * HOUR_MS),
            tick(1, 90_000.0, NOW - 25 * HOUR_MS),
        ];
        let m = summarize_coin(&coin(), MarketType::Season, &ticks, 0.5, FundamentalStatus::Cached, NOW);

        assert_eq!(m.price, 57_000.0);
        assert_eq!(m.open24, 50_000.0);
        assert_eq!(m.high24, 57_000.0);
        assert_eq!(m.low24, 43_000.0);
        assert_eq!(m.change24_pct, 14.0);
        assert_eq!(m.trading_price_component, 60_000.0);
        assert_eq!(m.fundamental_component, 50_000.0);
        assert_eq!(m.fundamental_status, FundamentalStatus::Cached);
    }

    #[test]
    fn all_ticks_stale_falls_back_to_latest() {
        let ticks = vec![tick(2, 60_000.0, NOW - 30 * HOUR_MS), tick(1, 50_000.0, NOW - 48 * HOUR_MS)];
        let m = summarize_coin(&coin(), MarketType::Historical, &ticks, 0.5, FundamentalStatus::Live, NOW);
        assert_eq!(m.open24, m.price);
        assert_eq!(m.high24, m.price);
        assert_eq!(m.low24, m.price);
        assert_eq!(m.change24_pct, 0.0);
        assert_eq!(m.series.len(), 2);
    }

    #[test]
    fn series_is_newest_sixty_oldest_first() {
        let ticks: Vec<PriceTickRow> = (0..100)
            .map(|i| tick(100 - i, 50_000.0 + (100 - i) as f64, NOW - i * 1000))
            .collect();
        let m = summarize_coin(&coin(), MarketType::Season, &ticks, 0.5, FundamentalStatus::Live, NOW);

        assert_eq!(m.series.len(), SERIES_POINTS);
        assert_eq!(m.series.last().unwrap().t, NOW);
        assert_eq!(m.series.first().unwrap().t, NOW - 59 * 1000);
        assert!(m.series.windows(2).all(|w| w[0].t < w[1].t));
    }

    #[test]
    fn score_is_rounded_to_four_places() {
        let m = summarize_coin(&coin(), MarketType::Season, &[], 0.123456, FundamentalStatus::Live, NOW);
        assert_eq!(m.fundamental_score, 0.1235);
    }

    #[tokio::test]
    async fn snapshot_survives_stats_failure() {
        let store = Store::in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(NOW));
        let provider = Arc::new(StubProvider::new());
        provider.set_failing(true);
        let config = Arc::new(Config::default());
        let fundamentals = FundamentalCache::new(store.clone(), provider, clock.clone(), config.stats_ttl_ms());
        let aggregator = MarketAggregator::new(config.clone(), store.clone(), fundamentals, clock);

        store
            .insert_price("R1", "ZOM", MarketType::Season, 60_000.0, "seed", NOW - HOUR_MS)
            .await
            .unwrap();

        let snap = aggregator.snapshot("R1", MarketType::Season).await.unwrap();
        assert_eq!(snap.market_type, MarketType::Season);
        assert_eq!(snap.coins.len(), config.coins.len());
        let symbols: Vec<&str> = snap.coins.iter().map(|c| c.coin_symbol.as_str()).collect();
        assert_eq!(symbols, vec!["JUANO", "ZOM", "CRIS"]);
        for c in &snap.coins {
            assert_eq!(c.fundamental_status, FundamentalStatus::Fallback);
            assert_eq!(c.fundamental_score, 0.5);
        }
        let zom = &snap.coins[1];
        assert_eq!(zom.price, 60_000.0);
        assert_eq!(zom.series.len(), 1);
    }
}
