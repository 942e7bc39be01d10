use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::db::models::{HoldingRow, NewPlayer, PlayerRow, PriceTickRow, StatsCacheRow};
use crate::error::Result;
use crate::types::MarketType;

const PLAYER_COLUMNS: &str = "id, room_code, player_identity, market_type, player_code, \
     display_name, pin, cash, created_at";

/// Typed access to the SQLite tables. Cheap to clone; wraps the pool.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database file and run migrations.
    pub async fn connect(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Single-connection in-memory database; every connection to
    /// `sqlite::memory:` would otherwise see its own empty schema.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // -----------------------------------------------------------------------
    // Rooms
    // -----------------------------------------------------------------------

    pub async fn insert_room_if_missing(&self, room_code: &str, spread_bps: f64, now_ms: i64) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO rooms (room_code, spread_bps, created_at) VALUES (?, ?, ?)",
        )
        .bind(room_code)
        .bind(spread_bps)
        .bind(now_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn room_spread(&self, room_code: &str) -> Result<Option<f64>> {
        let spread: Option<(f64,)> =
            sqlx::query_as("SELECT spread_bps FROM rooms WHERE room_code = ?")
                .bind(room_code)
                .fetch_optional(&self.pool)
                .await?;
        Ok(spread.map(|(s,)| s))
    }

    // -----------------------------------------------------------------------
    // Price ticks
    // -----------------------------------------------------------------------

    pub async fn has_price(&self, room_code: &str, coin: &str, market: MarketType) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM prices WHERE room_code = ? AND coin_symbol = ? AND market_type = ? LIMIT 1",
        )
        .bind(room_code)
        .bind(coin)
        .bind(market.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn insert_price(
        &self,
        room_code: &str,
        coin: &str,
        market: MarketType,
        price: f64,
        source: &str,
        now_ms: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO prices (room_code, coin_symbol, market_type, price, source, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(room_code)
        .bind(coin)
        .bind(market.as_str())
        .bind(price)
        .bind(source)
        .bind(now_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Newest ticks first, at most `limit`.
    pub async fn recent_prices(
        &self,
        room_code: &str,
        coin: &str,
        market: MarketType,
        limit: i64,
    ) -> Result<Vec<PriceTickRow>> {
        let rows = sqlx::query_as::<_, PriceTickRow>(
            r#"
            SELECT id, price, source, created_at
            FROM prices
            WHERE room_code = ? AND coin_symbol = ? AND market_type = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(room_code)
        .bind(coin)
        .bind(market.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Players & holdings
    // -----------------------------------------------------------------------

    pub async fn find_player(
        &self,
        room_code: &str,
        player_code: &str,
        market: MarketType,
    ) -> Result<Option<PlayerRow>> {
        let sql = format!(
            "SELECT {PLAYER_COLUMNS} FROM room_players \
             WHERE room_code = ? AND player_code = ? AND market_type = ? LIMIT 1"
        );
        let row = sqlx::query_as::<_, PlayerRow>(&sql)
            .bind(room_code)
            .bind(player_code)
            .bind(market.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Look a code up regardless of which market it belongs to.
    pub async fn find_player_any_market(&self, room_code: &str, player_code: &str) -> Result<Option<PlayerRow>> {
        let sql = format!(
            "SELECT {PLAYER_COLUMNS} FROM room_players \
             WHERE room_code = ? AND player_code = ? LIMIT 1"
        );
        let row = sqlx::query_as::<_, PlayerRow>(&sql)
            .bind(room_code)
            .bind(player_code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn find_player_by_identity(
        &self,
        room_code: &str,
        player_identity: &str,
        market: MarketType,
    ) -> Result<Option<PlayerRow>> {
        let sql = format!(
            "SELECT {PLAYER_COLUMNS} FROM room_players \
             WHERE room_code = ? AND player_identity = ? AND market_type = ? LIMIT 1"
        );
        let row = sqlx::query_as::<_, PlayerRow>(&sql)
            .bind(room_code)
            .bind(player_identity)
            .bind(market.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Returns true when a row was inserted, false when the
    /// (room, identity, market) slot was already taken.
    pub async fn insert_player_if_missing(&self, player: &NewPlayer<'_>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO room_players
                (room_code, player_identity, market_type, player_code, display_name, pin, cash, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (room_code, player_identity, market_type) DO NOTHING
            "#,
        )
        .bind(player.room_code)
        .bind(player.player_identity)
        .bind(player.market_type)
        .bind(player.player_code)
        .bind(player.display_name)
        .bind(player.pin)
        .bind(player.cash)
        .bind(player.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn seed_holding(&self, room_code: &str, player_id: i64, coin: &str, market: MarketType) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO holdings (room_code, player_id, coin_symbol, market_type, qty)
            VALUES (?, ?, ?, ?, 0)
            "#,
        )
        .bind(room_code)
        .bind(player_id)
        .bind(coin)
        .bind(market.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn holdings(&self, player_id: i64, market: MarketType) -> Result<Vec<HoldingRow>> {
        let rows = sqlx::query_as::<_, HoldingRow>(
            r#"
            SELECT coin_symbol, qty FROM holdings
            WHERE player_id = ? AND market_type = ?
            ORDER BY coin_symbol
            "#,
        )
        .bind(player_id)
        .bind(market.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Fundamental stats cache
    // -----------------------------------------------------------------------

    pub async fn stats_cache_row(
        &self,
        player: &str,
        platform: &str,
        scope: &str,
    ) -> Result<Option<StatsCacheRow>> {
        let row = sqlx::query_as::<_, StatsCacheRow>(
            r#"
            SELECT player_name, platform, scope, wins, kd, win_rate, matches, kills,
                   computed_score, payload, observed_at, expires_at
            FROM fundamental_stats_cache
            WHERE player_name = ? AND platform = ? AND scope = ?
            "#,
        )
        .bind(player)
        .bind(platform)
        .bind(scope)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn upsert_stats_cache(&self, row: &StatsCacheRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fundamental_stats_cache (
                player_name, platform, scope, wins, kd, win_rate, matches, kills,
                computed_score, payload, observed_at, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (player_name, platform, scope) DO UPDATE SET
                wins = excluded.wins,
                kd = excluded.kd,
                win_rate = excluded.win_rate,
                matches = excluded.matches,
                kills = excluded.kills,
                computed_score = excluded.computed_score,
                payload = excluded.payload,
                observed_at = excluded.observed_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&row.player_name)
        .bind(&row.platform)
        .bind(&row.scope)
        .bind(row.wins)
        .bind(row.kd)
        .bind(row.win_rate)
        .bind(row.matches)
        .bind(row.kills)
        .bind(row.computed_score)
        .bind(&row.payload)
        .bind(row.observed_at)
        .bind(row.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn room_insert_is_idempotent() {
        let store = Store::in_memory().await.unwrap();
        store.insert_room_if_missing("R1", 50.0, 1).await.unwrap();
        store.insert_room_if_missing("R1", 75.0, 2).await.unwrap();
        assert_eq!(store.room_spread("R1").await.unwrap(), Some(50.0));
        assert_eq!(store.room_spread("R2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn recent_prices_newest_first_and_capped() {
        let store = Store::in_memory().await.unwrap();
        for i in 0..5 {
            store
                .insert_price("R1", "JUANO", MarketType::Season, 100.0 + i as f64, "seed", 1_000 + i)
                .await
                .unwrap();
        }
        store
            .insert_price("R1", "JUANO", MarketType::Historical, 1.0, "seed", 9_999)
            .await
            .unwrap();

        let rows = store.recent_prices("R1", "JUANO", MarketType::Season, 3).await.unwrap();
        let prices: Vec<f64> = rows.iter().map(|r| r.price).collect();
        assert_eq!(prices, vec![104.0, 103.0, 102.0]);
        assert!(store.has_price("R1", "JUANO", MarketType::Historical).await.unwrap());
        assert!(!store.has_price("R1", "ZOM", MarketType::Season).await.unwrap());
    }

    #[tokio::test]
    async fn same_millisecond_ticks_order_by_insertion() {
        let store = Store::in_memory().await.unwrap();
        store.insert_price("R1", "ZOM", MarketType::Season, 1.0, "seed", 5).await.unwrap();
        store.insert_price("R1", "ZOM", MarketType::Season, 2.0, "buy", 5).await.unwrap();
        let rows = store.recent_prices("R1", "ZOM", MarketType::Season, 10).await.unwrap();
        assert_eq!(rows[0].price, 2.0);
        assert_eq!(rows[0].source, "buy");
    }

    #[tokio::test]
    async fn stats_cache_upsert_replaces_row() {
        let store = Store::in_memory().await.unwrap();
        let mut row = StatsCacheRow {
            player_name: "p".into(),
            platform: "pc".into(),
            scope: "season".into(),
            wins: 1.0,
            kd: 1.0,
            win_rate: 1.0,
            matches: 1.0,
            kills: 1.0,
            computed_score: 0.1,
            payload: "{}".into(),
            observed_at: 10,
            expires_at: 20,
        };
        store.upsert_stats_cache(&row).await.unwrap();
        row.wins = 9.0;
        row.expires_at = 99;
        store.upsert_stats_cache(&row).await.unwrap();

        let got = store.stats_cache_row("p", "pc", "season").await.unwrap().unwrap();
        assert_eq!(got.wins, 9.0);
        assert_eq!(got.expires_at, 99);
        assert!(store.stats_cache_row("p", "xbl", "season").await.unwrap().is_none());
    }
}
