/// Database row types matching `migrations/0001_init.sql`.
/// Used by sqlx for typed queries.

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlayerRow {
    pub id: i64,
    pub room_code: String,
    pub player_identity: String,
    pub market_type: String,
    pub player_code: String,
    pub display_name: String,
    pub pin: String,
    pub cash: f64,
    pub created_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HoldingRow {
    pub coin_symbol: String,
    pub qty: f64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceTickRow {
    pub id: i64,
    pub price: f64,
    pub source: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatsCacheRow {
    pub player_name: String,
    pub platform: String,
    pub scope: String,
    pub wins: f64,
    pub kd: f64,
    pub win_rate: f64,
    pub matches: f64,
    pub kills: f64,
    pub computed_score: f64,
    /// JSON text of the raw API payload.
    pub payload: String,
    pub observed_at: i64,
    pub expires_at: i64,
}

/// Insert shape for `room_players`.
#[derive(Debug, Clone)]
pub struct NewPlayer<'a> {
    pub room_code: &'a str,
    pub player_identity: &'a str,
    pub market_type: &'a str,
    pub player_code: &'a str,
    pub display_name: &'a str,
    pub pin: &'a str,
    pub cash: f64,
    pub created_at: i64,
}
