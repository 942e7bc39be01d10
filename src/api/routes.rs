use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::cors::cors;
use crate::api::health::get_health;
use crate::clock::Clock;
use crate::config::Config;
use crate::db::Store;
use crate::error::AppError;
use crate::market::{MarketAggregator, MarketSnapshot};
use crate::registry::{JoinOutcome, Registry, RoomState};
use crate::stats::normalizer::as_number;
use crate::stats::{FundamentalCache, FundamentalStats, StatsProvider};
use crate::trade::{TradeDispatcher, TradeExecutor, TradeReceipt, TradeRequest};
use crate::types::{FundamentalStatus, MarketType, Platform, Side};

#[derive(Clone)]
pub struct ApiState {
    pub registry: Registry,
    pub market: MarketAggregator,
    pub trades: TradeDispatcher,
    pub fundamentals: FundamentalCache,
    pub clock: Arc<dyn Clock>,
}

impl ApiState {
    pub fn new(
        config: Arc<Config>,
        store: Store,
        provider: Arc<dyn StatsProvider>,
        executor: Arc<dyn TradeExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let fundamentals = FundamentalCache::new(store.clone(), provider, clock.clone(), config.stats_ttl_ms());
        let registry = Registry::new(config.clone(), store.clone(), clock.clone());
        let market = MarketAggregator::new(config, store, fundamentals.clone(), clock.clone());
        let trades = TradeDispatcher::new(registry.clone(), executor);
        Self { registry, market, trades, fundamentals, clock }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health).fallback(not_found))
        .route("/api/fortnite/stats", get(get_fortnite_stats).fallback(not_found))
        .route("/api/room/join", post(post_join).fallback(not_found))
        .route("/api/room/state", get(get_room_state).fallback(not_found))
        .route("/api/market", get(get_market).fallback(not_found))
        .route("/api/trade/buy", post(post_buy).fallback(not_found))
        .route("/api/trade/sell", post(post_sell).fallback(not_found))
        .fallback(not_found)
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct StatsQuery {
    pub player: Option<String>,
    pub platform: Option<String>,
    pub scope: Option<String>,
}

#[derive(Deserialize)]
pub struct StateQuery {
    pub room_code: Option<String>,
    pub player_code: Option<String>,
    pub market_type: Option<String>,
}

#[derive(Deserialize)]
pub struct MarketQuery {
    pub room_code: Option<String>,
    pub market_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct StatsResponse {
    pub ok: bool,
    pub status: FundamentalStatus,
    pub stats: FundamentalStats,
}

// ---------------------------------------------------------------------------
// Body helpers
// ---------------------------------------------------------------------------

fn parse_body(body: &[u8]) -> Result<Value, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::Validation(format!("Invalid JSON body: {e}")))
}

/// String field, accepting numbers and booleans as their text form.
fn field_str(body: &Value, key: &str) -> String {
    match body.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Malformed query strings become a 400 with the usual JSON envelope.
fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}

async fn get_fortnite_stats(
    State(state): State<ApiState>,
    query: Result<Query<StatsQuery>, QueryRejection>,
) -> Result<Json<StatsResponse>, AppError> {
    let params = query_params(query)?;
    let player = non_empty(params.player);
    let platform = params.platform.as_deref().and_then(Platform::parse);
    let (Some(player), Some(platform)) = (player, platform) else {
        return Err(AppError::Validation("player and platform(pc|xbl) are required".to_string()));
    };
    let scope = MarketType::from_param(params.scope.as_deref());

    let (stats, status) = state.fundamentals.get(&player, platform, scope).await?;
    Ok(Json(StatsResponse { ok: true, status, stats }))
}

async fn post_join(State(state): State<ApiState>, body: Bytes) -> Result<Json<JoinOutcome>, AppError> {
    let body = parse_body(&body)?;
    let outcome = state
        .registry
        .join(
            &field_str(&body, "room_code"),
            &field_str(&body, "display_name"),
            &field_str(&body, "pin"),
        )
        .await?;
    Ok(Json(outcome))
}

async fn get_room_state(
    State(state): State<ApiState>,
    query: Result<Query<StateQuery>, QueryRejection>,
) -> Result<Json<RoomState>, AppError> {
    let params = query_params(query)?;
    let market = MarketType::from_param(params.market_type.as_deref());
    let (Some(room_code), Some(player_code)) = (non_empty(params.room_code), non_empty(params.player_code)) else {
        return Err(AppError::Validation("Missing params".to_string()));
    };

    let room_state = state.registry.room_state(&room_code, &player_code, market).await?;
    Ok(Json(room_state))
}

async fn get_market(
    State(state): State<ApiState>,
    query: Result<Query<MarketQuery>, QueryRejection>,
) -> Result<Json<MarketSnapshot>, AppError> {
    let params = query_params(query)?;
    let market = MarketType::from_param(params.market_type.as_deref());
    let Some(room_code) = non_empty(params.room_code) else {
        return Err(AppError::Validation("Missing room_code".to_string()));
    };

    let snapshot = state.market.snapshot(&room_code, market).await?;
    Ok(Json(snapshot))
}

async fn post_buy(State(state): State<ApiState>, body: Bytes) -> Result<Json<TradeReceipt>, AppError> {
    trade(state, &body, Side::Buy).await
}

async fn post_sell(State(state): State<ApiState>, body: Bytes) -> Result<Json<TradeReceipt>, AppError> {
    trade(state, &body, Side::Sell).await
}

async fn trade(state: ApiState, body: &[u8], side: Side) -> Result<Json<TradeReceipt>, AppError> {
    let body = parse_body(body)?;
    let request = TradeRequest {
        room_code: field_str(&body, "room_code"),
        player_code: field_str(&body, "player_code"),
        coin: field_str(&body, "coin"),
        qty: as_number(body.get("qty")),
        market_type: MarketType::from_param(body.get("market_type").and_then(Value::as_str)),
        side,
    };

    let receipt = state.trades.dispatch(request).await?;
    Ok(Json(receipt))
}
