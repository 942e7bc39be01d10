//! Rooms and players: idempotent join, player code resolution across market
//! types, and the per-player room state view.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::clock::Clock;
use crate::config::{Config, DEFAULT_SPREAD_BPS, STARTING_CASH};
use crate::db::models::{NewPlayer, PlayerRow};
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::types::MarketType;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct JoinOutcome {
    pub ok: bool,
    pub room_code: String,
    /// Season player code.
    pub player_code: String,
    pub display_name: String,
    pub cash: f64,
    pub spread_bps: f64,
    pub player_codes: PlayerCodes,
}

/// A person's code in each market, so the client can switch markets
/// without joining again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerCodes {
    pub season: String,
    pub historical: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoldingView {
    pub coin_symbol: String,
    pub qty: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoinView {
    pub coin_symbol: String,
    pub player_label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomState {
    pub market_type: MarketType,
    pub cash: f64,
    pub holdings: Vec<HoldingView>,
    pub spread_bps: f64,
    pub coins: Vec<CoinView>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Registry {
    config: Arc<Config>,
    store: Store,
    clock: Arc<dyn Clock>,
}

/// Stable key shared by a person's season and historical records:
/// room code plus the upper-cased name with every non-alphanumeric
/// character replaced by `-`.
pub fn player_identity(room_code: &str, display_name: &str) -> String {
    let name: String = display_name
        .to_uppercase()
        .chars()
        .map(|c| if c.is_ascii_uppercase() || c.is_ascii_digit() { c } else { '-' })
        .collect();
    format!("{room_code}-{name}")
}

pub fn player_code(identity: &str, market: MarketType) -> String {
    format!("{identity}-{market}")
}

impl Registry {
    pub fn new(config: Arc<Config>, store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { config, store, clock }
    }

    pub async fn join(&self, room_code: &str, display_name: &str, pin: &str) -> Result<JoinOutcome> {
        let (room_code, display_name, pin) = (room_code.trim(), display_name.trim(), pin.trim());
        if room_code.is_empty() || display_name.is_empty() || pin.is_empty() {
            return Err(AppError::Validation("Missing fields".to_string()));
        }

        let now = self.clock.now_ms();
        self.store
            .insert_room_if_missing(room_code, DEFAULT_SPREAD_BPS, now)
            .await?;
        self.seed_prices(room_code, now).await?;

        let identity = player_identity(room_code, display_name);
        let season = self
            .ensure_player(room_code, display_name, pin, MarketType::Season, &identity)
            .await?;
        let historical = self
            .ensure_player(room_code, display_name, pin, MarketType::Historical, &identity)
            .await?;

        let spread_bps = self.spread_or_default(room_code).await?;
        info!(room_code, player_code = %season.player_code, "player joined room");

        let player_codes = PlayerCodes {
            season: season.player_code.clone(),
            historical: historical.player_code,
        };

        Ok(JoinOutcome {
            ok: true,
            room_code: room_code.to_string(),
            player_code: season.player_code,
            display_name: season.display_name,
            cash: season.cash,
            spread_bps,
            player_codes,
        })
    }

    /// One seed tick per (coin, market type) that has none yet.
    async fn seed_prices(&self, room_code: &str, now_ms: i64) -> Result<()> {
        for coin in &self.config.coins {
            for market in MarketType::ALL {
                if !self.store.has_price(room_code, &coin.symbol, market).await? {
                    self.store
                        .insert_price(room_code, &coin.symbol, market, coin.seed_price, "seed", now_ms)
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn ensure_player(
        &self,
        room_code: &str,
        display_name: &str,
        pin: &str,
        market: MarketType,
        identity: &str,
    ) -> Result<PlayerRow> {
        if let Some(existing) = self.store.find_player_by_identity(room_code, identity, market).await? {
            return check_pin(existing, pin);
        }

        let code = player_code(identity, market);
        let created = self
            .store
            .insert_player_if_missing(&NewPlayer {
                room_code,
                player_identity: identity,
                market_type: market.as_str(),
                player_code: &code,
                display_name,
                pin,
                cash: STARTING_CASH,
                created_at: self.clock.now_ms(),
            })
            .await?;

        // A concurrent join may have won the insert; re-read and validate
        // against whichever row landed.
        let player = self
            .store
            .find_player_by_identity(room_code, identity, market)
            .await?
            .ok_or_else(|| AppError::Database(sqlx::Error::RowNotFound))?;
        let player = check_pin(player, pin)?;

        if created {
            for coin in &self.config.coins {
                self.store
                    .seed_holding(room_code, player.id, &coin.symbol, market)
                    .await?;
            }
            info!(room_code, player_code = %player.player_code, %market, "created player");
        }
        Ok(player)
    }

    /// Map a code from either market to the same person's code in `market`.
    pub async fn resolve_player_code(
        &self,
        room_code: &str,
        supplied_code: &str,
        market: MarketType,
    ) -> Result<Option<String>> {
        if self.store.find_player(room_code, supplied_code, market).await?.is_some() {
            return Ok(Some(supplied_code.to_string()));
        }

        let Some(base) = self.store.find_player_any_market(room_code, supplied_code).await? else {
            return Ok(None);
        };
        if base.player_identity.is_empty() {
            return Ok(None);
        }

        let mapped = self
            .store
            .find_player_by_identity(room_code, &base.player_identity, market)
            .await?;
        Ok(mapped.map(|p| p.player_code))
    }

    pub async fn room_state(&self, room_code: &str, supplied_code: &str, market: MarketType) -> Result<RoomState> {
        let not_found = || AppError::NotFound("Player not found".to_string());

        let code = self
            .resolve_player_code(room_code, supplied_code, market)
            .await?
            .ok_or_else(not_found)?;
        let player = self
            .store
            .find_player(room_code, &code, market)
            .await?
            .ok_or_else(not_found)?;

        let holdings = self
            .store
            .holdings(player.id, market)
            .await?
            .into_iter()
            .map(|h| HoldingView { coin_symbol: h.coin_symbol, qty: h.qty })
            .collect();

        let coins = self
            .config
            .coins
            .iter()
            .map(|c| CoinView { coin_symbol: c.symbol.clone(), player_label: c.label.clone() })
            .collect();

        Ok(RoomState {
            market_type: market,
            cash: player.cash,
            holdings,
            spread_bps: self.spread_or_default(room_code).await?,
            coins,
        })
    }

    async fn spread_or_default(&self, room_code: &str) -> Result<f64> {
        Ok(self
            .store
            .room_spread(room_code)
            .await?
            .filter(|s| *s != 0.0)
            .unwrap_or(DEFAULT_SPREAD_BPS))
    }
}

fn check_pin(player: PlayerRow, pin: &str) -> Result<PlayerRow> {
    if player.pin != pin {
        return Err(AppError::Unauthorized("Invalid PIN".to_string()));
    }
    Ok(player)
}
