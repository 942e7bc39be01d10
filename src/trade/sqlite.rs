use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::clock::Clock;
use crate::config::Config;
use crate::db::Store;
use crate::pricing::round2;
use crate::trade::{TradeError, TradeExecutor, TradeOrder, TradeOutcome};
use crate::types::Side;

/// Execution price around `mid`: half the room spread on each side.
/// 50 bps at a mid of 50000 buys at 50125 and sells at 49875.
pub fn execution_price(mid: f64, spread_bps: f64, side: Side) -> f64 {
    let half = spread_bps / 2.0 / 10_000.0;
    match side {
        Side::Buy => round2(mid * (1.0 + half)),
        Side::Sell => round2(mid * (1.0 - half)),
    }
}

/// Runs each trade in one SQLite transaction: checks cash or holdings,
/// updates both, appends the execution as the new reference price tick and
/// records the fill in the `trades` ledger.
pub struct SqliteTradeExecutor {
    config: Arc<Config>,
    store: Store,
    clock: Arc<dyn Clock>,
}

impl SqliteTradeExecutor {
    pub fn new(config: Arc<Config>, store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { config, store, clock }
    }

    async fn run(&self, order: &TradeOrder) -> Result<TradeOutcome, TradeError> {
        let coin = self
            .config
            .coin(&order.coin)
            .ok_or_else(|| TradeError::Rejected("Unknown coin".to_string()))?;
        if !(order.qty.is_finite() && order.qty > 0.0) {
            return Err(TradeError::Rejected("Quantity must be positive".to_string()));
        }
        let market = order.market_type.as_str();
        let now = self.clock.now_ms();

        let mut tx = self.store.pool().begin().await?;

        // Take the write lock before reading anything so two trades on the
        // same player cannot both pass the balance check.
        let touched = sqlx::query("UPDATE rooms SET spread_bps = spread_bps WHERE room_code = ?")
            .bind(&order.room_code)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(TradeError::Rejected("Room not found".to_string()));
        }

        let (spread_bps,): (f64,) = sqlx::query_as("SELECT spread_bps FROM rooms WHERE room_code = ?")
            .bind(&order.room_code)
            .fetch_one(&mut *tx)
            .await?;

        let player: Option<(i64, f64)> = sqlx::query_as(
            "SELECT id, cash FROM room_players WHERE room_code = ? AND player_code = ? AND market_type = ?",
        )
        .bind(&order.room_code)
        .bind(&order.player_code)
        .bind(market)
        .fetch_optional(&mut *tx)
        .await?;
        let (player_id, cash) = player.ok_or_else(|| TradeError::Rejected("Player not found".to_string()))?;

        let mid: Option<(f64,)> = sqlx::query_as(
            r#"
            SELECT price FROM prices
            WHERE room_code = ? AND coin_symbol = ? AND market_type = ?
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(&order.room_code)
        .bind(&coin.symbol)
        .bind(market)
        .fetch_optional(&mut *tx)
        .await?;
        let mid = mid.map_or(coin.seed_price, |(p,)| p);

        let held: Option<(f64,)> = sqlx::query_as(
            "SELECT qty FROM holdings WHERE player_id = ? AND coin_symbol = ? AND market_type = ?",
        )
        .bind(player_id)
        .bind(&coin.symbol)
        .bind(market)
        .fetch_optional(&mut *tx)
        .await?;
        let held = held.map_or(0.0, |(q,)| q);

        let exec_price = execution_price(mid, spread_bps, order.side);
        let notional = round2(exec_price * order.qty);

        let (new_cash, new_qty) = match order.side {
            Side::Buy => {
                if cash < notional {
                    return Err(TradeError::Rejected("Insufficient cash".to_string()));
                }
                (round2(cash - notional), held + order.qty)
            }
            Side::Sell => {
                if held < order.qty {
                    return Err(TradeError::Rejected("Insufficient holdings".to_string()));
                }
                (round2(cash + notional), held - order.qty)
            }
        };

        sqlx::query("UPDATE room_players SET cash = ? WHERE id = ?")
            .bind(new_cash)
            .bind(player_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO holdings (room_code, player_id, coin_symbol, market_type, qty)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (player_id, coin_symbol, market_type) DO UPDATE SET qty = excluded.qty
            "#,
        )
        .bind(&order.room_code)
        .bind(player_id)
        .bind(&coin.symbol)
        .bind(market)
        .bind(new_qty)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO prices (room_code, coin_symbol, market_type, price, source, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order.room_code)
        .bind(&coin.symbol)
        .bind(market)
        .bind(exec_price)
        .bind(order.side.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO trades (room_code, player_id, coin_symbol, market_type, side, qty, exec_price, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order.room_code)
        .bind(player_id)
        .bind(&coin.symbol)
        .bind(market)
        .bind(order.side.as_str())
        .bind(order.qty)
        .bind(exec_price)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            room_code = %order.room_code,
            player_code = %order.player_code,
            coin = %coin.symbol,
            market_type = market,
            side = %order.side,
            qty = order.qty,
            mid,
            exec_price,
            "trade executed"
        );

        Ok(TradeOutcome {
            exec_price,
            new_mid: exec_price,
            cash: new_cash,
            holding_qty: new_qty,
        })
    }
}

#[async_trait]
impl TradeExecutor for SqliteTradeExecutor {
    async fn execute(&self, order: &TradeOrder) -> Result<TradeOutcome, TradeError> {
        self.run(order).await
    }
}
