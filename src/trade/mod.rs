//! Trade execution seam. The dispatcher only knows the `TradeExecutor` trait;
//! the SQLite implementation owns the balance/holding mutation.

pub mod dispatcher;
pub mod sqlite;

pub use dispatcher::{TradeDispatcher, TradeReceipt, TradeRequest};
pub use sqlite::SqliteTradeExecutor;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::types::{MarketType, Side};

#[derive(Debug, Error)]
pub enum TradeError {
    /// Business rule refusal (unknown coin, insufficient cash, ...).
    #[error("{0}")]
    Rejected(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct TradeOrder {
    pub room_code: String,
    /// Already resolved for `market_type`.
    pub player_code: String,
    pub market_type: MarketType,
    pub side: Side,
    pub coin: String,
    pub qty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeOutcome {
    pub exec_price: f64,
    /// Reference price after the trade.
    pub new_mid: f64,
    pub cash: f64,
    pub holding_qty: f64,
}

/// Atomically checks and applies a trade.
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    async fn execute(&self, order: &TradeOrder) -> Result<TradeOutcome, TradeError>;
}
