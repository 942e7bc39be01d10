use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::error::{AppError, Result};
use crate::registry::Registry;
use crate::trade::{TradeExecutor, TradeOrder, TradeOutcome};
use crate::types::{MarketType, Side};

#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub room_code: String,
    /// Code from either market; resolved before execution.
    pub player_code: String,
    pub coin: String,
    pub qty: f64,
    pub market_type: MarketType,
    pub side: Side,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeReceipt {
    #[serde(flatten)]
    pub outcome: TradeOutcome,
    pub market_type: MarketType,
}

/// Validates the request shape, resolves the player for the target market
/// and hands off to the executor. Affordability is the executor's call.
#[derive(Clone)]
pub struct TradeDispatcher {
    registry: Registry,
    executor: Arc<dyn TradeExecutor>,
}

impl TradeDispatcher {
    pub fn new(registry: Registry, executor: Arc<dyn TradeExecutor>) -> Self {
        Self { registry, executor }
    }

    pub async fn dispatch(&self, req: TradeRequest) -> Result<TradeReceipt> {
        if req.room_code.is_empty()
            || req.player_code.is_empty()
            || req.coin.is_empty()
            || !req.qty.is_finite()
            || req.qty <= 0.0
        {
            return Err(AppError::Validation("Missing fields".to_string()));
        }

        let resolved = self
            .registry
            .resolve_player_code(&req.room_code, &req.player_code, req.market_type)
            .await?
            .ok_or_else(|| AppError::NotFound("Player not found".to_string()))?;

        let order = TradeOrder {
            room_code: req.room_code,
            player_code: resolved,
            market_type: req.market_type,
            side: req.side,
            coin: req.coin,
            qty: req.qty,
        };

        match self.executor.execute(&order).await {
            Ok(outcome) => Ok(TradeReceipt { outcome, market_type: order.market_type }),
            Err(e) => {
                info!(
                    room_code = %order.room_code,
                    player_code = %order.player_code,
                    coin = %order.coin,
                    side = %order.side,
                    "trade refused: {e}"
                );
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::clock::testing::ManualClock;
    use crate::clock::Clock;
    use crate::config::Config;
    use crate::db::Store;
    use crate::trade::TradeError;

    /// Records orders and answers with a fixed result.
    struct RecordingExecutor {
        orders: Mutex<Vec<TradeOrder>>,
        reject_with: Option<String>,
    }

    #[async_trait]
    impl TradeExecutor for RecordingExecutor {
        async fn execute(&self, order: &TradeOrder) -> std::result::Result<TradeOutcome, TradeError> {
            if let Ok(mut orders) = self.orders.lock() {
                orders.push(order.clone());
            }
            match &self.reject_with {
                Some(msg) => Err(TradeError::Rejected(msg.clone())),
                None => Ok(TradeOutcome { exec_price: 1.0, new_mid: 1.0, cash: 2.0, holding_qty: 3.0 }),
            }
        }
    }

    async fn setup(reject_with: Option<&str>) -> (TradeDispatcher, Arc<RecordingExecutor>, String, String) {
        let store = Store::in_memory().await.unwrap();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(1_700_000_000_000));
        let registry = Registry::new(Arc::new(Config::default()), store, clock);
        let joined = registry.join("R1", "Alice", "1234").await.unwrap();
        let executor = Arc::new(RecordingExecutor {
            orders: Mutex::new(Vec::new()),
            reject_with: reject_with.map(str::to_string),
        });
        let dispatcher = TradeDispatcher::new(registry, executor.clone());
        (dispatcher, executor, joined.player_codes.season, joined.player_codes.historical)
    }

    fn request(code: &str, qty: f64, market: MarketType) -> TradeRequest {
        TradeRequest {
            room_code: "R1".to_string(),
            player_code: code.to_string(),
            coin: "JUANO".to_string(),
            qty,
            market_type: market,
            side: Side::Buy,
        }
    }

    #[tokio::test]
    async fn resolves_code_for_target_market() {
        let (dispatcher, executor, season, historical) = setup(None).await;

        let receipt = dispatcher
            .dispatch(request(&season, 2.0, MarketType::Historical))
            .await
            .unwrap();
        assert_eq!(receipt.market_type, MarketType::Historical);
        assert_eq!(receipt.outcome.holding_qty, 3.0);

        let orders = executor.orders.lock().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].player_code, historical);
        assert_eq!(orders[0].market_type, MarketType::Historical);
    }

    #[tokio::test]
    async fn invalid_quantity_never_reaches_executor() {
        let (dispatcher, executor, season, _) = setup(None).await;
        for qty in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = dispatcher
                .dispatch(request(&season, qty, MarketType::Season))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "qty={qty}");
        }
        assert!(executor.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_player_is_not_found() {
        let (dispatcher, _, _, _) = setup(None).await;
        let err = dispatcher
            .dispatch(request("R1-NOBODY-season", 1.0, MarketType::Season))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn executor_message_is_surfaced_verbatim() {
        let (dispatcher, _, season, _) = setup(Some("Insufficient cash")).await;
        let err = dispatcher
            .dispatch(request(&season, 1.0, MarketType::Season))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TradeRejected(ref m) if m == "Insufficient cash"));
    }

    #[test]
    fn receipt_flattens_outcome() {
        let receipt = TradeReceipt {
            outcome: TradeOutcome { exec_price: 50_125.0, new_mid: 50_125.0, cash: 49_875.0, holding_qty: 1.0 },
            market_type: MarketType::Season,
        };
        let v = serde_json::to_value(&receipt).unwrap();
        assert_eq!(v["exec_price"], 50_125.0);
        assert_eq!(v["holding_qty"], 1.0);
        assert_eq!(v["market_type"], "season");
    }
}
