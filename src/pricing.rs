//! Price blending and the rounding used on every API price.

use crate::config::{FUNDAMENTAL_DELTA_CLAMP, PRICE_BLEND_ALPHA};

/// Displayed price: mostly the trading price, nudged toward a seed price
/// shifted by the fundamental score. The nudge is capped at ±25% of seed.
pub fn combine(seed_price: f64, trading_price: f64, score: f64) -> f64 {
    let delta = (score - 0.5).clamp(-FUNDAMENTAL_DELTA_CLAMP, FUNDAMENTAL_DELTA_CLAMP);
    let base = seed_price * (1.0 + delta);
    PRICE_BLEND_ALPHA * trading_price + (1.0 - PRICE_BLEND_ALPHA) * base
}

pub fn round_dp(value: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    (value * factor).round() / factor
}

pub fn round2(value: f64) -> f64 {
    round_dp(value, 2)
}
