use serde_json::{Map, Value};

use crate::config::score_weights::*;
use crate::stats::FundamentalStats;
use crate::types::{MarketType, Platform};

/// Lenient numeric coercion: numbers pass through, numeric strings are parsed,
/// booleans map to 1/0, everything else (and any non-finite result) is 0.
pub fn as_number(value: Option<&Value>) -> f64 {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().unwrap_or(0.0)
            }
        }
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

fn overall_block<'a>(stats: &'a Value, key: &str) -> Option<&'a Map<String, Value>> {
    stats.get(key)?.get("overall")?.as_object()
}

/// Select the `overall` stats block: the platform's own block when it has any
/// fields, otherwise the aggregate `all` block.
pub fn pick_stats_block(raw: &Value, platform: Platform) -> Option<&Map<String, Value>> {
    let stats = raw.get("data")?.get("stats")?;
    overall_block(stats, platform.as_str())
        .filter(|block| !block.is_empty())
        .or_else(|| overall_block(stats, "all"))
}

/// Weighted sum of three sub-scores, each clamped to [0, 1].
pub fn compute_score(kd: f64, win_rate: f64, wins: f64) -> f64 {
    let kd_norm = (kd / KD_CAP).clamp(0.0, 1.0);
    let win_rate_norm = (win_rate / WIN_RATE_CAP).clamp(0.0, 1.0);
    let wins_norm = (wins / WINS_CAP).clamp(0.0, 1.0);
    KD_WEIGHT * kd_norm + WIN_RATE_WEIGHT * win_rate_norm + WINS_WEIGHT * wins_norm
}

/// Turn an arbitrary stats payload into a `FundamentalStats` record.
/// Never fails: anything missing reads as zero.
pub fn normalize(player: &str, platform: Platform, scope: MarketType, raw: Value) -> FundamentalStats {
    let (wins, kd, win_rate, matches, kills) = match pick_stats_block(&raw, platform) {
        Some(block) => (
            as_number(block.get("wins")),
            as_number(block.get("kd")),
            as_number(block.get("winRate")),
            as_number(block.get("matches")),
            as_number(block.get("kills")),
        ),
        None => (0.0, 0.0, 0.0, 0.0, 0.0),
    };

    FundamentalStats {
        player: player.to_string(),
        platform,
        scope,
        wins,
        kd,
        win_rate,
        matches,
        kills,
        score: compute_score(kd, win_rate, wins),
        raw,
    }
}
