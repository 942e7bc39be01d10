//! Liveness endpoint.

use axum::{extract::State, Json};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::api::routes::ApiState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// RFC 3339, millisecond precision, UTC.
    pub ts: String,
}

pub fn health_response(now_ms: i64) -> HealthResponse {
    let ts = DateTime::<Utc>::from_timestamp_millis(now_ms)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    HealthResponse { status: "ok", ts }
}

pub async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(health_response(state.clock.now_ms()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_is_iso_utc() {
        let h = health_response(1_700_000_000_123);
        assert_eq!(h.status, "ok");
        assert_eq!(h.ts, "2023-11-14T22:13:20.123Z");
    }
}
