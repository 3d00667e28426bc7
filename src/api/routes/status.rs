//! Legacy status and health endpoints
//!
//! These two predate the envelope convention and return their payload
//! directly. Both always answer 200; degradation shows up in the payload,
//! never as a transport error.

use axum::{Json, extract::State};
use serde_json::Value;

use crate::api::state::ApiState;

/// GET /api/status
///
/// Uptime, throughput counters, and connection count.
pub async fn status(State(state): State<ApiState>) -> Json<Value> {
    Json(state.monitor.system_status().await)
}

/// GET /api/health
///
/// Detailed health with sub-checks, or the fallback heuristic when the
/// detailed path cannot answer.
pub async fn health(State(state): State<ApiState>) -> Json<Value> {
    Json(state.monitor.get_health().await)
}
