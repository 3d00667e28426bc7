//! Data query endpoints: sources, recent records, sites, metrics

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::ApiState;
use crate::api::types::{Envelope, LimitQuery, TimeRangeQuery};
use crate::util::parse_time_range;

/// Default and maximum row counts for the recent-rows endpoints
const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

fn clamp_limit(query: &LimitQuery) -> usize {
    query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
}

/// GET /api/sources
///
/// Per-source throughput estimates, documented as an approximation.
pub async fn sources(State(state): State<ApiState>) -> ApiResult<Json<Envelope>> {
    let estimates = state
        .sampler
        .source_estimates()
        .await
        .ok_or_else(|| ApiError::Internal("metrics sampler unavailable".to_string()))?;

    Ok(Json(Envelope::ok(estimates)))
}

/// GET /api/mining/recent?limit=N
pub async fn recent_mining(
    State(state): State<ApiState>,
    Query(query): Query<LimitQuery>,
) -> Json<Envelope> {
    let events = state.storage.recent_mining_events(clamp_limit(&query)).await;
    Json(Envelope::ok(events))
}

/// GET /api/commodities/recent?limit=N
pub async fn recent_commodities(
    State(state): State<ApiState>,
    Query(query): Query<LimitQuery>,
) -> Json<Envelope> {
    let rows = state.storage.recent_commodities(clamp_limit(&query)).await;
    Json(Envelope::ok(rows))
}

/// GET /api/mining/sites
pub async fn mining_sites(State(state): State<ApiState>) -> Json<Envelope> {
    let sites = state.storage.list_sites().await;
    Json(Envelope::ok(sites))
}

/// GET /api/metrics?timeRange=T
///
/// Current throughput sample plus history over the requested range
/// (default one hour).
pub async fn metrics(
    State(state): State<ApiState>,
    Query(query): Query<TimeRangeQuery>,
) -> ApiResult<Json<Envelope>> {
    let range = match &query.time_range {
        Some(raw) => parse_time_range(raw)
            .ok_or_else(|| ApiError::InvalidRequest(format!("invalid timeRange {raw:?}")))?,
        None => chrono::Duration::hours(1),
    };

    let since = Utc::now() - range;
    let current = state.sampler.current_sample().await;
    let history = state.sampler.history(since).await;

    Ok(Json(Envelope::ok(serde_json::json!({
        "current": current,
        "history": history,
    }))))
}
