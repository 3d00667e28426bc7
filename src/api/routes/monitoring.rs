//! Monitoring endpoints: dashboard, performance, errors, alerts

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::ApiState;
use crate::api::types::{Envelope, ErrorsQuery, TimeRangeQuery};
use crate::monitoring::errors::Severity;
use crate::util::parse_time_range;

fn range_or_default(raw: &Option<String>) -> ApiResult<chrono::Duration> {
    match raw {
        Some(raw) => parse_time_range(raw)
            .ok_or_else(|| ApiError::InvalidRequest(format!("invalid timeRange {raw:?}"))),
        None => Ok(chrono::Duration::hours(1)),
    }
}

/// GET /api/monitoring/dashboard
///
/// Composed overview. Always succeeds; a monitoring outage yields the
/// documented zeroed fallback, never an error response.
pub async fn dashboard(State(state): State<ApiState>) -> Json<Envelope> {
    Json(Envelope::ok(state.monitor.get_dashboard().await))
}

/// GET /api/monitoring/performance?timeRange=T
pub async fn performance(
    State(state): State<ApiState>,
    Query(query): Query<TimeRangeQuery>,
) -> ApiResult<Json<Envelope>> {
    let since = Utc::now() - range_or_default(&query.time_range)?;

    let summary = state
        .monitor
        .performance
        .report(since)
        .await
        .ok_or_else(|| ApiError::Internal("performance tracker unavailable".to_string()))?;

    Ok(Json(Envelope::ok(summary)))
}

/// GET /api/monitoring/errors?timeRange=T&severity=S
pub async fn errors(
    State(state): State<ApiState>,
    Query(query): Query<ErrorsQuery>,
) -> ApiResult<Json<Envelope>> {
    let since = Utc::now() - range_or_default(&query.time_range)?;

    let severity = match &query.severity {
        Some(raw) => Some(
            Severity::parse(raw)
                .ok_or_else(|| ApiError::InvalidRequest(format!("invalid severity {raw:?}")))?,
        ),
        None => None,
    };

    let report = state
        .monitor
        .errors
        .query(since, severity)
        .await
        .ok_or_else(|| ApiError::Internal("error tracker unavailable".to_string()))?;

    Ok(Json(Envelope::ok(report)))
}

/// GET /api/monitoring/alerts
pub async fn alerts(State(state): State<ApiState>) -> ApiResult<Json<Envelope>> {
    let report = state
        .monitor
        .alerting
        .list()
        .await
        .ok_or_else(|| ApiError::Internal("alerting unavailable".to_string()))?;

    Ok(Json(Envelope::ok(report)))
}

/// POST /api/monitoring/alerts/:id/acknowledge
///
/// Transitions `triggered -> acknowledged`. Unknown ids and repeated
/// acknowledgments are local failures reported in the envelope.
pub async fn acknowledge_alert(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope>> {
    match state.monitor.alerting.acknowledge(&id).await {
        Ok(alert) => Ok(Json(Envelope::ok(alert))),
        Err(message) if message.contains("not found") => Err(ApiError::NotFound(message)),
        Err(message) => Err(ApiError::InvalidRequest(message)),
    }
}
