//! Request timing middleware
//!
//! Reports one observation per handled request to the monitoring
//! aggregator, which drives the performance dashboard and the error-rate
//! alerting check. A 5xx response counts as a failed request; client
//! errors do not.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::api::state::ApiState;

pub async fn track_requests(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    let response = next.run(request).await;

    let duration_ms = started.elapsed().as_millis() as u64;
    let error = response.status().is_server_error();
    state.monitor.record_request(duration_ms, error).await;

    response
}
