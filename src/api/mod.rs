//! REST API and WebSocket server for the ingestion hub
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **Actor handles** for querying storage, sampler, and monitoring
//! - **WebSocket** endpoint bridging into the subscription hub
//!
//! ## Endpoints
//!
//! - `GET /api/status` - Legacy status (direct payload)
//! - `GET /api/health` - Legacy health (direct payload)
//! - `GET /api/sources` - Per-source throughput estimates
//! - `GET /api/mining/recent` - Recent mining events
//! - `GET /api/mining/sites` - Known mining sites
//! - `GET /api/commodities/recent` - Recent commodity prices
//! - `GET /api/metrics` - Throughput samples
//! - `GET /api/monitoring/dashboard` - Composed monitoring overview
//! - `GET /api/monitoring/performance` - Request statistics
//! - `GET /api/monitoring/errors` - Tracked errors
//! - `GET /api/monitoring/alerts` - Alerts and stats
//! - `POST /api/monitoring/alerts/:id/acknowledge` - Acknowledge an alert
//! - `WS /api/stream` - Live subscription transport

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;
pub mod websocket;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::Envelope;

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ApiSettings;

/// Build the full application router.
pub fn build_router(state: ApiState, enable_cors: bool) -> Router {
    let mut app = Router::new()
        .route("/api/status", get(routes::status::status))
        .route("/api/health", get(routes::status::health))
        .route("/api/sources", get(routes::data::sources))
        .route("/api/mining/recent", get(routes::data::recent_mining))
        .route("/api/mining/sites", get(routes::data::mining_sites))
        .route(
            "/api/commodities/recent",
            get(routes::data::recent_commodities),
        )
        .route("/api/metrics", get(routes::data::metrics))
        .route("/api/monitoring/dashboard", get(routes::monitoring::dashboard))
        .route(
            "/api/monitoring/performance",
            get(routes::monitoring::performance),
        )
        .route("/api/monitoring/errors", get(routes::monitoring::errors))
        .route("/api/monitoring/alerts", get(routes::monitoring::alerts))
        .route(
            "/api/monitoring/alerts/:id/acknowledge",
            post(routes::monitoring::acknowledge_alert),
        )
        .route("/api/stream", get(websocket::websocket_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::timing::track_requests,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Spawn the API server in a background task and return its local address.
///
/// Failing to bind the listener is the one startup error that propagates;
/// everything else in the system degrades instead of dying.
pub async fn spawn_api_server(settings: &ApiSettings, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", settings.bind);

    let app = build_router(state, settings.enable_cors);

    let listener = tokio::net::TcpListener::bind(settings.bind).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {addr}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {e}");
        }
    });

    Ok(addr)
}
