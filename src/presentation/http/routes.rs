//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, patch},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::auth_middleware;
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/messages", message_routes(state.clone()))
        // WebSocket gateway endpoint; authenticates before upgrading
        .route("/gateway", get(ws_handler))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// Message routes (protected)
fn message_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/{conversation_id}",
            get(handlers::message::get_messages).post(handlers::message::send_message),
        )
        .route("/{conversation_id}/read", patch(handlers::message::mark_read))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
