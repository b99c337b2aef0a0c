//! HTTP routes

pub mod health;

use axum::{http::HeaderValue, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::{security::cors_layer, state::AppState, websocket::ws_handler};

/// Create all routes
pub fn create_router(state: AppState, client_origin: HeaderValue) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    Router::new()
        .route("/ws", get(ws_handler))
        .merge(health_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(client_origin))
}
