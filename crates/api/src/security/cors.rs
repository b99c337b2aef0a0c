//! CORS layer for the relay

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::CorsLayer;

/// CORS policy allowing exactly `origin`, with credentials
pub fn cors_layer(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
