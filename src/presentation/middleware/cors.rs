//! CORS Middleware Configuration

use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

use crate::config::CorsSettings;

/// Create CORS layer from settings
pub fn create_cors_layer(settings: &CorsSettings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let methods = [Method::GET, Method::POST, Method::PATCH, Method::OPTIONS];

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
            .max_age(std::time::Duration::from_secs(3600))
    }
}
