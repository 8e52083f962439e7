//! HTTP server for the routing engine.
//!
//! Provides endpoints for:
//! - Backend capabilities and residency (`/v1/backends`)
//! - Registry reload (`/v1/registry/reload`)
//! - Health check (`/health`)
//! - Prometheus metrics (`/metrics`)

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

mod handlers;
pub mod responses;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // API routes
        .route("/v1/backends", get(handlers::list_backends))
        .route("/v1/registry/reload", post(handlers::reload_registry))
        // Observability routes
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(cors)
        .with_state(state)
}
