//! Route definitions for the Casitas HTTP API.
//!
//! The router receives `AppState` and passes it to all handlers via Axum's
//! `State` extractor.

use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let server = &state.config.server;
    let max_body = server.max_body_bytes;
    let timeout = Duration::from_secs(server.request_timeout_seconds.max(1));
    let cors = middleware::cors::build_cors_layer(&server.cors);

    Router::new()
        .merge(health_routes())
        .merge(upload_routes())
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Liveness probe
fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}

/// Chunked upload protocol
fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/upload/init", post(handlers::upload::init_upload))
        .route("/upload/chunk", post(handlers::upload::upload_chunk))
        .route("/upload/finalize", post(handlers::upload::finalize_upload))
        .route("/upload/{upload_id}", get(handlers::upload::upload_status))
}
