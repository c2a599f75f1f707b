//! # casitas-api
//!
//! HTTP API layer for the Casitas chunk assembly service, built on Axum.
//!
//! Provides the upload endpoints, the health probe, middleware (CORS,
//! request logging, body limit, timeout) and the mapping from upload
//! failures to HTTP responses.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::{ApiError, ApiErrorResponse};
pub use router::build_router;
pub use state::AppState;
