//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use casitas_core::config::AppConfig;
use casitas_service::AssemblyService;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Chunk assembly service
    pub uploads: AssemblyService,
}

impl AppState {
    /// Creates the state from its parts.
    pub fn new(config: Arc<AppConfig>, uploads: AssemblyService) -> Self {
        Self { config, uploads }
    }
}
