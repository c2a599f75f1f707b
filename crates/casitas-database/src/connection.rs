//! PostgreSQL connection pool management.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use casitas_core::config::DatabaseConfig;
use casitas_core::error::{AppError, ErrorKind};

/// Wrapper around the sqlx PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Open a pool against `config.url`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        if config.url.trim().is_empty() {
            return Err(AppError::configuration(
                "records.database.url must be set when records.provider = \"postgres\"",
            ));
        }

        info!(
            url = %mask_password(&config.url),
            max_connections = config.max_connections,
            "Connecting to record database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to connect to record database: {e}"),
                    e,
                )
            })?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying sqlx pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip a trivial query.
    pub async fn health_check(&self) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Health check failed", e))
    }

    /// Close all connections in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Record database pool closed");
    }
}

/// Hide credentials in a connection URL before it is logged, both the
/// `user:password@` form and a `password=` query parameter.
fn mask_password(url: &str) -> String {
    let mut masked = url.to_string();
    if let Some(at_pos) = masked.find('@') {
        let scheme_end = masked.find("://").map(|p| p + 3).unwrap_or(0);
        if let Some(colon_pos) = masked[..at_pos].rfind(':').filter(|&c| c > scheme_end) {
            masked.replace_range(colon_pos + 1..at_pos, "****");
        }
    }
    if let Some(start) = masked.find("password=") {
        let value_start = start + "password=".len();
        let value_end = masked[value_start..]
            .find('&')
            .map_or(masked.len(), |i| value_start + i);
        masked.replace_range(value_start..value_end, "****");
    }
    masked
}
