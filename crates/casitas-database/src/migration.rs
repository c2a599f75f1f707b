//! Database migration runner.

use sqlx::PgPool;
use tracing::info;

use casitas_core::error::{AppError, ErrorKind};

/// Apply the bundled migrations (the `inspections` evidence columns).
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    info!("Applying record database migrations");

    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to run migrations: {e}"),
                e,
            )
        })?;

    info!("Record database migrations applied");
    Ok(())
}
