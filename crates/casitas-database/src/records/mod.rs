//! Record store implementations.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use casitas_core::config::RecordsConfig;
use casitas_core::error::AppError;
use casitas_core::result::AppResult;
use casitas_core::traits::record::RecordStore;

pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;

use crate::connection::DatabasePool;
use crate::migration::run_migrations;

/// Build the record store selected by `config.provider`.
pub async fn build_record_store(config: &RecordsConfig) -> AppResult<Arc<dyn RecordStore>> {
    match config.provider.as_str() {
        "postgres" => {
            let db = DatabasePool::connect(&config.database).await?;
            if config.database.run_migrations {
                run_migrations(db.pool()).await?;
            }
            Ok(Arc::new(PgRecordStore::new(db, &config.table)?))
        }
        "memory" => Ok(Arc::new(MemoryRecordStore::new())),
        other => Err(AppError::configuration(format!(
            "Unknown records provider: {other}"
        ))),
    }
}
