//! PostgreSQL record store.

use async_trait::async_trait;
use sqlx::PgPool;

use casitas_core::error::{AppError, ErrorKind};
use casitas_core::result::AppResult;
use casitas_core::traits::record::RecordStore;
use casitas_entity::inspection::{EvidenceRow, InspectionEvidence};

use crate::connection::DatabasePool;

/// Record store over the `inspections` table.
///
/// Evidence updates are single `UPDATE` statements on JSONB columns, so
/// concurrent finalizes against one record never lose an append.
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    db: DatabasePool,
    table: String,
}

impl PgRecordStore {
    /// Create a store over `table`.
    pub fn new(db: DatabasePool, table: &str) -> AppResult<Self> {
        if table.is_empty()
            || !table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return Err(AppError::configuration(format!(
                "Invalid records table name: {table:?}"
            )));
        }
        Ok(Self {
            db,
            table: table.to_string(),
        })
    }

    fn pool(&self) -> &PgPool {
        self.db.pool()
    }

    /// Fetch the evidence columns of one record.
    pub async fn find_evidence(&self, record_id: &str) -> AppResult<Option<InspectionEvidence>> {
        let sql = format!(
            "SELECT id, evidence_urls, evidence_slots, updated_at FROM {} WHERE id = $1",
            self.table
        );
        let row = sqlx::query_as::<_, EvidenceRow>(&sql)
            .bind(record_id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to read record", e))?;
        Ok(row.map(EvidenceRow::into_evidence))
    }

    fn not_found(record_id: &str) -> AppError {
        AppError::not_found(format!("Record {record_id} not found"))
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    fn provider_type(&self) -> &str {
        "postgres"
    }

    async fn get_evidence_list(&self, record_id: &str) -> AppResult<Vec<String>> {
        self.find_evidence(record_id)
            .await?
            .map(|ev| ev.evidence_urls)
            .ok_or_else(|| Self::not_found(record_id))
    }

    async fn append_evidence(&self, record_id: &str, url: &str) -> AppResult<()> {
        let sql = format!(
            "UPDATE {} SET evidence_urls = COALESCE(evidence_urls, '[]'::jsonb) || jsonb_build_array($2::text), \
             updated_at = NOW() WHERE id = $1",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(record_id)
            .bind(url)
            .execute(self.pool())
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to append evidence", e)
            })?;
        if result.rows_affected() == 0 {
            return Err(Self::not_found(record_id));
        }
        Ok(())
    }

    async fn set_evidence_slot(&self, record_id: &str, slot: &str, url: &str) -> AppResult<()> {
        let sql = format!(
            "UPDATE {} SET evidence_slots = COALESCE(evidence_slots, '{{}}'::jsonb) || jsonb_build_object($2::text, $3::text), \
             updated_at = NOW() WHERE id = $1",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(record_id)
            .bind(slot)
            .bind(url)
            .execute(self.pool())
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to set evidence slot", e)
            })?;
        if result.rows_affected() == 0 {
            return Err(Self::not_found(record_id));
        }
        Ok(())
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.db.health_check().await
    }
}
