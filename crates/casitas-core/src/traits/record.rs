//! Record store contract for inspection rows.

use async_trait::async_trait;

use crate::result::AppResult;

/// External store holding the business records uploads are attached to.
///
/// Every method fails with a `NotFound` error when `record_id` does not
/// name an existing record, so callers can tell a missing record apart
/// from an unreachable store.
#[async_trait]
pub trait RecordStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "postgres", "memory").
    fn provider_type(&self) -> &str;

    /// Read the evidence URL list of a record.
    async fn get_evidence_list(&self, record_id: &str) -> AppResult<Vec<String>>;

    /// Append a URL to the evidence list of a record.
    async fn append_evidence(&self, record_id: &str, url: &str) -> AppResult<()>;

    /// Point a named evidence slot at `url`, replacing any previous URL.
    async fn set_evidence_slot(&self, record_id: &str, slot: &str, url: &str) -> AppResult<()>;

    /// Check whether the store is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
