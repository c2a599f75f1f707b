//! In-process record store for tests and local development.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use casitas_core::error::AppError;
use casitas_core::result::AppResult;
use casitas_core::traits::record::RecordStore;
use casitas_entity::inspection::InspectionEvidence;

/// Record store holding inspection evidence in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<HashMap<String, InspectionEvidence>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryRecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reset) a record with no evidence.
    pub async fn insert_record(&self, record_id: &str) {
        self.records
            .write()
            .await
            .insert(record_id.to_string(), InspectionEvidence::new(record_id));
    }

    /// Snapshot of one record.
    pub async fn record(&self, record_id: &str) -> Option<InspectionEvidence> {
        self.records.read().await.get(record_id).cloned()
    }

    /// Make subsequent calls fail as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::database("Record store is unavailable"));
        }
        Ok(())
    }
}

fn not_found(record_id: &str) -> AppError {
    AppError::not_found(format!("Record {record_id} not found"))
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn get_evidence_list(&self, record_id: &str) -> AppResult<Vec<String>> {
        self.check_available()?;
        self.records
            .read()
            .await
            .get(record_id)
            .map(|r| r.evidence_urls.clone())
            .ok_or_else(|| not_found(record_id))
    }

    async fn append_evidence(&self, record_id: &str, url: &str) -> AppResult<()> {
        self.check_available()?;
        let mut records = self.records.write().await;
        let record = records.get_mut(record_id).ok_or_else(|| not_found(record_id))?;
        record.append(url);
        Ok(())
    }

    async fn set_evidence_slot(&self, record_id: &str, slot: &str, url: &str) -> AppResult<()> {
        self.check_available()?;
        let mut records = self.records.write().await;
        let record = records.get_mut(record_id).ok_or_else(|| not_found(record_id))?;
        record.set_slot(slot, url);
        Ok(())
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(!self.unavailable.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_slot() {
        let store = MemoryRecordStore::new();
        store.insert_record("r1").await;

        store.append_evidence("r1", "u1").await.unwrap();
        store.append_evidence("r1", "u2").await.unwrap();
        store.set_evidence_slot("r1", "foto_fachada", "u2").await.unwrap();

        assert_eq!(store.get_evidence_list("r1").await.unwrap(), vec!["u1", "u2"]);
        let rec = store.record("r1").await.unwrap();
        assert_eq!(rec.evidence_slots["foto_fachada"], "u2");
    }

    #[tokio::test]
    async fn test_missing_record_and_unavailable_store_are_distinct() {
        let store = MemoryRecordStore::new();
        assert!(store.append_evidence("nope", "u").await.unwrap_err().is_not_found());

        store.insert_record("r1").await;
        store.set_unavailable(true);
        let err = store.append_evidence("r1", "u").await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(!store.health_check().await.unwrap());
    }
}
