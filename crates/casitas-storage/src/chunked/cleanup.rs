//! Orphan chunk cleanup.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use casitas_core::result::AppResult;
use casitas_core::traits::storage::StorageProvider;
use casitas_core::types::UploadId;

use super::upload::{ASSEMBLED_DIR, CHUNKS_DIR, ChunkedUploadHandler};

/// Cleans up scratch files left behind by expired or failed uploads.
#[derive(Debug, Clone)]
pub struct OrphanChunkCleanup {
    /// Storage provider where chunks are stored.
    provider: Arc<dyn StorageProvider>,
}

impl OrphanChunkCleanup {
    /// Create a new orphan chunk cleanup handler.
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self { provider }
    }

    /// Delete the chunk directory and assembled file of a specific upload.
    pub async fn cleanup_upload(&self, upload_id: &UploadId) -> AppResult<()> {
        self.provider
            .delete_dir(&ChunkedUploadHandler::upload_dir(upload_id))
            .await?;
        self.provider
            .delete(&ChunkedUploadHandler::assembled_path(upload_id))
            .await?;
        tracing::debug!(upload_id = %upload_id, "Cleaned up orphan chunks");
        Ok(())
    }

    /// List the upload ids that have scratch data on disk.
    pub async fn list_upload_ids(&self) -> AppResult<Vec<String>> {
        let mut ids = Vec::new();
        for area in [CHUNKS_DIR, ASSEMBLED_DIR] {
            for entry in self.provider.list(area).await? {
                if let Some(name) = entry.path.rsplit('/').next() {
                    if !ids.iter().any(|id| id == name) {
                        ids.push(name.to_string());
                    }
                }
            }
        }
        Ok(ids)
    }

    /// Remove scratch data older than `cutoff` whose upload is not live.
    ///
    /// Catches files whose session was lost, e.g. across a restart, since the
    /// session map is not persisted. Returns the number of entries removed.
    pub async fn sweep_orphans<F>(&self, cutoff: DateTime<Utc>, is_live: F) -> AppResult<usize>
    where
        F: Fn(&str) -> bool + Send,
    {
        let mut removed = 0;
        for area in [CHUNKS_DIR, ASSEMBLED_DIR] {
            for entry in self.provider.list(area).await? {
                let Some(name) = entry.path.rsplit('/').next() else {
                    continue;
                };
                if is_live(name) {
                    continue;
                }
                if entry.last_modified.is_some_and(|m| m >= cutoff) {
                    continue;
                }
                if entry.is_directory {
                    self.provider.delete_dir(&entry.path).await?;
                } else {
                    self.provider.delete(&entry.path).await?;
                }
                tracing::info!(path = %entry.path, "Removed orphaned scratch data");
                removed += 1;
            }
        }
        Ok(removed)
    }
}
