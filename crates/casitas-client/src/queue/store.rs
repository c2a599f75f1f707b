//! Durable queue storage: one JSON document plus a blob per item.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use casitas_core::result::AppResult;
use casitas_core::types::UploadId;
use casitas_entity::QueuedUploadItem;

use crate::persist::{read_json, write_json_atomic};

const QUEUE_FILE: &str = "queue.json";
const BLOB_DIR: &str = "blobs";

/// File layout of the offline queue under one directory.
#[derive(Debug, Clone)]
pub struct QueueStore {
    dir: PathBuf,
}

impl QueueStore {
    /// Use `dir`, creating it if needed.
    pub async fn open(dir: impl AsRef<Path>) -> AppResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(dir.join(BLOB_DIR)).await?;
        Ok(Self { dir })
    }

    /// Queue directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, id: &UploadId) -> PathBuf {
        self.dir.join(BLOB_DIR).join(id.as_str())
    }

    /// Load items in insertion order.
    ///
    /// Items left `uploading` by an interrupted process go back to
    /// `pending`; the returned flag says whether any did.
    pub async fn load(&self, now: DateTime<Utc>) -> AppResult<(Vec<QueuedUploadItem>, bool)> {
        let mut items: Vec<QueuedUploadItem> =
            read_json(&self.dir.join(QUEUE_FILE)).await?.unwrap_or_default();
        let mut recovered = false;
        for item in &mut items {
            if item.recover(now) {
                tracing::info!(id = %item.id, file_name = %item.file_name, "Recovered interrupted upload");
                recovered = true;
            }
        }
        Ok((items, recovered))
    }

    /// Persist the full item list.
    pub async fn save(&self, items: &[QueuedUploadItem]) -> AppResult<()> {
        write_json_atomic(&self.dir.join(QUEUE_FILE), items).await
    }

    /// Store the payload of an item.
    pub async fn write_blob(&self, id: &UploadId, data: &[u8]) -> AppResult<()> {
        tokio::fs::write(self.blob_path(id), data).await?;
        Ok(())
    }

    /// Read the payload of an item.
    pub async fn read_blob(&self, id: &UploadId) -> AppResult<Bytes> {
        Ok(Bytes::from(tokio::fs::read(self.blob_path(id)).await?))
    }

    /// Remove the payload of an item. A missing blob is not an error.
    pub async fn delete_blob(&self, id: &UploadId) -> AppResult<()> {
        match tokio::fs::remove_file(self.blob_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use casitas_entity::QueueStatus;

    use super::*;

    #[tokio::test]
    async fn test_load_recovers_interrupted_items() {
        let dir = tempfile::tempdir().unwrap();
        let store = QueueStore::open(dir.path()).await.unwrap();
        let now = Utc::now();

        let mut first = QueuedUploadItem::new(UploadId::parse("a").unwrap(), "a.jpg", 4, "r1", None, now);
        first.mark_uploading(now).unwrap();
        let second = QueuedUploadItem::new(UploadId::parse("b").unwrap(), "b.jpg", 4, "r1", None, now);
        store.save(&[first, second]).await.unwrap();

        let (items, recovered) = store.load(now).await.unwrap();
        assert!(recovered);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id.as_str(), "a");
        assert!(items.iter().all(|i| i.status == QueueStatus::Pending));
    }

    #[tokio::test]
    async fn test_blob_round_trip_and_idempotent_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = QueueStore::open(dir.path()).await.unwrap();
        let id = UploadId::parse("item-1").unwrap();

        store.write_blob(&id, b"payload").await.unwrap();
        assert_eq!(store.read_blob(&id).await.unwrap(), Bytes::from_static(b"payload"));
        store.delete_blob(&id).await.unwrap();
        store.delete_blob(&id).await.unwrap();
        assert!(store.read_blob(&id).await.is_err());
    }
}
