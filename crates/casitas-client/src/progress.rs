//! Upload progress tracker with a best-effort disk mirror.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::{Mutex, Notify};

use casitas_core::result::AppResult;
use casitas_core::traits::{Clock, SystemClock};
use casitas_entity::progress::KEY_SEPARATOR;
use casitas_entity::{ProgressStatus, UploadProgressRecord};

use crate::persist::{read_json, write_json_atomic};
use crate::transfer::{ProgressCallback, ProgressUpdate};

#[derive(Debug)]
struct TrackerInner {
    records: DashMap<String, UploadProgressRecord>,
    mirror: Option<PathBuf>,
    clock: Arc<dyn Clock>,
    dirty: Arc<Notify>,
    write_lock: Mutex<()>,
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        // Wakes the flusher so it sees the tracker is gone.
        self.dirty.notify_one();
    }
}

/// Key-value store of upload progress, keyed by `recordId:fileName`.
///
/// Any status may follow any other. Every mutation schedules a write of
/// the whole table to the mirror file, if one is configured; the mirror
/// only restores what was displayed, not the transfers themselves.
#[derive(Debug, Clone)]
pub struct UploadProgressTracker {
    inner: Arc<TrackerInner>,
}

impl UploadProgressTracker {
    fn build(mirror: Option<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                records: DashMap::new(),
                mirror,
                clock,
                dirty: Arc::new(Notify::new()),
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Tracker without a mirror file.
    pub fn in_memory() -> Self {
        Self::build(None, Arc::new(SystemClock))
    }

    /// Open a tracker mirrored to `path`, restoring the records saved there.
    ///
    /// An unreadable mirror is logged and ignored.
    pub async fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let tracker = Self::build(Some(path.clone()), clock);

        match read_json::<Vec<UploadProgressRecord>>(&path).await {
            Ok(Some(records)) => {
                for record in records {
                    tracker.inner.records.insert(record.key.clone(), record);
                }
                tracing::debug!(path = %path.display(), records = tracker.inner.records.len(), "Restored upload progress");
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable progress mirror");
            }
        }

        tokio::spawn(flush_on_change(
            Arc::downgrade(&tracker.inner),
            tracker.inner.dirty.clone(),
        ));
        Ok(tracker)
    }

    fn changed(&self) {
        if self.inner.mirror.is_some() {
            self.inner.dirty.notify_one();
        }
    }

    /// Insert a `pending` record, replacing any existing one.
    pub fn start(&self, key: &str, file_name: &str) -> UploadProgressRecord {
        let record = UploadProgressRecord::pending(key, file_name, self.inner.clock.now());
        self.inner.records.insert(key.to_string(), record.clone());
        self.changed();
        record
    }

    /// Overwrite progress, status and message of a record.
    pub fn update(
        &self,
        key: &str,
        progress: u8,
        status: ProgressStatus,
        message: Option<String>,
    ) -> UploadProgressRecord {
        self.apply(
            key,
            &ProgressUpdate {
                progress,
                status,
                message,
                url: None,
            },
        )
    }

    /// Apply a transfer progress notification.
    ///
    /// Unknown keys get a fresh record whose file name is taken from the key.
    pub fn apply(&self, key: &str, update: &ProgressUpdate) -> UploadProgressRecord {
        let now = self.inner.clock.now();
        let mut entry = self.inner.records.entry(key.to_string()).or_insert_with(|| {
            let file_name = key
                .split_once(KEY_SEPARATOR)
                .map(|(_, name)| name)
                .unwrap_or(key);
            UploadProgressRecord::pending(key, file_name, now)
        });
        let record = entry.value_mut();
        record.progress = update.progress.min(100);
        record.status = update.status;
        record.message = update.message.clone();
        if update.url.is_some() {
            record.url = update.url.clone();
        }
        record.updated_at = now;
        let snapshot = record.clone();
        drop(entry);

        self.changed();
        snapshot
    }

    /// Progress callback that starts `key` and records every update on it.
    pub fn callback(&self, key: &str, file_name: &str) -> ProgressCallback {
        self.start(key, file_name);
        let tracker = self.clone();
        let key = key.to_string();
        Arc::new(move |update: ProgressUpdate| {
            tracker.apply(&key, &update);
        })
    }

    /// Look up one record.
    pub fn get(&self, key: &str) -> Option<UploadProgressRecord> {
        self.inner.records.get(key).map(|r| r.value().clone())
    }

    /// All records belonging to `record_id`, ordered by key.
    pub fn get_by_record(&self, record_id: &str) -> Vec<UploadProgressRecord> {
        let mut records: Vec<_> = self
            .inner
            .records
            .iter()
            .filter(|r| r.belongs_to(record_id))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }

    /// Every record, ordered by key.
    pub fn snapshot(&self) -> Vec<UploadProgressRecord> {
        let mut records: Vec<_> = self.inner.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }

    /// Remove one record.
    pub fn remove(&self, key: &str) -> Option<UploadProgressRecord> {
        let removed = self.inner.records.remove(key).map(|(_, r)| r);
        if removed.is_some() {
            self.changed();
        }
        removed
    }

    /// Drop completed and failed records. Returns how many were removed.
    pub fn clear_finished(&self) -> usize {
        let before = self.inner.records.len();
        self.inner.records.retain(|_, r| !r.status.is_terminal());
        let removed = before - self.inner.records.len();
        if removed > 0 {
            self.changed();
        }
        removed
    }

    /// Write the current table to the mirror file now.
    pub async fn flush(&self) -> AppResult<()> {
        self.inner.flush().await
    }
}

impl TrackerInner {
    async fn flush(&self) -> AppResult<()> {
        let Some(path) = &self.mirror else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        let mut records: Vec<UploadProgressRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        write_json_atomic(path, &records).await
    }
}

async fn flush_on_change(inner: Weak<TrackerInner>, dirty: Arc<Notify>) {
    loop {
        dirty.notified().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if let Err(e) = inner.flush().await {
            tracing::warn!(error = %e, "Failed to mirror upload progress");
        }
    }
}
