//! Observable progress of one logical upload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::ProgressStatus;

/// Separator between the record id and the file name in progress keys.
pub const KEY_SEPARATOR: char = ':';

/// Last known state of one upload, keyed by `<recordId>:<fileName>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgressRecord {
    /// Composite key.
    pub key: String,
    /// File being uploaded.
    pub file_name: String,
    /// Progress, 0-100.
    pub progress: u8,
    /// Current phase.
    pub status: ProgressStatus,
    /// Optional human-readable detail (error text, phase note).
    pub message: Option<String>,
    /// Final URL once completed.
    pub url: Option<String>,
    /// When the record last changed.
    pub updated_at: DateTime<Utc>,
}

impl UploadProgressRecord {
    /// Build the composite key for a record/file pair.
    pub fn key_for(record_id: &str, file_name: &str) -> String {
        format!("{record_id}{KEY_SEPARATOR}{file_name}")
    }

    /// Create a `pending` record.
    pub fn pending(key: impl Into<String>, file_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            file_name: file_name.into(),
            progress: 0,
            status: ProgressStatus::Pending,
            message: None,
            url: None,
            updated_at: now,
        }
    }

    /// Owning record id, i.e. the key up to the first separator.
    pub fn record_id(&self) -> &str {
        self.key
            .split_once(KEY_SEPARATOR)
            .map_or(self.key.as_str(), |(record, _)| record)
    }

    /// Whether this record belongs to `record_id`.
    pub fn belongs_to(&self, record_id: &str) -> bool {
        self.record_id() == record_id
    }
}
