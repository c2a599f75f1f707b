//! A queued upload request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use casitas_core::error::AppError;
use casitas_core::types::UploadId;

use super::status::QueueStatus;

/// One upload request held by the offline queue.
///
/// The item id doubles as the upload id used against the assembly service,
/// so a replayed item resets its own server-side session instead of leaving
/// an orphan behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedUploadItem {
    /// Queue key and upload id.
    pub id: UploadId,
    /// Original file name.
    pub file_name: String,
    /// Payload size in bytes.
    pub file_size: u64,
    /// Inspection record the result is attached to.
    pub record_id: String,
    /// Evidence slot the result fills, if any.
    pub target_field: Option<String>,
    /// Current status.
    pub status: QueueStatus,
    /// Transfer progress, 0-100.
    pub progress: u8,
    /// Final URL, set only when `status` is `completed`.
    pub result_url: Option<String>,
    /// Failure description, set only when `status` is `error`.
    pub error_message: Option<String>,
    /// Number of transfers attempted.
    pub attempts: u32,
    /// When the item was enqueued.
    pub created_at: DateTime<Utc>,
    /// When the item last changed.
    pub updated_at: DateTime<Utc>,
}

impl QueuedUploadItem {
    /// Create a pending item.
    pub fn new(
        id: UploadId,
        file_name: impl Into<String>,
        file_size: u64,
        record_id: impl Into<String>,
        target_field: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            file_size,
            record_id: record_id.into(),
            target_field,
            status: QueueStatus::Pending,
            progress: 0,
            result_url: None,
            error_message: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build the default item id: creation time in milliseconds plus a short
    /// random suffix.
    pub fn generate_id(now: DateTime<Utc>) -> UploadId {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        UploadId::parse(format!("{}-{}", now.timestamp_millis(), &suffix[..8]))
            .unwrap_or_else(|_| UploadId::generate())
    }

    fn transition(&mut self, next: QueueStatus, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::conflict(format!(
                "Queue item {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// `pending -> uploading`.
    pub fn mark_uploading(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        self.transition(QueueStatus::Uploading, now)?;
        self.attempts += 1;
        self.progress = 0;
        self.error_message = None;
        Ok(())
    }

    /// Record transfer progress while uploading.
    pub fn set_progress(&mut self, progress: u8, now: DateTime<Utc>) {
        if self.status == QueueStatus::Uploading {
            self.progress = progress.min(100);
            self.updated_at = now;
        }
    }

    /// `uploading -> completed`.
    pub fn mark_completed(&mut self, url: impl Into<String>, now: DateTime<Utc>) -> Result<(), AppError> {
        self.transition(QueueStatus::Completed, now)?;
        self.progress = 100;
        self.result_url = Some(url.into());
        self.error_message = None;
        Ok(())
    }

    /// `uploading -> error`.
    pub fn mark_failed(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> Result<(), AppError> {
        self.transition(QueueStatus::Error, now)?;
        let message = message.into();
        self.error_message = Some(if message.is_empty() {
            "upload failed".to_string()
        } else {
            message
        });
        self.result_url = None;
        Ok(())
    }

    /// `error -> pending`.
    pub fn retry(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status != QueueStatus::Error {
            return Err(AppError::conflict(format!(
                "Queue item {} is {} and cannot be retried",
                self.id, self.status
            )));
        }
        self.transition(QueueStatus::Pending, now)?;
        self.error_message = None;
        self.progress = 0;
        Ok(())
    }

    /// `uploading -> pending`, for items interrupted by a restart.
    ///
    /// Returns whether the item was changed.
    pub fn recover(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != QueueStatus::Uploading {
            return false;
        }
        self.status = QueueStatus::Pending;
        self.progress = 0;
        self.updated_at = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> QueuedUploadItem {
        QueuedUploadItem::new(
            UploadId::parse("q1").unwrap(),
            "a.jpg",
            10,
            "r1",
            Some("foto_fachada".into()),
            Utc::now(),
        )
    }

    #[test]
    fn test_happy_path() {
        let mut it = item();
        it.mark_uploading(Utc::now()).unwrap();
        it.set_progress(50, Utc::now());
        assert_eq!(it.progress, 50);
        it.mark_completed("https://media/x.jpg", Utc::now()).unwrap();
        assert_eq!(it.status, QueueStatus::Completed);
        assert_eq!(it.progress, 100);
        assert_eq!(it.result_url.as_deref(), Some("https://media/x.jpg"));
        assert_eq!(it.attempts, 1);
    }

    #[test]
    fn test_failure_then_retry() {
        let mut it = item();
        it.mark_uploading(Utc::now()).unwrap();
        it.mark_failed("", Utc::now()).unwrap();
        assert_eq!(it.status, QueueStatus::Error);
        assert!(!it.error_message.as_deref().unwrap_or_default().is_empty());

        it.retry(Utc::now()).unwrap();
        assert_eq!(it.status, QueueStatus::Pending);
        assert!(it.error_message.is_none());
    }

    #[test]
    fn test_completed_is_final() {
        let mut it = item();
        it.mark_uploading(Utc::now()).unwrap();
        it.mark_completed("u", Utc::now()).unwrap();
        assert!(it.retry(Utc::now()).is_err());
        assert!(it.mark_uploading(Utc::now()).is_err());
        assert!(!it.recover(Utc::now()));
    }

    #[test]
    fn test_recover_resets_interrupted_upload() {
        let mut it = item();
        it.mark_uploading(Utc::now()).unwrap();
        it.set_progress(40, Utc::now());
        assert!(it.recover(Utc::now()));
        assert_eq!(it.status, QueueStatus::Pending);
        assert_eq!(it.progress, 0);
    }

    #[test]
    fn test_generated_ids_are_path_safe_and_unique() {
        let now = Utc::now();
        let a = QueuedUploadItem::generate_id(now);
        let b = QueuedUploadItem::generate_id(now);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(&now.timestamp_millis().to_string()));
    }
}
