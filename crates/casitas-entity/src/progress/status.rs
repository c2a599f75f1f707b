//! Progress phases reported to observers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of an upload as shown to observers.
///
/// Any phase may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Pending,
    Uploading,
    /// The service is assembling chunks.
    Processing,
    /// The service is writing to the media store.
    Storing,
    /// The service is updating the inspection record.
    Updating,
    Completed,
    Error,
}

impl ProgressStatus {
    /// Check if no further updates are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Storing => "storing",
            Self::Updating => "updating",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
