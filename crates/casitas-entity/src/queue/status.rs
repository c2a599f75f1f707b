//! Queue item status and its transition table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a queued upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    /// Waiting for the next processing pass.
    Pending,
    /// A transfer is in flight.
    Uploading,
    /// The transfer finished and `result_url` is set.
    Completed,
    /// The last transfer failed and `error_message` is set.
    Error,
}

impl QueueStatus {
    /// Whether `self -> next` is a legal transition.
    ///
    /// | from      | to                                  |
    /// |-----------|-------------------------------------|
    /// | pending   | uploading                           |
    /// | uploading | completed, error, pending (recovery)|
    /// | error     | pending (retry)                     |
    /// | completed | (none)                              |
    pub fn can_transition_to(&self, next: QueueStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Uploading)
                | (Self::Uploading, Self::Completed)
                | (Self::Uploading, Self::Error)
                | (Self::Uploading, Self::Pending)
                | (Self::Error, Self::Pending)
        )
    }

    /// Check if the item has reached a state that needs no further processing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use QueueStatus::*;
        let all = [Pending, Uploading, Completed, Error];
        let legal = [
            (Pending, Uploading),
            (Uploading, Completed),
            (Uploading, Error),
            (Uploading, Pending),
            (Error, Pending),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&QueueStatus::Uploading).unwrap(), "\"uploading\"");
        let s: QueueStatus = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(s, QueueStatus::Error);
    }
}
