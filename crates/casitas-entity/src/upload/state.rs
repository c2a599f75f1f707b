//! Upload session state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an upload session.
///
/// ```text
/// Receiving ──assemble──▶ Assembled ──media upload──▶ Stored ──record update──▶ (removed)
/// ```
///
/// A failed finalize leaves the session in the furthest state it reached so
/// that a retried finalize resumes from there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SessionState {
    /// Chunks are being received.
    Receiving,
    /// All chunks were concatenated into one scratch file.
    Assembled {
        /// Scratch path of the assembled file.
        path: String,
        /// Size of the assembled file.
        bytes: u64,
    },
    /// The assembled file was accepted by the media store.
    Stored {
        /// Permanent URL returned by the media store.
        url: String,
    },
}

impl SessionState {
    /// Return the state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receiving => "receiving",
            Self::Assembled { .. } => "assembled",
            Self::Stored { .. } => "stored",
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Receiving, Self::Assembled { .. }) | (Self::Assembled { .. }, Self::Stored { .. })
        )
    }

    /// Whether chunks may still be written.
    pub fn accepts_chunks(&self) -> bool {
        matches!(self, Self::Receiving)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_forward_transitions_are_legal() {
        let assembled = SessionState::Assembled {
            path: "a".into(),
            bytes: 1,
        };
        let stored = SessionState::Stored { url: "u".into() };

        assert!(SessionState::Receiving.can_transition_to(&assembled));
        assert!(assembled.can_transition_to(&stored));

        assert!(!SessionState::Receiving.can_transition_to(&stored));
        assert!(!stored.can_transition_to(&SessionState::Receiving));
        assert!(!assembled.can_transition_to(&SessionState::Receiving));
        assert!(!stored.can_transition_to(&assembled));
    }
}
