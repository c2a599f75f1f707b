//! Transfer failures, tagged with the protocol phase that failed.

use std::fmt;

use casitas_core::error::{AppError, ErrorKind};

/// Protocol phase of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Init,
    Chunk,
    Finalize,
    Health,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Chunk => write!(f, "chunk"),
            Self::Finalize => write!(f, "finalize"),
            Self::Health => write!(f, "health"),
        }
    }
}

/// Failure of a chunked transfer.
///
/// `status` is the HTTP status when the service answered, `None` when the
/// request never got a response.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Upload session init failed: {message}")]
    SessionInit { status: Option<u16>, message: String },

    #[error("Chunk {index} transfer failed: {message}")]
    ChunkTransfer {
        index: u32,
        status: Option<u16>,
        message: String,
    },

    #[error("Finalize failed: {message}")]
    Finalize { status: Option<u16>, message: String },

    #[error("Invalid upload input: {0}")]
    InvalidInput(String),

    #[error("{phase} request timed out")]
    Timeout {
        phase: TransferPhase,
        chunk_index: Option<u32>,
    },

    #[error("Upload service unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// Build the error for a failed phase.
    pub fn phase(phase: TransferPhase, chunk_index: Option<u32>, status: Option<u16>, message: String) -> Self {
        match phase {
            TransferPhase::Init => Self::SessionInit { status, message },
            TransferPhase::Chunk => Self::ChunkTransfer {
                index: chunk_index.unwrap_or_default(),
                status,
                message,
            },
            TransferPhase::Finalize => Self::Finalize { status, message },
            TransferPhase::Health => Self::Unavailable(message),
        }
    }

    /// HTTP status returned by the service, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::SessionInit { status, .. }
            | Self::ChunkTransfer { status, .. }
            | Self::Finalize { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether the failure is a transport problem rather than a rejection.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Unavailable(_) => true,
            Self::SessionInit { status, .. }
            | Self::ChunkTransfer { status, .. }
            | Self::Finalize { status, .. } => status.is_none(),
            _ => false,
        }
    }
}

impl From<TransferError> for AppError {
    fn from(err: TransferError) -> Self {
        let kind = match &err {
            TransferError::InvalidInput(_) => ErrorKind::Validation,
            TransferError::Timeout { .. } => ErrorKind::Timeout,
            TransferError::Unavailable(_) => ErrorKind::ServiceUnavailable,
            TransferError::Io(_) => ErrorKind::Storage,
            _ => ErrorKind::ExternalService,
        };
        AppError::with_source(kind, err.to_string(), err)
    }
}
