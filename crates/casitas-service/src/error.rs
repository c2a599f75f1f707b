//! Upload pipeline failures.

use casitas_core::error::{AppError, ErrorKind};
use thiserror::Error;

/// Failure of an init, chunk or finalize request.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Required request fields were absent or empty.
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    /// The upload id is not path-safe.
    #[error("Invalid uploadId: {0}")]
    InvalidUploadId(String),
    /// No session exists for the upload id.
    #[error("Upload session {0} not found")]
    SessionNotFound(String),
    /// A chunk request carried no payload.
    #[error("No chunk data received")]
    NoChunkData,
    /// Finalize found a gap; carries the smallest missing index.
    #[error("Missing chunk {0}")]
    MissingChunk(u32),
    /// The inspection record does not exist.
    #[error("Record {0} not found")]
    RecordNotFound(String),
    /// The chunk index or count is inconsistent with the session.
    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),
    /// Another finalize holds the session.
    #[error("Upload {0} is already being finalized")]
    FinalizeInProgress(String),
    /// The session has been assembled and no longer accepts chunks.
    #[error("{0}")]
    SessionClosed(String),
    /// The media store rejected or failed the upload.
    #[error("Media store upload failed: {0}")]
    MediaStore(#[source] AppError),
    /// The record store failed to read or update the record.
    #[error("Record update failed: {0}")]
    RecordStore(#[source] AppError),
    /// Scratch storage failed.
    #[error("Scratch storage failed: {0}")]
    Storage(#[source] AppError),
}

impl UploadError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingFields(_) => "MISSING_FIELDS",
            Self::InvalidUploadId(_) => "INVALID_UPLOAD_ID",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::NoChunkData => "NO_CHUNK_DATA",
            Self::MissingChunk(_) => "MISSING_CHUNK",
            Self::RecordNotFound(_) => "RECORD_NOT_FOUND",
            Self::InvalidChunk(_) => "INVALID_CHUNK",
            Self::FinalizeInProgress(_) => "FINALIZE_IN_PROGRESS",
            Self::SessionClosed(_) => "SESSION_CLOSED",
            Self::MediaStore(_) => "MEDIA_STORE_ERROR",
            Self::RecordStore(_) => "RECORD_STORE_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Error category, which determines the HTTP status.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingFields(_)
            | Self::InvalidUploadId(_)
            | Self::NoChunkData
            | Self::MissingChunk(_)
            | Self::InvalidChunk(_) => ErrorKind::Validation,
            Self::SessionNotFound(_) | Self::RecordNotFound(_) => ErrorKind::NotFound,
            Self::FinalizeInProgress(_) | Self::SessionClosed(_) => ErrorKind::Conflict,
            Self::MediaStore(_) | Self::RecordStore(_) | Self::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Whether the failure happened in a downstream store during finalize.
    pub fn is_downstream(&self) -> bool {
        matches!(
            self,
            Self::MediaStore(_) | Self::RecordStore(_) | Self::Storage(_)
        )
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        let kind = err.kind();
        AppError::with_source(kind, err.to_string(), err)
    }
}
