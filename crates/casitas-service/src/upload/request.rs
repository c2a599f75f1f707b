//! Request and response shapes of the assembly service.
//!
//! Request fields are optional so that absent and empty values are
//! reported together as `MissingFields` rather than as parse errors.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `POST /upload/init` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    pub upload_id: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub record_id: Option<String>,
    /// Evidence slot to fill on finalize.
    pub field_name: Option<String>,
    /// Chunk count, if the client announces it up front.
    pub total_chunks: Option<u32>,
}

/// Result of a successful init.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Initialized {
    pub message: String,
    pub upload_id: String,
    /// Chunk size the service expects.
    pub chunk_size: u64,
    /// Chunk count finalize will require, as far as known.
    pub total_chunks: u32,
    /// Whether an existing session was replaced.
    pub reset: bool,
}

/// `POST /upload/chunk` fields.
#[derive(Debug, Clone, Default)]
pub struct ChunkRequest {
    pub upload_id: Option<String>,
    pub chunk_index: Option<u32>,
    pub total_chunks: Option<u32>,
    pub data: Option<Bytes>,
}

/// Result of a stored chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAccepted {
    pub message: String,
    pub chunk_index: u32,
    pub received_chunks: usize,
}

/// `POST /upload/finalize` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub upload_id: Option<String>,
    pub file_name: Option<String>,
    pub record_id: Option<String>,
    pub field_name: Option<String>,
}

/// Result of a successful finalize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finalized {
    pub url: String,
}

/// Snapshot of a session, returned by `GET /upload/{uploadId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub upload_id: String,
    pub file_name: String,
    pub record_id: String,
    pub field_name: Option<String>,
    pub state: String,
    pub finalizing: bool,
    pub received_chunks: Vec<u32>,
    pub total_chunks: u32,
    pub received_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Expired sessions removed from the session store.
    pub sessions_removed: usize,
    /// Scratch entries removed that belonged to no live session.
    pub orphans_removed: usize,
}
