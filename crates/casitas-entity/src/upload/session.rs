//! In-flight chunked upload session.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use casitas_core::error::AppError;
use casitas_core::traits::session::SessionRecord;
use casitas_core::types::UploadId;

use super::state::SessionState;

/// Extra chunks an announced count may carry beyond what the declared size implies.
pub const CHUNK_COUNT_SLACK: u32 = 1;

/// A received chunk persisted in scratch storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSlot {
    /// Scratch storage path of the chunk file.
    pub path: String,
    /// Size of the chunk in bytes.
    pub bytes: u64,
}

/// Server-side bookkeeping for one chunked file transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    /// Opaque identifier shared with the client.
    pub upload_id: UploadId,
    /// File name supplied at init.
    pub file_name: String,
    /// Size supplied at init. Advisory, but it bounds the chunk count.
    pub declared_size: u64,
    /// Chunk size agreed with the client.
    pub chunk_size: u64,
    /// Inspection record the upload is attached to.
    pub record_id: String,
    /// Evidence slot the upload fills, if any.
    pub field_name: Option<String>,
    /// Chunk count declared by the client, once known.
    pub total_chunks: Option<u32>,
    /// Received chunk slots keyed by chunk index.
    pub chunks: BTreeMap<u32, ChunkSlot>,
    /// Running total of bytes held in the chunk slots.
    pub received_bytes: u64,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Set while a finalize is running against this session.
    pub finalizing: bool,
}

impl UploadSession {
    /// Create an empty session in the `Receiving` state.
    pub fn new(
        upload_id: UploadId,
        file_name: impl Into<String>,
        declared_size: u64,
        chunk_size: u64,
        record_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            upload_id,
            file_name: file_name.into(),
            declared_size,
            chunk_size: chunk_size.max(1),
            record_id: record_id.into(),
            field_name: None,
            total_chunks: None,
            chunks: BTreeMap::new(),
            received_bytes: 0,
            created_at,
            state: SessionState::Receiving,
            finalizing: false,
        }
    }

    /// Attach the evidence slot this upload fills.
    pub fn with_field_name(mut self, field_name: Option<String>) -> Self {
        self.field_name = field_name.filter(|f| !f.is_empty());
        self
    }

    /// Chunk count implied by the declared size.
    pub fn size_chunks(&self) -> u32 {
        let count = self.declared_size.div_ceil(self.chunk_size);
        u32::try_from(count).unwrap_or(u32::MAX).max(1)
    }

    /// Record the chunk count announced by the client.
    ///
    /// A count that disagrees with one announced earlier, or that the
    /// declared size cannot account for, is rejected.
    pub fn declare_total_chunks(&mut self, total: u32) -> Result<(), AppError> {
        if total == 0 {
            return Err(AppError::validation("totalChunks must be at least 1"));
        }
        let limit = self.size_chunks().saturating_add(CHUNK_COUNT_SLACK);
        if total > limit {
            return Err(AppError::validation(format!(
                "totalChunks {total} exceeds the {limit} chunks a {}-byte file can hold",
                self.declared_size
            )));
        }
        match self.total_chunks {
            Some(known) if known != total => Err(AppError::validation(format!(
                "totalChunks {total} does not match the {known} chunks announced earlier"
            ))),
            _ => {
                if self.chunks.range(total..).next().is_some() {
                    return Err(AppError::validation(format!(
                        "totalChunks {total} is smaller than a chunk index already received"
                    )));
                }
                self.total_chunks = Some(total);
                Ok(())
            }
        }
    }

    /// Store the slot for chunk `index`, returning the slot it replaced.
    pub fn record_chunk(&mut self, index: u32, slot: ChunkSlot) -> Result<Option<ChunkSlot>, AppError> {
        if !self.state.accepts_chunks() {
            return Err(AppError::conflict(format!(
                "Upload {} is {} and no longer accepts chunks",
                self.upload_id, self.state
            )));
        }
        if self.finalizing {
            return Err(AppError::conflict(format!(
                "Upload {} is being finalized and no longer accepts chunks",
                self.upload_id
            )));
        }
        let expected = self.expected_chunks();
        if index >= expected {
            return Err(AppError::validation(format!(
                "chunkIndex {index} is out of range for {expected} chunks"
            )));
        }

        self.received_bytes += slot.bytes;
        let previous = self.chunks.insert(index, slot);
        if let Some(prev) = &previous {
            self.received_bytes = self.received_bytes.saturating_sub(prev.bytes);
        }
        Ok(previous)
    }

    /// Number of chunks finalize requires.
    ///
    /// The announced count when there is one, otherwise the count implied by
    /// the declared size.
    pub fn expected_chunks(&self) -> u32 {
        self.total_chunks.unwrap_or_else(|| self.size_chunks())
    }

    /// Smallest chunk index that has not been received.
    pub fn first_missing_chunk(&self) -> Option<u32> {
        (0..self.expected_chunks()).find(|i| !self.chunks.contains_key(i))
    }

    /// Indices of the chunks received so far, ascending.
    pub fn received_indices(&self) -> Vec<u32> {
        self.chunks.keys().copied().collect()
    }

    /// Scratch paths of every received chunk, in index order.
    pub fn chunk_paths(&self) -> Vec<String> {
        self.chunks.values().map(|slot| slot.path.clone()).collect()
    }

    /// Claim the finalize guard.
    pub fn begin_finalize(&mut self) -> Result<(), AppError> {
        if self.finalizing {
            return Err(AppError::conflict(format!(
                "Upload {} is already being finalized",
                self.upload_id
            )));
        }
        self.finalizing = true;
        Ok(())
    }

    /// Release the finalize guard.
    pub fn end_finalize(&mut self) {
        self.finalizing = false;
    }

    /// Move to `next`, rejecting transitions the state machine does not allow.
    pub fn transition(&mut self, next: SessionState) -> Result<(), AppError> {
        if !self.state.can_transition_to(&next) {
            return Err(AppError::conflict(format!(
                "Upload {} cannot move from {} to {}",
                self.upload_id, self.state, next
            )));
        }
        if matches!(next, SessionState::Assembled { .. }) {
            self.chunks.clear();
        }
        self.state = next;
        Ok(())
    }
}

impl SessionRecord for UploadSession {
    fn key(&self) -> &str {
        self.upload_id.as_str()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn is_busy(&self) -> bool {
        self.finalizing
    }
}
