//! Chunk scratch writes.

use std::sync::Arc;

use bytes::Bytes;

use casitas_core::result::AppResult;
use casitas_core::traits::storage::StorageProvider;
use casitas_core::types::UploadId;
use casitas_entity::upload::ChunkSlot;

/// Directory holding per-upload chunk directories.
pub const CHUNKS_DIR: &str = "_chunks";
/// Directory holding assembled files awaiting the media store.
pub const ASSEMBLED_DIR: &str = "_assembled";

/// Handles individual chunk writes during a chunked upload.
///
/// Chunk paths are derived from `(upload_id, index)` only, so a resent
/// chunk overwrites the earlier copy and distinct uploads never share files.
#[derive(Debug, Clone)]
pub struct ChunkedUploadHandler {
    /// The storage provider for scratch chunk storage.
    provider: Arc<dyn StorageProvider>,
}

impl ChunkedUploadHandler {
    /// Create a new chunked upload handler.
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self { provider }
    }

    /// Write a single chunk to scratch storage.
    pub async fn write_chunk(&self, upload_id: &UploadId, index: u32, data: Bytes) -> AppResult<ChunkSlot> {
        let path = Self::chunk_path(upload_id, index);
        let bytes = data.len() as u64;
        self.provider.write(&path, data).await?;
        Ok(ChunkSlot { path, bytes })
    }

    /// Read a chunk from scratch storage.
    pub async fn read_chunk(&self, upload_id: &UploadId, index: u32) -> AppResult<Bytes> {
        self.provider
            .read_bytes(&Self::chunk_path(upload_id, index))
            .await
    }

    /// Delete every chunk written for an upload.
    pub async fn delete_all_chunks(&self, upload_id: &UploadId) -> AppResult<()> {
        self.provider.delete_dir(&Self::upload_dir(upload_id)).await
    }

    /// Read the assembled file of an upload.
    pub async fn read_assembled(&self, path: &str) -> AppResult<Bytes> {
        self.provider.read_bytes(path).await
    }

    /// Delete the assembled file of an upload.
    pub async fn delete_assembled(&self, upload_id: &UploadId) -> AppResult<()> {
        self.provider.delete(&Self::assembled_path(upload_id)).await
    }

    /// Scratch path for a chunk.
    pub fn chunk_path(upload_id: &UploadId, index: u32) -> String {
        format!("{CHUNKS_DIR}/{upload_id}/{index:06}")
    }

    /// Scratch directory for an upload's chunks.
    pub fn upload_dir(upload_id: &UploadId) -> String {
        format!("{CHUNKS_DIR}/{upload_id}")
    }

    /// Scratch path of the assembled file.
    pub fn assembled_path(upload_id: &UploadId) -> String {
        format!("{ASSEMBLED_DIR}/{upload_id}")
    }

    /// The underlying provider.
    pub fn provider(&self) -> &Arc<dyn StorageProvider> {
        &self.provider
    }
}
