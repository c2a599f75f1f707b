//! Chunk assembler: concatenates chunks into a single scratch file.

use futures::stream::{self, StreamExt};

use casitas_core::result::AppResult;
use casitas_core::types::UploadId;

use super::upload::ChunkedUploadHandler;

/// Assembles uploaded chunks into one file in scratch storage.
#[derive(Debug, Clone)]
pub struct ChunkAssembler {
    /// Handler owning the chunk layout.
    upload_handler: ChunkedUploadHandler,
}

impl ChunkAssembler {
    /// Create a new chunk assembler.
    pub fn new(upload_handler: ChunkedUploadHandler) -> Self {
        Self { upload_handler }
    }

    /// Concatenate `chunk_paths` in order into the upload's assembled file.
    ///
    /// Chunk files are deleted once the assembled file is fully written; if
    /// writing fails the chunks are left in place and the partial assembled
    /// file is removed. Returns the assembled path and its size.
    pub async fn assemble(&self, upload_id: &UploadId, chunk_paths: &[String]) -> AppResult<(String, u64)> {
        let target_path = ChunkedUploadHandler::assembled_path(upload_id);
        tracing::info!(
            upload_id = %upload_id,
            total_chunks = chunk_paths.len(),
            target_path = %target_path,
            "Assembling chunks"
        );

        let provider = self.upload_handler.provider().clone();
        let reader = provider.clone();
        let chunks = stream::iter(chunk_paths.to_vec()).then(move |path| {
            let reader = reader.clone();
            async move {
                reader
                    .read_bytes(&path)
                    .await
                    .map_err(|e| std::io::Error::other(e.to_string()))
            }
        });

        let total_bytes = match provider.write_stream(&target_path, Box::pin(chunks)).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = provider.delete(&target_path).await;
                return Err(e);
            }
        };

        for path in chunk_paths {
            provider.delete(path).await?;
        }
        self.upload_handler.delete_all_chunks(upload_id).await?;

        tracing::info!(
            upload_id = %upload_id,
            bytes = total_bytes,
            "Assembly complete"
        );

        Ok((target_path, total_bytes))
    }
}
