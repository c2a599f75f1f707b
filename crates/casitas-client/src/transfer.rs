//! Chunked transfer client for the assembly service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use casitas_core::config::ClientConfig;
use casitas_core::error::AppError;
use casitas_core::types::UploadId;
use casitas_entity::ProgressStatus;

use crate::error::{TransferError, TransferPhase};

/// Progress notification emitted during a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Percentage, 0 to 100.
    pub progress: u8,
    pub status: ProgressStatus,
    pub message: Option<String>,
    /// Set on the final `Completed` update.
    pub url: Option<String>,
}

impl ProgressUpdate {
    fn new(progress: u8, status: ProgressStatus) -> Self {
        Self {
            progress,
            status,
            message: None,
            url: None,
        }
    }
}

/// Receives progress notifications.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// A file to send and where its URL must end up.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Session id; generated when absent.
    pub upload_id: Option<UploadId>,
    pub file_name: String,
    pub data: Bytes,
    pub record_id: String,
    /// Evidence slot to fill.
    pub field_name: Option<String>,
}

/// Anything that can push a file through the upload protocol.
#[async_trait]
pub trait Uploader: Send + Sync + std::fmt::Debug + 'static {
    /// Upload the file and return its permanent URL.
    async fn upload(&self, request: UploadRequest, on_progress: ProgressCallback) -> Result<String, TransferError>;

    /// Check that the service answers.
    async fn health(&self) -> Result<(), TransferError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitBody<'a> {
    upload_id: &'a str,
    file_name: &'a str,
    file_size: u64,
    record_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field_name: Option<&'a str>,
    total_chunks: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FinalizeBody<'a> {
    upload_id: &'a str,
    file_name: &'a str,
    record_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field_name: Option<&'a str>,
}

#[derive(Deserialize)]
struct FinalizeResponse {
    url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Number of chunks `size` bytes split into.
pub fn chunk_count(size: u64, chunk_size: u64) -> u32 {
    size.div_ceil(chunk_size.max(1)) as u32
}

/// HTTP client for the three-phase upload protocol.
///
/// Chunks are sent one at a time, in index order. A failed request aborts
/// the upload; retrying is up to the caller.
#[derive(Debug, Clone)]
pub struct ChunkTransferClient {
    http: reqwest::Client,
    base_url: Url,
    chunk_size: u64,
}

impl ChunkTransferClient {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: &str, chunk_size: u64, timeout: Duration) -> Result<Self, AppError> {
        if chunk_size == 0 {
            return Err(AppError::configuration("chunk_size_bytes must be greater than zero"));
        }
        // Relative joins keep a path prefix only when it ends with '/'.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| AppError::configuration(format!("Invalid server URL {base_url}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url,
            chunk_size,
        })
    }

    /// Create a client from the `[client]` settings.
    pub fn from_config(config: &ClientConfig) -> Result<Self, AppError> {
        Self::new(
            &config.server_url,
            config.chunk_size_bytes,
            Duration::from_secs(config.request_timeout_seconds.max(1)),
        )
    }

    /// Chunk size in bytes.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    fn url(&self, path: &str, phase: TransferPhase) -> Result<Url, TransferError> {
        self.base_url
            .join(path)
            .map_err(|e| TransferError::InvalidInput(format!("Cannot build {phase} URL: {e}")))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        phase: TransferPhase,
        chunk_index: Option<u32>,
    ) -> Result<T, TransferError> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, phase, chunk_index))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, phase, chunk_index))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| format!("HTTP {status}: {body}"));
            return Err(TransferError::phase(phase, chunk_index, Some(status.as_u16()), message));
        }
        serde_json::from_str(&body).map_err(|e| {
            TransferError::phase(
                phase,
                chunk_index,
                Some(status.as_u16()),
                format!("Unexpected response body: {e}"),
            )
        })
    }

    async fn init(&self, body: &InitBody<'_>) -> Result<(), TransferError> {
        let url = self.url("upload/init", TransferPhase::Init)?;
        let _: serde_json::Value = self
            .send(self.http.post(url).json(body), TransferPhase::Init, None)
            .await?;
        Ok(())
    }

    async fn send_chunk(&self, upload_id: &str, index: u32, total: u32, data: Bytes) -> Result<(), TransferError> {
        let url = self.url("upload/chunk", TransferPhase::Chunk)?;
        let form = Form::new()
            .text("uploadId", upload_id.to_string())
            .text("chunkIndex", index.to_string())
            .text("totalChunks", total.to_string())
            .part(
                "chunk",
                Part::bytes(data.to_vec())
                    .file_name("blob")
                    .mime_str("application/octet-stream")
                    .map_err(|e| TransferError::InvalidInput(e.to_string()))?,
            );
        let _: serde_json::Value = self
            .send(self.http.post(url).multipart(form), TransferPhase::Chunk, Some(index))
            .await?;
        Ok(())
    }

    async fn finalize(&self, body: &FinalizeBody<'_>) -> Result<String, TransferError> {
        let url = self.url("upload/finalize", TransferPhase::Finalize)?;
        let response: FinalizeResponse = self
            .send(self.http.post(url).json(body), TransferPhase::Finalize, None)
            .await?;
        Ok(response.url)
    }
}

fn transport_error(err: reqwest::Error, phase: TransferPhase, chunk_index: Option<u32>) -> TransferError {
    if err.is_timeout() {
        TransferError::Timeout { phase, chunk_index }
    } else {
        TransferError::phase(phase, chunk_index, None, err.to_string())
    }
}

#[async_trait]
impl Uploader for ChunkTransferClient {
    async fn upload(&self, request: UploadRequest, on_progress: ProgressCallback) -> Result<String, TransferError> {
        if request.data.is_empty() {
            return Err(TransferError::InvalidInput("file is empty".into()));
        }
        if request.record_id.trim().is_empty() {
            return Err(TransferError::InvalidInput("recordId is required".into()));
        }
        if request.file_name.trim().is_empty() {
            return Err(TransferError::InvalidInput("fileName is required".into()));
        }

        let upload_id = request.upload_id.unwrap_or_else(UploadId::generate);
        let size = request.data.len() as u64;
        let total = chunk_count(size, self.chunk_size);
        let field_name = request.field_name.as_deref();

        self.init(&InitBody {
            upload_id: upload_id.as_str(),
            file_name: &request.file_name,
            file_size: size,
            record_id: &request.record_id,
            field_name,
            total_chunks: total,
        })
        .await?;
        info!(upload_id = %upload_id, file_name = %request.file_name, bytes = size, total_chunks = total, "Upload session opened");
        on_progress(ProgressUpdate::new(0, ProgressStatus::Uploading));

        for index in 0..total {
            let start = (index as u64 * self.chunk_size) as usize;
            let end = (start + self.chunk_size as usize).min(request.data.len());
            self.send_chunk(upload_id.as_str(), index, total, request.data.slice(start..end))
                .await?;
            debug!(upload_id = %upload_id, chunk_index = index, total_chunks = total, "Chunk sent");

            let progress = ((index as u64 + 1) * 100 / total as u64) as u8;
            on_progress(ProgressUpdate::new(progress, ProgressStatus::Uploading));
        }

        on_progress(ProgressUpdate::new(100, ProgressStatus::Processing));
        let url = self
            .finalize(&FinalizeBody {
                upload_id: upload_id.as_str(),
                file_name: &request.file_name,
                record_id: &request.record_id,
                field_name,
            })
            .await?;

        info!(upload_id = %upload_id, url = %url, "Upload completed");
        on_progress(ProgressUpdate {
            url: Some(url.clone()),
            ..ProgressUpdate::new(100, ProgressStatus::Completed)
        });
        Ok(url)
    }

    async fn health(&self) -> Result<(), TransferError> {
        let url = self.url("health", TransferPhase::Health)?;
        let _: serde_json::Value = self.send(self.http.get(url), TransferPhase::Health, None).await?;
        Ok(())
    }
}
