//! Chunked upload handlers: init, chunk, finalize, and status.

use axum::Json;
use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};

use casitas_service::{
    ChunkAccepted, ChunkRequest, FinalizeRequest, Finalized, InitRequest, Initialized,
    SessionStatus, UploadError,
};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /upload/init
pub async fn init_upload(
    State(state): State<AppState>,
    body: Result<Json<InitRequest>, JsonRejection>,
) -> Result<Json<Initialized>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let initialized = state.uploads.init(req).await?;
    Ok(Json(initialized))
}

/// POST /upload/chunk (multipart: `chunk`, `uploadId`, `chunkIndex`, `totalChunks`)
pub async fn upload_chunk(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ChunkAccepted>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let mut req = ChunkRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "chunk" => {
                req.data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Read error: {e}")))?,
                );
            }
            "uploadId" => req.upload_id = Some(field_text(field).await?),
            "chunkIndex" => req.chunk_index = field_number(field, "chunkIndex").await?,
            "totalChunks" => req.total_chunks = field_number(field, "totalChunks").await?,
            _ => {}
        }
    }

    let accepted = state.uploads.receive_chunk(req).await?;
    Ok(Json(accepted))
}

/// POST /upload/finalize
pub async fn finalize_upload(
    State(state): State<AppState>,
    body: Result<Json<FinalizeRequest>, JsonRejection>,
) -> Result<Json<Finalized>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    match state.uploads.finalize(req).await {
        Ok(finalized) => Ok(Json(finalized)),
        Err(err) => Err(ApiError::from(err).with_media_diagnostics(state.uploads.media_diagnostics())),
    }
}

/// GET /upload/{upload_id}
pub async fn upload_status(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> Result<Json<SessionStatus>, ApiError> {
    let status = state.uploads.status(&upload_id).await?;
    Ok(Json(status))
}

async fn field_text(field: Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Read error: {e}")))
}

/// Parse a numeric text field; an empty value counts as absent.
async fn field_number(field: Field<'_>, name: &str) -> Result<Option<u32>, ApiError> {
    let text = field_text(field).await?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<u32>().map(Some).map_err(|_| {
        UploadError::InvalidChunk(format!("{name} must be a non-negative integer, got {text:?}"))
            .into()
    })
}
