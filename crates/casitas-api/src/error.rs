//! Maps upload and application errors to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use casitas_core::error::{AppError, ErrorKind};
use casitas_core::traits::MediaStoreDiagnostics;
use casitas_service::UploadError;

/// Standard API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Optional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// An error ready to be rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ApiErrorResponse,
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    /// A 400 with the given message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ApiErrorResponse {
                error: message.into(),
                code: "BAD_REQUEST".to_string(),
                details: None,
            },
        }
    }

    /// Attach media store credential flags, as finalize does for 500s.
    pub fn with_media_diagnostics(mut self, diagnostics: MediaStoreDiagnostics) -> Self {
        if self.status == StatusCode::INTERNAL_SERVER_ERROR {
            self.body.details = Some(serde_json::json!({ "mediaStore": diagnostics }));
        }
        self
    }

    /// HTTP status of the response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response body.
    pub fn body(&self) -> &ApiErrorResponse {
        &self.body
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        let status = status_for(err.kind());
        if status.is_server_error() {
            tracing::error!(code = err.code(), error = %err, "Upload request failed");
        }
        Self {
            status,
            body: ApiErrorResponse {
                error: err.to_string(),
                code: err.code().to_string(),
                details: None,
            },
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = status_for(err.kind);
        if status.is_server_error() {
            tracing::error!(error = %err.message, kind = %err.kind, "Internal server error");
        }
        Self {
            status,
            body: ApiErrorResponse {
                error: err.message,
                code: err.kind.to_string(),
                details: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
