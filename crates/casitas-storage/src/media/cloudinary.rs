//! Cloudinary upload API adapter.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use casitas_core::config::MediaConfig;
use casitas_core::error::{AppError, ErrorKind};
use casitas_core::result::AppResult;
use casitas_core::traits::media::{MediaStore, MediaStoreDiagnostics, StoredMedia};

/// Media store backed by Cloudinary's signed upload API.
#[derive(Debug, Clone)]
pub struct CloudinaryMediaStore {
    http: reqwest::Client,
    api_base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: Option<String>,
    bytes: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

impl CloudinaryMediaStore {
    /// Create an adapter from configuration.
    ///
    /// Missing credentials are not rejected here; uploads fail instead, and
    /// [`MediaStore::diagnostics`] reports which ones are absent.
    pub fn new(config: &MediaConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;
        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    fn upload_url(&self) -> String {
        format!("{}/{}/auto/upload", self.api_base_url, self.cloud_name)
    }

    /// Sign the upload parameters: sorted `key=value` pairs joined by `&`,
    /// followed by the API secret, hashed with SHA-256.
    fn sign(params: &[(&str, &str)], secret: &str) -> String {
        let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let digest = Sha256::digest(format!("{to_sign}{secret}").as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[async_trait]
impl MediaStore for CloudinaryMediaStore {
    fn provider_type(&self) -> &str {
        "cloudinary"
    }

    fn diagnostics(&self) -> MediaStoreDiagnostics {
        MediaStoreDiagnostics {
            provider: "cloudinary".to_string(),
            cloud_name_configured: !self.cloud_name.is_empty(),
            api_key_configured: !self.api_key.is_empty(),
            api_secret_configured: !self.api_secret.is_empty(),
        }
    }

    async fn upload(&self, data: Bytes, folder: &str, file_name: &str) -> AppResult<StoredMedia> {
        if self.cloud_name.is_empty() || self.api_key.is_empty() || self.api_secret.is_empty() {
            return Err(AppError::configuration(
                "Cloudinary credentials are not configured",
            ));
        }

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = Self::sign(
            &[("folder", folder), ("timestamp", &timestamp)],
            &self.api_secret,
        );
        let size = data.len() as u64;

        let part = reqwest::multipart::Part::stream(data).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("folder", folder.to_string())
            .text("timestamp", timestamp)
            .text("api_key", self.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .http
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    ErrorKind::Timeout
                } else {
                    ErrorKind::ExternalService
                };
                AppError::with_source(kind, "Cloudinary upload request failed", e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ExternalService,
                format!("Failed to read Cloudinary response body ({status})"),
                e,
            )
        })?;
        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(AppError::external(format!(
                "Cloudinary rejected upload ({status}): {detail}"
            )));
        }

        let parsed: UploadResponse = serde_json::from_str(&body)?;
        tracing::debug!(url = %parsed.secure_url, folder, "Stored media in Cloudinary");
        Ok(StoredMedia {
            secure_url: parsed.secure_url,
            public_id: parsed.public_id,
            bytes: parsed.bytes.unwrap_or(size),
        })
    }
}
