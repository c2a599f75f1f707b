//! Remote media store contract.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// Result of a successful media upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMedia {
    /// Permanent, fetchable URL of the stored object.
    pub secure_url: String,
    /// Provider-side identifier, when the provider issues one.
    pub public_id: Option<String>,
    /// Number of bytes stored.
    pub bytes: u64,
}

/// Credential state echoed in finalize error bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStoreDiagnostics {
    /// Provider type name.
    pub provider: String,
    pub cloud_name_configured: bool,
    pub api_key_configured: bool,
    pub api_secret_configured: bool,
}

/// External object storage for finalized uploads.
///
/// Accepts arbitrary binary content under a folder path and returns a
/// permanent URL. Implementations live in `casitas-storage`.
#[async_trait]
pub trait MediaStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "cloudinary", "memory").
    fn provider_type(&self) -> &str;

    /// Report which credentials are configured, without revealing them.
    fn diagnostics(&self) -> MediaStoreDiagnostics;

    /// Upload `data` into `folder` and return the stored object's URL.
    async fn upload(&self, data: Bytes, folder: &str, file_name: &str) -> AppResult<StoredMedia>;
}
