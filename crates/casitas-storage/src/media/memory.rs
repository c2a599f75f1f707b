//! In-process media store for tests and local development.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use casitas_core::error::AppError;
use casitas_core::result::AppResult;
use casitas_core::traits::media::{MediaStore, MediaStoreDiagnostics, StoredMedia};

/// Media store keeping uploaded objects in memory.
#[derive(Debug, Clone)]
pub struct MemoryMediaStore {
    base_url: String,
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
    counter: Arc<AtomicU64>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryMediaStore {
    /// Create a store issuing URLs under `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            objects: Arc::new(RwLock::new(HashMap::new())),
            counter: Arc::new(AtomicU64::new(0)),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Host prefix of every issued URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make subsequent uploads fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fetch a stored object by URL.
    pub async fn get(&self, url: &str) -> Option<Bytes> {
        self.objects.read().await.get(url).cloned()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    fn provider_type(&self) -> &str {
        "memory"
    }

    fn diagnostics(&self) -> MediaStoreDiagnostics {
        MediaStoreDiagnostics {
            provider: "memory".to_string(),
            cloud_name_configured: true,
            api_key_configured: true,
            api_secret_configured: true,
        }
    }

    async fn upload(&self, data: Bytes, folder: &str, file_name: &str) -> AppResult<StoredMedia> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::external("Media store is unavailable"));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let public_id = format!("{folder}/{n}-{file_name}");
        let secure_url = format!("{}/{public_id}", self.base_url);
        let bytes = data.len() as u64;
        self.objects.write().await.insert(secure_url.clone(), data);
        Ok(StoredMedia {
            secure_url,
            public_id: Some(public_id),
            bytes,
        })
    }
}
