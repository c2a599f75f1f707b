//! Shared test helpers for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tower::ServiceExt;

use casitas_api::{AppState, build_router};
use casitas_cache::MemorySessionStore;
use casitas_client::ChunkTransferClient;
use casitas_core::config::{AppConfig, UploadConfig};
use casitas_core::traits::ManualClock;
use casitas_database::MemoryRecordStore;
use casitas_entity::UploadSession;
use casitas_service::AssemblyService;
use casitas_storage::{LocalStorageProvider, MemoryMediaStore};

pub const MEDIA_HOST: &str = "https://media.casitas.test";
pub const MB: u64 = 1024 * 1024;
const BOUNDARY: &str = "casitas-integration-boundary";

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    pub service: AssemblyService,
    pub media: MemoryMediaStore,
    pub records: MemoryRecordStore,
    pub clock: Arc<ManualClock>,
    pub config: AppConfig,
    _scratch: tempfile::TempDir,
}

pub fn start_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-03-12T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

impl TestApp {
    /// Create a new test application with records `r1` and `r2`.
    pub async fn new(chunk_size: u64) -> Self {
        let scratch = tempfile::tempdir().unwrap();
        let provider = Arc::new(LocalStorageProvider::new(scratch.path()).await.unwrap());
        let media = MemoryMediaStore::new(MEDIA_HOST);
        let records = MemoryRecordStore::new();
        records.insert_record("r1").await;
        records.insert_record("r2").await;
        let clock = Arc::new(ManualClock::new(start_time()));

        let config = AppConfig {
            upload: UploadConfig {
                chunk_size_bytes: chunk_size,
                ..UploadConfig::default()
            },
            ..AppConfig::default()
        };
        let service = AssemblyService::new(
            config.upload.clone(),
            provider,
            Arc::new(MemorySessionStore::<UploadSession>::new()),
            Arc::new(media.clone()),
            Arc::new(records.clone()),
            clock.clone(),
        );
        let router = build_router(AppState::new(Arc::new(config.clone()), service.clone()));

        Self {
            router,
            service,
            media,
            records,
            clock,
            config,
            _scratch: scratch,
        }
    }

    /// Serve the router on an ephemeral local port.
    pub async fn serve(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    /// A transfer client pointed at `addr`, using the server's chunk size.
    pub fn client(&self, addr: SocketAddr) -> ChunkTransferClient {
        ChunkTransferClient::new(
            &format!("http://{addr}"),
            self.config.upload.chunk_size_bytes,
            Duration::from_secs(10),
        )
        .unwrap()
    }

    /// Evidence URLs currently stored on a record.
    pub async fn evidence(&self, record_id: &str) -> Vec<String> {
        self.records
            .record(record_id)
            .await
            .map(|r| r.evidence_urls)
            .unwrap_or_default()
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn chunk_request(upload_id: &str, index: u32, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in [("uploadId", upload_id.to_string()), ("chunkIndex", index.to_string())] {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"chunk\"; filename=\"blob\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/upload/chunk")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

/// Deterministic file contents of `len` bytes.
pub fn file_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}
