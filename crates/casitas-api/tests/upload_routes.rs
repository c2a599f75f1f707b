//! Route-level tests driving the router with `oneshot`.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use bytes::Bytes;
use serde_json::{Value, json};
use tower::ServiceExt;

use casitas_api::{AppState, build_router};
use casitas_cache::MemorySessionStore;
use casitas_core::config::{AppConfig, UploadConfig};
use casitas_core::traits::{RecordStore, SystemClock};
use casitas_database::MemoryRecordStore;
use casitas_entity::UploadSession;
use casitas_service::AssemblyService;
use casitas_storage::{LocalStorageProvider, MemoryMediaStore};

const BOUNDARY: &str = "casitas-test-boundary";

struct TestApp {
    router: Router,
    media: MemoryMediaStore,
    records: MemoryRecordStore,
    _dir: tempfile::TempDir,
}

async fn app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let scratch = Arc::new(LocalStorageProvider::new(dir.path()).await.unwrap());
    let media = MemoryMediaStore::new("https://media.test");
    let records = MemoryRecordStore::new();
    records.insert_record("r1").await;

    let config = AppConfig {
        upload: UploadConfig {
            chunk_size_bytes: 4,
            ..UploadConfig::default()
        },
        ..AppConfig::default()
    };
    let service = AssemblyService::new(
        config.upload.clone(),
        scratch,
        Arc::new(MemorySessionStore::<UploadSession>::new()),
        Arc::new(media.clone()),
        Arc::new(records.clone()),
        Arc::new(SystemClock),
    );
    TestApp {
        router: build_router(AppState::new(Arc::new(config), service)),
        media,
        records,
        _dir: dir,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::String(String::from_utf8_lossy(&body).into()))
    };
    (status, value)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn chunk_request(upload_id: &str, index: u32, total: u32, data: Option<&[u8]>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in [
        ("uploadId", upload_id.to_string()),
        ("chunkIndex", index.to_string()),
        ("totalChunks", total.to_string()),
    ] {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    if let Some(data) = data {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"chunk\"; filename=\"blob\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/upload/chunk")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn init_body(upload_id: &str, size: u64) -> Value {
    json!({ "uploadId": upload_id, "fileName": "foto.jpg", "fileSize": size, "recordId": "r1" })
}

fn finalize_body(upload_id: &str) -> Value {
    json!({ "uploadId": upload_id, "fileName": "foto.jpg", "recordId": "r1" })
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, body) = send(&app.router, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_full_upload_over_http() {
    let app = app().await;

    let (status, body) = send(&app.router, post_json("/upload/init", init_body("u1", 10))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Upload initialized");
    assert_eq!(body["totalChunks"], 3);

    for (i, part) in [&b"abcd"[..], b"efgh", b"ij"].into_iter().enumerate() {
        let (status, body) = send(&app.router, chunk_request("u1", i as u32, 3, Some(part))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["message"], format!("Chunk {i} received"));
    }

    let (status, body) = send(&app.router, post_json("/upload/finalize", finalize_body("u1"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let url = body["url"].as_str().unwrap().to_string();
    assert_eq!(app.media.get(&url).await, Some(Bytes::from_static(b"abcdefghij")));
    assert_eq!(app.records.get_evidence_list("r1").await.unwrap(), vec![url]);
}

#[tokio::test]
async fn test_init_missing_fields_is_400() {
    let app = app().await;
    let (status, body) = send(
        &app.router,
        post_json("/upload/init", json!({ "uploadId": "u1", "fileName": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELDS");
    assert_eq!(body["error"], "Missing required fields: fileName, fileSize, recordId");
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let app = app().await;
    let request = Request::post("/upload/init")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_chunk_for_unknown_session_is_404() {
    let app = app().await;
    let (status, body) = send(&app.router, chunk_request("ghost", 0, 1, Some(b"abcd"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn test_chunk_without_data_is_400() {
    let app = app().await;
    send(&app.router, post_json("/upload/init", init_body("u1", 4))).await;
    let (status, body) = send(&app.router, chunk_request("u1", 0, 1, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "NO_CHUNK_DATA");
}

#[tokio::test]
async fn test_finalize_with_gap_names_missing_index() {
    let app = app().await;
    send(&app.router, post_json("/upload/init", init_body("u1", 8))).await;
    send(&app.router, chunk_request("u1", 0, 2, Some(b"abcd"))).await;

    let (status, body) = send(&app.router, post_json("/upload/finalize", finalize_body("u1"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().ends_with("chunk 1"), "{body}");
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_finalize_unknown_session_or_record_is_404() {
    let app = app().await;
    let (status, _) = send(&app.router, post_json("/upload/finalize", finalize_body("ghost"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app.router, post_json("/upload/init", init_body("u1", 4))).await;
    send(&app.router, chunk_request("u1", 0, 1, Some(b"abcd"))).await;
    let (status, body) = send(
        &app.router,
        post_json(
            "/upload/finalize",
            json!({ "uploadId": "u1", "fileName": "foto.jpg", "recordId": "nope" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "RECORD_NOT_FOUND");
}

#[tokio::test]
async fn test_media_failure_is_500_with_diagnostics() {
    let app = app().await;
    send(&app.router, post_json("/upload/init", init_body("u1", 4))).await;
    send(&app.router, chunk_request("u1", 0, 1, Some(b"abcd"))).await;

    app.media.set_unavailable(true);
    let (status, body) = send(&app.router, post_json("/upload/finalize", finalize_body("u1"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "MEDIA_STORE_ERROR");
    assert_eq!(body["details"]["mediaStore"]["provider"], "memory");
    assert_eq!(body["details"]["mediaStore"]["apiSecretConfigured"], true);
}

#[tokio::test]
async fn test_status_reports_received_chunks() {
    let app = app().await;
    send(&app.router, post_json("/upload/init", init_body("u1", 12))).await;
    send(&app.router, chunk_request("u1", 2, 3, Some(b"ijkl"))).await;

    let (status, body) = send(&app.router, Request::get("/upload/u1").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["receivedChunks"], json!([2]));
    assert_eq!(body["totalChunks"], 3);
    assert_eq!(body["state"], "receiving");
}

#[tokio::test]
async fn test_oversized_chunk_count_is_400() {
    let app = app().await;
    send(&app.router, post_json("/upload/init", init_body("u1", 8))).await;

    let (status, body) = send(&app.router, chunk_request("u1", 4_999_999, 5_000_000, Some(b"x"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_CHUNK");

    let (status, body) = send(&app.router, Request::get("/upload/u1").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["receivedChunks"], json!([]));
    assert_eq!(body["totalChunks"], 2);
}
