//! Upload protocol tests: client to server to media and record stores.

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use chrono::Duration as ChronoDuration;
use serde_json::json;

use casitas_client::{ProgressUpdate, TransferError, UploadRequest, Uploader};
use casitas_core::types::UploadId;
use casitas_entity::ProgressStatus;
use casitas_worker::{PeriodicJob, SessionSweepJob};

use crate::helpers::{MB, MEDIA_HOST, TestApp, chunk_request, file_bytes, post_json};

fn request(id: &str, name: &str, data: Vec<u8>, record_id: &str) -> UploadRequest {
    UploadRequest {
        upload_id: Some(UploadId::parse(id).unwrap()),
        file_name: name.to_string(),
        data: Bytes::from(data),
        record_id: record_id.to_string(),
        field_name: None,
    }
}

#[tokio::test]
async fn test_two_chunk_upload_lands_on_record() {
    let app = TestApp::new(MB).await;
    let addr = app.serve().await;
    let client = app.client(addr);

    let data = file_bytes(2_000_000, 7);
    let updates = Arc::new(Mutex::new(Vec::<ProgressUpdate>::new()));
    let sink = updates.clone();
    let url = client
        .upload(
            request("u1", "a.jpg", data.clone(), "r1"),
            Arc::new(move |update| sink.lock().unwrap().push(update)),
        )
        .await
        .unwrap();

    assert!(url.starts_with(MEDIA_HOST), "unexpected url {url}");
    assert!(url.contains("casitas/3/semana_11/"));
    assert_eq!(app.evidence("r1").await, vec![url.clone()]);
    assert_eq!(app.media.get(&url).await.unwrap(), Bytes::from(data));

    let updates = updates.lock().unwrap();
    let last = updates.last().unwrap();
    assert_eq!(last.status, ProgressStatus::Completed);
    assert_eq!(last.progress, 100);
    assert_eq!(last.url.as_deref(), Some(url.as_str()));
    assert!(updates.windows(2).all(|w| w[0].progress <= w[1].progress));
    assert!(updates.iter().any(|u| u.status == ProgressStatus::Processing));

    // The session is gone once the URL is recorded.
    let (status, _) = app
        .send(Request::get("/upload/u1").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_finalize_with_missing_chunk_names_it() {
    let app = TestApp::new(MB).await;
    let init = json!({ "uploadId": "u1", "fileName": "a.jpg", "fileSize": 2_000_000, "recordId": "r1" });
    let (status, body) = app.send(post_json("/upload/init", init)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalChunks"], 2);

    let (status, _) = app
        .send(chunk_request("u1", 0, &file_bytes(MB as usize, 1)))
        .await;
    assert_eq!(status, StatusCode::OK);

    let finalize = json!({ "uploadId": "u1", "fileName": "a.jpg", "recordId": "r1" });
    let (status, body) = app.send(post_json("/upload/finalize", finalize)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().ends_with("chunk 1"), "{body}");
    assert!(body.get("url").is_none());
    assert!(app.media.is_empty().await);
    assert!(app.evidence("r1").await.is_empty());
}

#[tokio::test]
async fn test_finalize_unknown_session_is_not_found() {
    let app = TestApp::new(MB).await;
    let finalize = json!({ "uploadId": "ghost", "fileName": "a.jpg", "recordId": "r1" });
    let (status, body) = app.send(post_json("/upload/finalize", finalize)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("ghost"));
}

#[tokio::test]
async fn test_chunks_in_any_order_reassemble() {
    let app = TestApp::new(4).await;
    let data = b"casita-10b".to_vec();
    let init = json!({ "uploadId": "shuffled", "fileName": "b.jpg", "fileSize": data.len(), "recordId": "r1" });
    let (_, body) = app.send(post_json("/upload/init", init)).await;
    assert_eq!(body["totalChunks"], 3);

    for index in [2u32, 0, 1] {
        let start = index as usize * 4;
        let end = (start + 4).min(data.len());
        let (status, body) = app.send(chunk_request("shuffled", index, &data[start..end])).await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
    // Resending a chunk replaces it.
    app.send(chunk_request("shuffled", 0, b"XXXX")).await;
    app.send(chunk_request("shuffled", 0, &data[..4])).await;

    let finalize = json!({ "uploadId": "shuffled", "fileName": "b.jpg", "recordId": "r1" });
    let (status, body) = app.send(post_json("/upload/finalize", finalize)).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let url = body["url"].as_str().unwrap().to_string();
    assert_eq!(app.media.get(&url).await.unwrap(), Bytes::from(data));
    assert_eq!(app.evidence("r1").await.len(), 1);
}

#[tokio::test]
async fn test_concurrent_uploads_stay_isolated() {
    let app = TestApp::new(1024).await;
    let addr = app.serve().await;
    let client = app.client(addr);
    let noop: casitas_client::ProgressCallback = Arc::new(|_| {});

    let first = file_bytes(5_000, 1);
    let second = file_bytes(3_500, 2);
    let (a, b) = tokio::join!(
        client.upload(request("iso-a", "a.jpg", first.clone(), "r1"), noop.clone()),
        client.upload(request("iso-b", "b.jpg", second.clone(), "r2"), noop.clone()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(app.media.get(&a).await.unwrap(), Bytes::from(first));
    assert_eq!(app.media.get(&b).await.unwrap(), Bytes::from(second));
    assert_eq!(app.evidence("r1").await, vec![a]);
    assert_eq!(app.evidence("r2").await, vec![b]);
}

#[tokio::test]
async fn test_unknown_record_surfaces_as_finalize_error() {
    let app = TestApp::new(MB).await;
    let addr = app.serve().await;
    let client = app.client(addr);

    let err = client
        .upload(request("u9", "a.jpg", file_bytes(10, 3), "r9"), Arc::new(|_| {}))
        .await
        .unwrap_err();
    match err {
        TransferError::Finalize { status, message } => {
            assert_eq!(status, Some(404));
            assert!(message.contains("r9"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_sweep_discards_stale_incomplete_session() {
    let app = TestApp::new(4).await;
    let init = json!({ "uploadId": "stale", "fileName": "c.jpg", "fileSize": 8, "recordId": "r1" });
    app.send(post_json("/upload/init", init)).await;
    app.send(chunk_request("stale", 0, b"abcd")).await;

    app.clock
        .advance(ChronoDuration::hours(app.config.upload.session_retention_hours as i64 + 1));
    let summary = SessionSweepJob::new(app.service.clone()).run().await.unwrap();
    assert_eq!(summary["sessions_removed"], 1);

    let finalize = json!({ "uploadId": "stale", "fileName": "c.jpg", "recordId": "r1" });
    let (status, _) = app.send(post_json("/upload/finalize", finalize)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
