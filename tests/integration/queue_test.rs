//! Offline queue tests against a live upload server.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use casitas_client::{OfflineUploadQueue, QueueOptions, UploadProgressTracker};
use casitas_core::traits::SystemClock;
use casitas_entity::{ProgressStatus, QueueStatus, QueuedUploadItem};

use crate::helpers::{TestApp, file_bytes};

async fn open_queue(
    app: &TestApp,
    addr: std::net::SocketAddr,
    dir: &Path,
    tracker: Option<UploadProgressTracker>,
) -> (OfflineUploadQueue, tokio::task::JoinHandle<()>) {
    OfflineUploadQueue::open(
        QueueOptions::new(dir),
        Arc::new(app.client(addr)),
        tracker,
        Arc::new(SystemClock),
    )
    .await
    .unwrap()
}

async fn wait_until_settled(queue: &OfflineUploadQueue) -> Vec<QueuedUploadItem> {
    for _ in 0..500 {
        let items = queue.snapshot().await.unwrap();
        if items
            .iter()
            .all(|i| !matches!(i.status, QueueStatus::Pending | QueueStatus::Uploading))
        {
            return items;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("queue did not settle");
}

#[tokio::test]
async fn test_offline_items_upload_in_order_when_connectivity_returns() {
    let app = TestApp::new(512).await;
    let addr = app.serve().await;
    let dir = tempfile::tempdir().unwrap();
    let tracker = UploadProgressTracker::in_memory();
    let (queue, _worker) = open_queue(&app, addr, dir.path(), Some(tracker.clone())).await;

    let first = Bytes::from(file_bytes(1_500, 1));
    let second = Bytes::from(file_bytes(700, 2));
    queue.enqueue("sala.jpg", first.clone(), "r1", None).await.unwrap();
    queue.enqueue("cocina.jpg", second.clone(), "r1", None).await.unwrap();
    assert!(app.media.is_empty().await);

    queue.connectivity_changed(true).await.unwrap();
    let items = wait_until_settled(&queue).await;
    assert_eq!(items[0].file_name, "sala.jpg");
    assert!(items.iter().all(|i| i.status == QueueStatus::Completed));
    let urls: Vec<String> = items.iter().map(|i| i.result_url.clone().unwrap()).collect();

    // Evidence order on the record follows queue order.
    assert_eq!(app.evidence("r1").await, urls);
    assert_eq!(app.media.get(&urls[0]).await.unwrap(), first);
    assert_eq!(app.media.get(&urls[1]).await.unwrap(), second);

    let progress = tracker.get_by_record("r1");
    assert_eq!(progress.len(), 2);
    assert!(progress.iter().all(|p| p.status == ProgressStatus::Completed && p.progress == 100));
}

#[tokio::test]
async fn test_one_failing_item_does_not_block_the_rest() {
    let app = TestApp::new(512).await;
    let addr = app.serve().await;
    let dir = tempfile::tempdir().unwrap();
    let (queue, _worker) = open_queue(&app, addr, dir.path(), None).await;

    queue.enqueue("1.jpg", Bytes::from(file_bytes(600, 1)), "r1", None).await.unwrap();
    queue.enqueue("2.jpg", Bytes::from(file_bytes(600, 2)), "no-such-record", None).await.unwrap();
    queue.enqueue("3.jpg", Bytes::from(file_bytes(600, 3)), "r1", None).await.unwrap();

    let report = queue.process().await.unwrap();
    assert_eq!((report.attempted, report.completed, report.failed), (3, 2, 1));

    let items = queue.snapshot().await.unwrap();
    assert_eq!(items[0].status, QueueStatus::Completed);
    assert_eq!(items[1].status, QueueStatus::Error);
    assert!(items[1].error_message.as_deref().unwrap().contains("not found"));
    assert_eq!(items[2].status, QueueStatus::Completed);
    assert_eq!(app.evidence("r1").await.len(), 2);
}

#[tokio::test]
async fn test_restart_reaches_same_outcome_as_uninterrupted_run() {
    let app = TestApp::new(512).await;
    let addr = app.serve().await;
    let data = Bytes::from(file_bytes(1_200, 9));

    let steady = tempfile::tempdir().unwrap();
    let (queue, _worker) = open_queue(&app, addr, steady.path(), None).await;
    queue.enqueue("a.jpg", data.clone(), "r1", None).await.unwrap();
    queue.process().await.unwrap();
    let uninterrupted = queue.snapshot().await.unwrap();

    let restarted = tempfile::tempdir().unwrap();
    let (queue, worker) = open_queue(&app, addr, restarted.path(), None).await;
    queue.enqueue("a.jpg", data.clone(), "r2", None).await.unwrap();
    queue.shutdown().await.unwrap();
    worker.await.unwrap();

    let (queue, _worker) = open_queue(&app, addr, restarted.path(), None).await;
    assert_eq!(queue.snapshot().await.unwrap()[0].status, QueueStatus::Pending);
    queue.process().await.unwrap();
    let resumed = queue.snapshot().await.unwrap();

    assert_eq!(resumed.len(), uninterrupted.len());
    assert_eq!(resumed[0].status, uninterrupted[0].status);
    assert_eq!(resumed[0].status, QueueStatus::Completed);
    let url = resumed[0].result_url.clone().unwrap();
    assert_eq!(app.media.get(&url).await.unwrap(), data);
    assert_eq!(app.evidence("r2").await, vec![url]);
}
