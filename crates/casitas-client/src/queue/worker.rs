//! Background worker that owns the queue state.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};

use casitas_core::error::AppError;
use casitas_core::result::AppResult;
use casitas_core::traits::Clock;
use casitas_core::types::UploadId;
use casitas_entity::{ProgressStatus, QueueStatus, QueuedUploadItem, UploadProgressRecord};

use super::store::QueueStore;
use super::{ProcessReport, QueueCommand};
use crate::error::TransferError;
use crate::progress::UploadProgressTracker;
use crate::transfer::{ProgressCallback, ProgressUpdate, UploadRequest, Uploader};

type InFlight = BoxFuture<'static, (UploadId, Result<String, TransferError>)>;

#[derive(Debug, Default)]
struct Pass {
    report: ProcessReport,
    waiters: Vec<oneshot::Sender<ProcessReport>>,
}

pub(super) struct QueueWorker {
    items: Vec<QueuedUploadItem>,
    store: QueueStore,
    uploader: Arc<dyn Uploader>,
    tracker: Option<UploadProgressTracker>,
    clock: Arc<dyn Clock>,
    online: bool,
    pass: Option<Pass>,
}

impl QueueWorker {
    pub(super) fn new(
        items: Vec<QueuedUploadItem>,
        store: QueueStore,
        uploader: Arc<dyn Uploader>,
        tracker: Option<UploadProgressTracker>,
        clock: Arc<dyn Clock>,
        online: bool,
    ) -> Self {
        let mut worker = Self {
            items,
            store,
            uploader,
            tracker,
            clock,
            online,
            pass: None,
        };
        if worker.online {
            worker.begin_pass(None);
        }
        worker
    }

    /// Runs until shutdown or until every handle is dropped.
    ///
    /// Items are uploaded one at a time; commands keep being served while
    /// an upload is in flight.
    pub(super) async fn run(mut self, mut commands: mpsc::Receiver<QueueCommand>, poll_interval: Option<Duration>) {
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<(UploadId, u8)>();
        let mut in_flight: Option<InFlight> = None;
        let mut ticker = poll_interval.map(|period| {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            if in_flight.is_none() {
                in_flight = self.start_next(&progress_tx).await;
                if in_flight.is_none() {
                    self.finish_pass();
                }
            }

            tokio::select! {
                command = commands.recv() => match command {
                    Some(QueueCommand::Shutdown { reply }) => {
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                Some((id, progress)) = progress_rx.recv() => {
                    self.record_progress(&id, progress);
                }
                (id, result) = async {
                    match in_flight.as_mut() {
                        Some(upload) => upload.await,
                        None => std::future::pending().await,
                    }
                }, if in_flight.is_some() => {
                    in_flight = None;
                    self.complete(id, result).await;
                }
                _ = async {
                    match ticker.as_mut() {
                        Some(ticker) => {
                            ticker.tick().await;
                        }
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    self.poll(in_flight.is_some()).await;
                }
            }
        }

        tracing::info!(items = self.items.len(), "Offline upload queue worker stopped");
    }

    fn begin_pass(&mut self, waiter: Option<oneshot::Sender<ProcessReport>>) {
        let pass = self.pass.get_or_insert_with(Pass::default);
        pass.waiters.extend(waiter);
    }

    fn finish_pass(&mut self) {
        let Some(pass) = self.pass.take() else {
            return;
        };
        if pass.report.attempted > 0 {
            tracing::info!(
                attempted = pass.report.attempted,
                completed = pass.report.completed,
                failed = pass.report.failed,
                "Queue pass finished"
            );
        }
        for waiter in pass.waiters {
            let _ = waiter.send(pass.report.clone());
        }
    }

    fn has_pending(&self) -> bool {
        self.items.iter().any(|i| i.status == QueueStatus::Pending)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.id.as_str() == id)
    }

    async fn persist(&self) {
        if let Err(e) = self.store.save(&self.items).await {
            tracing::warn!(error = %e, "Failed to persist offline queue");
        }
    }

    fn track(&self, item: &QueuedUploadItem, status: ProgressStatus, message: Option<String>) {
        if let Some(tracker) = &self.tracker {
            let key = UploadProgressRecord::key_for(&item.record_id, &item.file_name);
            tracker.update(&key, item.progress, status, message);
        }
    }

    /// Pick the oldest pending item and start uploading it.
    async fn start_next(&mut self, progress_tx: &mpsc::UnboundedSender<(UploadId, u8)>) -> Option<InFlight> {
        if self.pass.is_none() {
            return None;
        }

        loop {
            let idx = self
                .items
                .iter()
                .position(|i| i.status == QueueStatus::Pending)?;
            let now = self.clock.now();
            if let Err(e) = self.items[idx].mark_uploading(now) {
                tracing::error!(error = %e, "Queue item could not be started");
                return None;
            }
            if let Some(pass) = self.pass.as_mut() {
                pass.report.attempted += 1;
            }
            self.persist().await;

            let item = self.items[idx].clone();
            let data = match self.store.read_blob(&item.id).await {
                Ok(data) => data,
                Err(e) => {
                    let message = format!("Queued file could not be read: {e}");
                    self.fail(idx, message).await;
                    continue;
                }
            };

            tracing::info!(
                id = %item.id,
                file_name = %item.file_name,
                record_id = %item.record_id,
                attempt = item.attempts,
                "Uploading queued item"
            );

            let tracker_callback = self.tracker.as_ref().map(|t| {
                t.callback(
                    &UploadProgressRecord::key_for(&item.record_id, &item.file_name),
                    &item.file_name,
                )
            });
            let tx = progress_tx.clone();
            let progress_id = item.id.clone();
            let on_progress: ProgressCallback = Arc::new(move |update: ProgressUpdate| {
                let _ = tx.send((progress_id.clone(), update.progress));
                if let Some(callback) = &tracker_callback {
                    callback(update);
                }
            });

            let request = UploadRequest {
                upload_id: Some(item.id.clone()),
                file_name: item.file_name,
                data,
                record_id: item.record_id,
                field_name: item.target_field,
            };
            let uploader = self.uploader.clone();
            let id = item.id;
            return Some(Box::pin(async move {
                let result = uploader.upload(request, on_progress).await;
                (id, result)
            }));
        }
    }

    fn record_progress(&mut self, id: &UploadId, progress: u8) {
        let now = self.clock.now();
        if let Some(idx) = self.position(id.as_str()) {
            self.items[idx].set_progress(progress, now);
        }
    }

    async fn fail(&mut self, idx: usize, message: String) {
        let now = self.clock.now();
        let item = &mut self.items[idx];
        if let Err(e) = item.mark_failed(message.clone(), now) {
            tracing::error!(id = %item.id, error = %e, "Queue item could not be marked failed");
        }
        if let Some(pass) = self.pass.as_mut() {
            pass.report.failed += 1;
        }
        let item = self.items[idx].clone();
        tracing::warn!(id = %item.id, file_name = %item.file_name, error = %message, "Queued upload failed");
        self.track(&item, ProgressStatus::Error, Some(message));
        self.persist().await;
    }

    async fn complete(&mut self, id: UploadId, result: Result<String, TransferError>) {
        let Some(idx) = self.position(id.as_str()) else {
            tracing::warn!(id = %id, "Finished upload is no longer queued");
            return;
        };

        match result {
            Ok(url) => {
                let now = self.clock.now();
                if let Err(e) = self.items[idx].mark_completed(url.clone(), now) {
                    tracing::error!(id = %id, error = %e, "Queue item could not be marked completed");
                }
                if let Some(pass) = self.pass.as_mut() {
                    pass.report.completed += 1;
                }
                if let Err(e) = self.store.delete_blob(&id).await {
                    tracing::warn!(id = %id, error = %e, "Failed to delete uploaded payload");
                }
                tracing::info!(id = %id, url = %url, "Queued upload completed");
                self.persist().await;
            }
            Err(e) => self.fail(idx, e.to_string()).await,
        }
    }

    async fn poll(&mut self, busy: bool) {
        if busy || !self.has_pending() {
            return;
        }
        let reachable = self.uploader.health().await.is_ok();
        if reachable != self.online {
            tracing::info!(online = reachable, "Upload service connectivity changed");
        }
        self.online = reachable;
        if reachable {
            self.begin_pass(None);
        }
    }

    async fn handle(&mut self, command: QueueCommand) {
        match command {
            QueueCommand::Enqueue {
                file_name,
                data,
                record_id,
                target_field,
                reply,
            } => {
                let result = self.enqueue(file_name, data, record_id, target_field).await;
                let _ = reply.send(result);
                if self.online {
                    self.begin_pass(None);
                }
            }
            QueueCommand::GetSnapshot { reply } => {
                let _ = reply.send(self.items.clone());
            }
            QueueCommand::ConnectivityChanged { online } => {
                tracing::info!(online, "Connectivity changed");
                self.online = online;
                if online {
                    self.begin_pass(None);
                }
            }
            QueueCommand::Process { reply } => self.begin_pass(Some(reply)),
            QueueCommand::Retry { id, reply } => {
                let result = self.retry(&id).await;
                let _ = reply.send(result);
                if self.online {
                    self.begin_pass(None);
                }
            }
            QueueCommand::ClearCompleted { reply } => {
                let result = self.remove_where(|i| i.status == QueueStatus::Completed).await;
                let _ = reply.send(result);
            }
            QueueCommand::Clear { reply } => {
                let result = self.remove_where(|_| true).await;
                let _ = reply.send(result);
            }
            QueueCommand::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    async fn enqueue(
        &mut self,
        file_name: String,
        data: bytes::Bytes,
        record_id: String,
        target_field: Option<String>,
    ) -> AppResult<QueuedUploadItem> {
        let now = self.clock.now();
        let mut id = QueuedUploadItem::generate_id(now);
        while self.position(id.as_str()).is_some() {
            id = QueuedUploadItem::generate_id(now);
        }
        let item = QueuedUploadItem::new(id, file_name, data.len() as u64, record_id, target_field, now);

        self.store.write_blob(&item.id, &data).await?;
        self.items.push(item.clone());
        if let Err(e) = self.store.save(&self.items).await {
            self.items.pop();
            let _ = self.store.delete_blob(&item.id).await;
            return Err(e);
        }

        tracing::info!(id = %item.id, file_name = %item.file_name, bytes = item.file_size, "Upload queued");
        self.track(&item, ProgressStatus::Pending, None);
        Ok(item)
    }

    async fn retry(&mut self, id: &str) -> AppResult<QueuedUploadItem> {
        let idx = self
            .position(id)
            .ok_or_else(|| AppError::not_found(format!("Queue item {id} not found")))?;
        let now = self.clock.now();
        self.items[idx].retry(now)?;
        let item = self.items[idx].clone();
        self.track(&item, ProgressStatus::Pending, None);
        self.persist().await;
        Ok(item)
    }

    async fn remove_where(&mut self, remove: impl Fn(&QueuedUploadItem) -> bool) -> AppResult<usize> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|i| remove(i));
        self.items = kept;
        for item in &removed {
            if let Err(e) = self.store.delete_blob(&item.id).await {
                tracing::warn!(id = %item.id, error = %e, "Failed to delete queued payload");
            }
        }
        self.store.save(&self.items).await?;
        Ok(removed.len())
    }
}
