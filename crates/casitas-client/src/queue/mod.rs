//! Durable offline upload queue.
//!
//! The queue state is owned by a background worker task. Callers talk to
//! it through [`OfflineUploadQueue`], which sends typed [`QueueCommand`]s
//! over a channel and awaits the replies.

pub mod store;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use casitas_core::config::ClientConfig;
use casitas_core::error::AppError;
use casitas_core::result::AppResult;
use casitas_core::traits::Clock;
use casitas_entity::QueuedUploadItem;

use crate::progress::UploadProgressTracker;
use crate::transfer::Uploader;

pub use store::QueueStore;

const COMMAND_BUFFER: usize = 64;

/// Outcome of one processing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    /// Items picked up during the pass.
    pub attempted: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Messages accepted by the queue worker.
#[derive(Debug)]
pub enum QueueCommand {
    /// Add a file as a `pending` item.
    Enqueue {
        file_name: String,
        data: Bytes,
        record_id: String,
        target_field: Option<String>,
        reply: oneshot::Sender<AppResult<QueuedUploadItem>>,
    },
    /// Return every item in insertion order.
    GetSnapshot {
        reply: oneshot::Sender<Vec<QueuedUploadItem>>,
    },
    /// The network came back or went away.
    ConnectivityChanged { online: bool },
    /// Process pending items now; replies when the pass is over.
    Process {
        reply: oneshot::Sender<ProcessReport>,
    },
    /// Move a failed item back to `pending`.
    Retry {
        id: String,
        reply: oneshot::Sender<AppResult<QueuedUploadItem>>,
    },
    /// Drop completed items.
    ClearCompleted { reply: oneshot::Sender<AppResult<usize>> },
    /// Drop every item.
    Clear { reply: oneshot::Sender<AppResult<usize>> },
    /// Stop the worker.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Queue settings.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Directory holding the queue document and payloads.
    pub dir: PathBuf,
    /// Health probe interval; `None` disables polling.
    pub poll_interval: Option<Duration>,
    /// Whether the network is assumed reachable at startup.
    pub start_online: bool,
}

impl QueueOptions {
    /// Options for `dir` with polling disabled, starting offline.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            poll_interval: None,
            start_online: false,
        }
    }

    /// Options from the `[client]` settings.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            dir: PathBuf::from(&config.queue_dir),
            poll_interval: (config.poll_interval_seconds > 0)
                .then(|| Duration::from_secs(config.poll_interval_seconds)),
            start_online: false,
        }
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Set the initial connectivity.
    pub fn online(mut self, online: bool) -> Self {
        self.start_online = online;
        self
    }
}

/// Handle to the offline queue worker. Cheap to clone.
#[derive(Debug, Clone)]
pub struct OfflineUploadQueue {
    tx: mpsc::Sender<QueueCommand>,
}

fn worker_stopped() -> AppError {
    AppError::service_unavailable("Upload queue worker is not running")
}

impl OfflineUploadQueue {
    /// Load the queue from disk and start its worker.
    ///
    /// Items interrupted mid-upload by a previous run are reset to
    /// `pending`; if the queue starts online they are processed right away.
    pub async fn open(
        options: QueueOptions,
        uploader: Arc<dyn Uploader>,
        tracker: Option<UploadProgressTracker>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<(Self, JoinHandle<()>)> {
        let store = QueueStore::open(&options.dir).await?;
        let (items, recovered) = store.load(clock.now()).await?;
        if recovered {
            store.save(&items).await?;
        }
        tracing::info!(
            dir = %options.dir.display(),
            items = items.len(),
            online = options.start_online,
            "Offline upload queue opened"
        );

        let worker = worker::QueueWorker::new(items, store, uploader, tracker, clock, options.start_online);
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let handle = tokio::spawn(worker.run(rx, options.poll_interval));
        Ok((Self { tx }, handle))
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> QueueCommand) -> AppResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).await.map_err(|_| worker_stopped())?;
        rx.await.map_err(|_| worker_stopped())
    }

    /// Queue a file. Needs no network; fails only if the payload cannot be
    /// written to disk.
    pub async fn enqueue(
        &self,
        file_name: impl Into<String>,
        data: Bytes,
        record_id: impl Into<String>,
        target_field: Option<String>,
    ) -> AppResult<QueuedUploadItem> {
        let file_name = file_name.into();
        let record_id = record_id.into();
        if data.is_empty() {
            return Err(AppError::validation("Cannot queue an empty file"));
        }
        if record_id.trim().is_empty() {
            return Err(AppError::validation("recordId is required"));
        }
        self.request(|reply| QueueCommand::Enqueue {
            file_name,
            data,
            record_id,
            target_field,
            reply,
        })
        .await?
    }

    /// Every item in insertion order.
    pub async fn snapshot(&self) -> AppResult<Vec<QueuedUploadItem>> {
        self.request(|reply| QueueCommand::GetSnapshot { reply }).await
    }

    /// Report a connectivity change; coming online starts a pass.
    pub async fn connectivity_changed(&self, online: bool) -> AppResult<()> {
        self.tx
            .send(QueueCommand::ConnectivityChanged { online })
            .await
            .map_err(|_| worker_stopped())
    }

    /// Process every pending item and wait for the pass to finish.
    ///
    /// Joins a pass that is already running; items that pass finished before
    /// this call reached the worker are not counted in the report.
    pub async fn process(&self) -> AppResult<ProcessReport> {
        self.request(|reply| QueueCommand::Process { reply }).await
    }

    /// Put a failed item back in line.
    pub async fn retry(&self, id: &str) -> AppResult<QueuedUploadItem> {
        let id = id.to_string();
        self.request(|reply| QueueCommand::Retry { id, reply }).await?
    }

    /// Drop completed items, returning how many were removed.
    pub async fn clear_completed(&self) -> AppResult<usize> {
        self.request(|reply| QueueCommand::ClearCompleted { reply }).await?
    }

    /// Drop every item, returning how many were removed.
    pub async fn clear(&self) -> AppResult<usize> {
        self.request(|reply| QueueCommand::Clear { reply }).await?
    }

    /// Stop the worker. An upload in flight is abandoned and resumes from
    /// `pending` on the next open.
    pub async fn shutdown(&self) -> AppResult<()> {
        self.request(|reply| QueueCommand::Shutdown { reply }).await
    }
}
