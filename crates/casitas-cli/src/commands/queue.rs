//! Offline upload queue commands.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use casitas_client::{OfflineUploadQueue, QueueOptions, UploadProgressTracker};
use casitas_core::config::AppConfig;
use casitas_core::error::AppError;
use casitas_core::traits::SystemClock;
use casitas_entity::QueuedUploadItem;

/// Arguments for queue commands
#[derive(Debug, Args)]
pub struct QueueArgs {
    /// Queue subcommand
    #[command(subcommand)]
    pub command: QueueCommand,
}

/// Queue subcommands
#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// Store files for a later upload
    Enqueue {
        /// Files to queue
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Inspection record the files belong to
        #[arg(short, long)]
        record_id: String,
        /// Evidence slot to fill
        #[arg(long)]
        field: Option<String>,
    },
    /// List queued items
    List,
    /// Upload every pending item now
    Process,
    /// Keep running and upload whenever the service is reachable
    Watch,
    /// Put a failed item back in line
    Retry {
        /// Item ID
        id: String,
    },
    /// Remove items from the queue
    Clear {
        /// Only remove completed items
        #[arg(long)]
        completed: bool,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
}

/// Queue item display row
#[derive(Debug, Serialize, Tabled)]
struct QueueRow {
    /// Item ID
    id: String,
    /// File
    file: String,
    /// Record
    record: String,
    /// Status
    status: String,
    /// Progress
    progress: String,
    /// Attempts
    attempts: u32,
    /// Updated
    updated: String,
    /// URL or error
    detail: String,
}

impl From<&QueuedUploadItem> for QueueRow {
    fn from(item: &QueuedUploadItem) -> Self {
        Self {
            id: item.id.to_string(),
            file: item.file_name.clone(),
            record: item.record_id.clone(),
            status: item.status.to_string(),
            progress: format!("{}%", item.progress),
            attempts: item.attempts,
            updated: super::short_time(item.updated_at),
            detail: item
                .result_url
                .clone()
                .or_else(|| item.error_message.clone())
                .unwrap_or_default(),
        }
    }
}

async fn open_queue(
    config: &AppConfig,
    options: QueueOptions,
) -> Result<(OfflineUploadQueue, UploadProgressTracker), AppError> {
    let tracker = super::open_tracker(config).await?;
    let client = super::transfer_client(config)?;
    let (queue, _worker) =
        OfflineUploadQueue::open(options, client, Some(tracker.clone()), Arc::new(SystemClock)).await?;
    Ok((queue, tracker))
}

async fn close(queue: &OfflineUploadQueue, tracker: &UploadProgressTracker) -> Result<(), AppError> {
    queue.shutdown().await?;
    tracker.flush().await
}

fn print_items(items: &[QueuedUploadItem], format: OutputFormat) {
    let rows: Vec<QueueRow> = items.iter().map(QueueRow::from).collect();
    output::print_list(&rows, format);
}

/// Execute queue commands
pub async fn execute(args: &QueueArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let options = QueueOptions::new(&config.client.queue_dir);

    match &args.command {
        QueueCommand::Enqueue {
            files,
            record_id,
            field,
        } => {
            let (queue, tracker) = open_queue(config, options).await?;
            let mut queued = Vec::with_capacity(files.len());
            for path in files {
                let file = super::read_file(path).await?;
                queued.push(
                    queue
                        .enqueue(file.name, file.data, record_id.clone(), field.clone())
                        .await?,
                );
            }
            close(&queue, &tracker).await?;
            print_items(&queued, format);
            output::print_success(&format!("Queued {} file(s)", queued.len()));
        }
        QueueCommand::List => {
            let (queue, tracker) = open_queue(config, options).await?;
            let items = queue.snapshot().await?;
            close(&queue, &tracker).await?;
            print_items(&items, format);
        }
        QueueCommand::Process => {
            let (queue, tracker) = open_queue(config, options).await?;
            let report = queue.process().await?;
            let items = queue.snapshot().await?;
            close(&queue, &tracker).await?;

            print_items(&items, format);
            output::print_kv("Attempted", &report.attempted.to_string());
            output::print_kv("Completed", &report.completed.to_string());
            output::print_kv("Failed", &report.failed.to_string());
            if report.failed > 0 {
                output::print_warning("Some uploads failed; use `queue retry <id>` to try them again.");
            }
        }
        QueueCommand::Watch => {
            let options = QueueOptions::from_config(&config.client);
            if options.poll_interval.is_none() {
                return Err(AppError::configuration(
                    "client.poll_interval_seconds must be greater than zero to watch the queue",
                ));
            }
            let (queue, tracker) = open_queue(config, options).await?;
            println!(
                "Watching {} every {}s. Press Ctrl-C to stop.",
                config.client.queue_dir, config.client.poll_interval_seconds
            );
            tokio::signal::ctrl_c()
                .await
                .map_err(|e| AppError::internal(format!("Failed to listen for Ctrl-C: {e}")))?;
            let items = queue.snapshot().await?;
            close(&queue, &tracker).await?;
            print_items(&items, format);
        }
        QueueCommand::Retry { id } => {
            let (queue, tracker) = open_queue(config, options).await?;
            let item = queue.retry(id).await;
            close(&queue, &tracker).await?;
            let item = item?;
            output::print_success(&format!("{} ({}) is pending again", item.id, item.file_name));
        }
        QueueCommand::Clear { completed, force } => {
            if !completed && !force {
                let confirm = dialoguer::Confirm::new()
                    .with_prompt("Remove ALL queued uploads, including ones not sent yet?")
                    .default(false)
                    .interact()
                    .map_err(|e| AppError::internal(format!("Input error: {}", e)))?;

                if !confirm {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let (queue, tracker) = open_queue(config, options).await?;
            let removed = if *completed {
                queue.clear_completed().await
            } else {
                queue.clear().await
            };
            close(&queue, &tracker).await?;
            output::print_success(&format!("Removed {} item(s)", removed?));
        }
    }

    Ok(())
}
