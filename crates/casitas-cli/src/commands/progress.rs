//! Upload progress commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use casitas_core::config::AppConfig;
use casitas_core::error::AppError;
use casitas_entity::UploadProgressRecord;

/// Arguments for progress commands
#[derive(Debug, Args)]
pub struct ProgressArgs {
    /// Progress subcommand
    #[command(subcommand)]
    pub command: ProgressCommand,
}

/// Progress subcommands
#[derive(Debug, Subcommand)]
pub enum ProgressCommand {
    /// List progress records
    List {
        /// Only show files of this record
        #[arg(short, long)]
        record_id: Option<String>,
    },
    /// Drop completed and failed records
    Prune,
}

/// Progress display row
#[derive(Debug, Serialize, Tabled)]
struct ProgressRow {
    /// Key
    key: String,
    /// Status
    status: String,
    /// Progress
    progress: String,
    /// Updated
    updated: String,
    /// Message or URL
    detail: String,
}

impl From<&UploadProgressRecord> for ProgressRow {
    fn from(record: &UploadProgressRecord) -> Self {
        Self {
            key: record.key.clone(),
            status: record.status.to_string(),
            progress: format!("{}%", record.progress),
            updated: super::short_time(record.updated_at),
            detail: record
                .message
                .clone()
                .or_else(|| record.url.clone())
                .unwrap_or_default(),
        }
    }
}

/// Execute progress commands
pub async fn execute(args: &ProgressArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let tracker = super::open_tracker(config).await?;

    match &args.command {
        ProgressCommand::List { record_id } => {
            let records = match record_id {
                Some(record_id) => tracker.get_by_record(record_id),
                None => tracker.snapshot(),
            };
            let rows: Vec<ProgressRow> = records.iter().map(ProgressRow::from).collect();
            output::print_list(&rows, format);
        }
        ProgressCommand::Prune => {
            let removed = tracker.clear_finished();
            tracker.flush().await?;
            output::print_success(&format!("Removed {} finished record(s)", removed));
        }
    }

    Ok(())
}
