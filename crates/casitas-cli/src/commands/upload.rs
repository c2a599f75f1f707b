//! Direct upload command.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::output::{self, OutputFormat};
use casitas_client::{UploadRequest, Uploader};
use casitas_core::config::AppConfig;
use casitas_core::error::AppError;
use casitas_entity::UploadProgressRecord;

/// Arguments for the upload command
#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Inspection record the files belong to
    #[arg(short, long)]
    pub record_id: String,

    /// Evidence slot to fill (only meaningful with a single file)
    #[arg(long)]
    pub field: Option<String>,

    /// Parallel uploads; defaults to `client.max_concurrent_uploads`
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,
}

/// Upload outcome row
#[derive(Debug, Serialize, Tabled)]
struct UploadRow {
    /// File
    file: String,
    /// Result
    status: String,
    /// URL or error
    detail: String,
}

/// Execute the upload command
pub async fn execute(args: &UploadArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    if args.field.is_some() && args.files.len() > 1 {
        return Err(AppError::validation("--field can only be used with a single file"));
    }

    let client = super::transfer_client(config)?;
    let tracker = super::open_tracker(config).await?;
    let jobs = args.jobs.unwrap_or(config.client.max_concurrent_uploads).max(1);
    let permits = Arc::new(Semaphore::new(jobs));

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        files.push(super::read_file(path).await?);
    }

    tracing::debug!(files = files.len(), jobs, record_id = %args.record_id, "Starting direct uploads");
    println!("Uploading {} file(s) to {} ({} at a time)...", files.len(), config.client.server_url, jobs);

    let mut set = JoinSet::new();
    for (position, file) in files.into_iter().enumerate() {
        let client = client.clone();
        let permits = permits.clone();
        let key = UploadProgressRecord::key_for(&args.record_id, &file.name);
        let on_progress = tracker.callback(&key, &file.name);
        let request = UploadRequest {
            upload_id: None,
            file_name: file.name.clone(),
            data: file.data,
            record_id: args.record_id.clone(),
            field_name: args.field.clone(),
        };
        set.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let result = client.upload(request, on_progress).await;
            (position, file.path, result)
        });
    }

    let mut results = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        let outcome = joined.map_err(|e| AppError::internal(format!("Upload task panicked: {e}")))?;
        results.push(outcome);
    }
    results.sort_by_key(|(position, _, _)| *position);
    tracker.flush().await?;

    let failed = results.iter().filter(|(_, _, r)| r.is_err()).count();
    let rows: Vec<UploadRow> = results
        .into_iter()
        .map(|(_, path, result)| {
            let file = path.display().to_string();
            match result {
                Ok(url) => UploadRow {
                    file,
                    status: "completed".to_string(),
                    detail: url,
                },
                Err(e) => UploadRow {
                    file,
                    status: "error".to_string(),
                    detail: e.to_string(),
                },
            }
        })
        .collect();
    output::print_list(&rows, format);

    if failed > 0 {
        return Err(AppError::external(format!("{failed} upload(s) failed")));
    }
    output::print_success("All uploads completed.");
    Ok(())
}
