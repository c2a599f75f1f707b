//! CLI command definitions and dispatch.

pub mod health;
pub mod migrate;
pub mod progress;
pub mod queue;
pub mod upload;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use casitas_client::{ChunkTransferClient, UploadProgressTracker};
use casitas_core::config::AppConfig;
use casitas_core::error::{AppError, ErrorKind};
use casitas_core::traits::SystemClock;

/// Casitas: chunked evidence uploads for house inspections
#[derive(Debug, Parser)]
#[command(name = "casitas", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Override the upload service URL
    #[arg(short, long)]
    pub server: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload files right away
    Upload(upload::UploadArgs),
    /// Offline upload queue
    Queue(queue::QueueArgs),
    /// Upload progress records
    Progress(progress::ProgressArgs),
    /// Check that the upload service answers
    Health,
    /// Record store migrations
    Migrate(migrate::MigrateArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let mut config = load_config(&self.config)?;
        if let Some(server) = &self.server {
            config.client.server_url = server.clone();
        }

        match &self.command {
            Commands::Upload(args) => upload::execute(args, &config, self.format).await,
            Commands::Queue(args) => queue::execute(args, &config, self.format).await,
            Commands::Progress(args) => progress::execute(args, &config, self.format).await,
            Commands::Health => health::execute(&config).await,
            Commands::Migrate(args) => migrate::execute(args, &config).await,
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::load_file(config_path.trim_end_matches(".toml"))
        .map_err(|e| AppError::configuration(format!("Failed to load config: {}", e.message)))
}

/// Helper: transfer client for the configured service
pub fn transfer_client(config: &AppConfig) -> Result<Arc<ChunkTransferClient>, AppError> {
    Ok(Arc::new(ChunkTransferClient::from_config(&config.client)?))
}

/// Helper: progress tracker mirrored to the configured file
pub async fn open_tracker(config: &AppConfig) -> Result<UploadProgressTracker, AppError> {
    UploadProgressTracker::open(&config.client.progress_file, Arc::new(SystemClock)).await
}

/// A file read from disk, ready to send.
#[derive(Debug)]
pub struct LocalFile {
    pub path: PathBuf,
    pub name: String,
    pub data: Bytes,
}

/// Helper: read a file and pick its upload name
pub async fn read_file(path: &Path) -> Result<LocalFile, AppError> {
    let data = tokio::fs::read(path).await.map_err(|e| {
        let kind = if e.kind() == std::io::ErrorKind::NotFound {
            ErrorKind::NotFound
        } else {
            ErrorKind::Storage
        };
        AppError::with_source(kind, format!("Failed to read {}: {}", path.display(), e), e)
    })?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(LocalFile {
        path: path.to_path_buf(),
        name,
        data: Bytes::from(data),
    })
}

/// Helper: shorten a timestamp for table output
pub fn short_time(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}
