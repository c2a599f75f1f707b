//! Transfer client, offline queue and progress tracker configuration.

use serde::{Deserialize, Serialize};

use super::upload::default_chunk_size;

/// Client-side settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the chunk assembly service.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Chunk size in bytes; must match the service's `upload.chunk_size_bytes`.
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: u64,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Directory holding the durable offline queue.
    #[serde(default = "default_queue_dir")]
    pub queue_dir: String,
    /// File mirroring the progress tracker state.
    #[serde(default = "default_progress_file")]
    pub progress_file: String,
    /// Interval between queue polls in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Maximum concurrent direct uploads started from the CLI.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_uploads: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            chunk_size_bytes: default_chunk_size(),
            request_timeout_seconds: default_request_timeout(),
            queue_dir: default_queue_dir(),
            progress_file: default_progress_file(),
            poll_interval_seconds: default_poll_interval(),
            max_concurrent_uploads: default_max_concurrent(),
        }
    }
}

fn default_server_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_queue_dir() -> String {
    "./data/client/queue".to_string()
}

fn default_progress_file() -> String {
    "./data/client/progress.json".to_string()
}

fn default_poll_interval() -> u64 {
    30
}

fn default_max_concurrent() -> usize {
    4
}
