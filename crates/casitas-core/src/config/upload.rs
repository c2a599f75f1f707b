//! Chunk assembly service configuration.

use serde::{Deserialize, Serialize};

/// Settings for the chunk assembly service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Chunk size in bytes agreed between client and service (default 1 MiB).
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: u64,
    /// Scratch directory holding chunk files and assembled files.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,
    /// Sessions older than this are discarded by the sweep, complete or not.
    #[serde(default = "default_retention_hours")]
    pub session_retention_hours: u64,
    /// Interval between sweeps in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Top-level folder under which finalized media is filed.
    #[serde(default = "default_namespace")]
    pub media_namespace: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: default_chunk_size(),
            scratch_dir: default_scratch_dir(),
            session_retention_hours: default_retention_hours(),
            sweep_interval_seconds: default_sweep_interval(),
            media_namespace: default_namespace(),
        }
    }
}

pub(crate) fn default_chunk_size() -> u64 {
    1024 * 1024
}

fn default_scratch_dir() -> String {
    "./data/uploads".to_string()
}

fn default_retention_hours() -> u64 {
    24
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_namespace() -> String {
    "casitas".to_string()
}
