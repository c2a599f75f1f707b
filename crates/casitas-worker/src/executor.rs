//! Job trait and failure classification.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use casitas_core::error::AppError;

/// Errors from job execution.
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Transient failure; the next tick runs the job again.
    #[error("Transient error: {0}")]
    Transient(String),
    /// The job cannot succeed and is removed from the runner.
    #[error("Permanent error: {0}")]
    Permanent(String),
    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

/// A job that runs on a fixed interval.
#[async_trait]
pub trait PeriodicJob: Send + Sync + std::fmt::Debug + 'static {
    /// Job name, used in logs.
    fn name(&self) -> &str;

    /// Time between runs.
    fn interval(&self) -> Duration;

    /// Whether to run once immediately at startup instead of waiting one interval.
    fn run_at_startup(&self) -> bool {
        false
    }

    /// Run the job once, returning a JSON summary for the log.
    async fn run(&self) -> Result<Value, JobExecutionError>;
}
