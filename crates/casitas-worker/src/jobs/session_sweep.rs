//! Expired upload session sweep.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use casitas_service::AssemblyService;

use crate::executor::{JobExecutionError, PeriodicJob};

/// Discards upload sessions older than the retention window, along with
/// their scratch files and any orphaned scratch directories.
#[derive(Debug)]
pub struct SessionSweepJob {
    service: AssemblyService,
    interval: Duration,
}

impl SessionSweepJob {
    /// Create the job with the interval from the upload settings.
    pub fn new(service: AssemblyService) -> Self {
        let interval = Duration::from_secs(service.config().sweep_interval_seconds.max(1));
        Self { service, interval }
    }

    /// Override the interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

#[async_trait]
impl PeriodicJob for SessionSweepJob {
    fn name(&self) -> &str {
        "session_sweep"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn run_at_startup(&self) -> bool {
        true
    }

    async fn run(&self) -> Result<Value, JobExecutionError> {
        let report = self
            .service
            .sweep()
            .await
            .map_err(|e| JobExecutionError::Transient(format!("Session sweep failed: {e}")))?;

        Ok(serde_json::json!({
            "task": "session_sweep",
            "sessions_removed": report.sessions_removed,
            "orphans_removed": report.orphans_removed,
        }))
    }
}
