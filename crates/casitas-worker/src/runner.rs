//! Job runner: ticks each registered job on its own interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};

use crate::executor::{JobExecutionError, PeriodicJob};

/// Runs periodic jobs until the cancel signal is received.
#[derive(Debug, Default)]
pub struct JobRunner {
    jobs: Vec<Arc<dyn PeriodicJob>>,
}

impl JobRunner {
    /// Create an empty runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job.
    pub fn with_job(mut self, job: impl PeriodicJob) -> Self {
        self.jobs.push(Arc::new(job));
        self
    }

    /// Number of registered jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Run every job until `cancel` flips to `true` or its sender is dropped.
    ///
    /// A run in progress is allowed to finish; the runner waits for it
    /// before returning.
    pub async fn run(self, cancel: watch::Receiver<bool>) {
        tracing::info!(jobs = self.jobs.len(), "Job runner started");

        let mut set = JoinSet::new();
        for job in self.jobs {
            set.spawn(run_job(job, cancel.clone()));
        }
        while set.join_next().await.is_some() {}

        tracing::info!("Job runner shut down complete");
    }
}

async fn run_job(job: Arc<dyn PeriodicJob>, mut cancel: watch::Receiver<bool>) {
    let period = job.interval().max(Duration::from_millis(1));
    let mut ticker = if job.run_at_startup() {
        time::interval(period)
    } else {
        time::interval_at(time::Instant::now() + period, period)
    };
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        job = job.name(),
        interval_secs = period.as_secs(),
        "Scheduled periodic job"
    );

    loop {
        if *cancel.borrow() {
            break;
        }
        tokio::select! {
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match job.run().await {
                    Ok(summary) => {
                        tracing::info!(job = job.name(), %summary, "Job completed");
                    }
                    Err(JobExecutionError::Transient(msg)) => {
                        tracing::warn!(job = job.name(), error = %msg, "Job failed (transient)");
                    }
                    Err(JobExecutionError::Permanent(msg)) => {
                        tracing::error!(job = job.name(), error = %msg, "Job failed permanently; unscheduling");
                        break;
                    }
                    Err(JobExecutionError::Internal(err)) => {
                        tracing::error!(job = job.name(), error = %err, "Job internal error");
                    }
                }
            }
        }
    }

    tracing::info!(job = job.name(), "Job stopped");
}
