//! Periodic background jobs for Casitas.
//!
//! This crate provides:
//! - A [`JobRunner`] that runs registered jobs on fixed intervals until a
//!   cancel signal arrives
//! - The [`PeriodicJob`] trait jobs implement
//! - The upload session sweep job

pub mod executor;
pub mod jobs;
pub mod runner;

pub use executor::{JobExecutionError, PeriodicJob};
pub use jobs::SessionSweepJob;
pub use runner::JobRunner;
