//! # casitas-client
//!
//! Client side of the chunked upload pipeline:
//!
//! - [`ChunkTransferClient`] drives one file through init, chunk and
//!   finalize against the assembly service.
//! - [`OfflineUploadQueue`] accepts uploads while offline, persists them,
//!   and replays them from a background worker.
//! - [`UploadProgressTracker`] keeps the last known progress of each upload
//!   and mirrors it to disk.

pub mod error;
pub mod persist;
pub mod progress;
pub mod queue;
pub mod transfer;

pub use error::{TransferError, TransferPhase};
pub use progress::UploadProgressTracker;
pub use queue::{OfflineUploadQueue, ProcessReport, QueueCommand, QueueOptions};
pub use transfer::{ChunkTransferClient, ProgressCallback, ProgressUpdate, UploadRequest, Uploader};
