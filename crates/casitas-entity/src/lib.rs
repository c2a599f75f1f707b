//! # casitas-entity
//!
//! Domain entity models for the Casitas upload pipeline. Every struct in
//! this crate is either an in-flight value object (upload sessions, queue
//! items, progress records) or a database row (inspection evidence). All
//! entities derive `Debug`, `Clone`, `Serialize`, `Deserialize`.

pub mod inspection;
pub mod progress;
pub mod queue;
pub mod upload;

pub use inspection::{EvidenceRow, InspectionEvidence};
pub use progress::{ProgressStatus, UploadProgressRecord};
pub use queue::{QueueStatus, QueuedUploadItem};
pub use upload::{ChunkSlot, SessionState, UploadSession};
