//! # casitas-service
//!
//! Business logic of the chunk assembly service. [`AssemblyService`]
//! buffers chunks in scratch storage, assembles them on finalize, hands
//! the result to the media store and records the URL on the inspection.
//!
//! Collaborators are injected at construction time via `Arc` references.

pub mod error;
pub mod upload;

pub use error::UploadError;
pub use upload::{
    AssemblyService, ChunkAccepted, ChunkRequest, FinalizeRequest, Finalized, InitRequest,
    Initialized, SessionStatus, SweepReport,
};
