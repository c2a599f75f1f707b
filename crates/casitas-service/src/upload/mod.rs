//! Chunked upload flow.

pub mod request;
pub mod service;

pub use request::{
    ChunkAccepted, ChunkRequest, FinalizeRequest, Finalized, InitRequest, Initialized,
    SessionStatus, SweepReport,
};
pub use service::AssemblyService;
