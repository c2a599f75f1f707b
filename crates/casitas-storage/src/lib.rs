//! # casitas-storage
//!
//! Scratch storage for chunked uploads (chunk writes, assembly, orphan
//! cleanup) and adapters for the remote media store that receives
//! finalized files.

pub mod chunked;
pub mod media;
pub mod providers;

pub use chunked::{ChunkAssembler, ChunkedUploadHandler, OrphanChunkCleanup};
pub use media::{MemoryMediaStore, build_media_store};
pub use providers::LocalStorageProvider;
