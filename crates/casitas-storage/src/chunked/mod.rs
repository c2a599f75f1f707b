//! Chunked upload scratch handling.

pub mod assembler;
pub mod cleanup;
pub mod upload;

pub use assembler::ChunkAssembler;
pub use cleanup::OrphanChunkCleanup;
pub use upload::ChunkedUploadHandler;
