//! Server-side upload session entities.

pub mod session;
pub mod state;

pub use session::{ChunkSlot, UploadSession};
pub use state::SessionState;
