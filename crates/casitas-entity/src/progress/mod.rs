//! Upload progress entities.

pub mod record;
pub mod status;

pub use record::{KEY_SEPARATOR, UploadProgressRecord};
pub use status::ProgressStatus;
