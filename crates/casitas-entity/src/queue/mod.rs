//! Offline upload queue entities.

pub mod item;
pub mod status;

pub use item::QueuedUploadItem;
pub use status::QueueStatus;
