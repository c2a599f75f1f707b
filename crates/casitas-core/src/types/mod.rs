//! Core type definitions used across the Casitas workspace.

pub mod folder;
pub mod id;

pub use folder::media_folder;
pub use id::UploadId;
