//! Remote media store adapters.

#[cfg(feature = "cloudinary")]
pub mod cloudinary;
pub mod memory;

use std::sync::Arc;

use casitas_core::config::MediaConfig;
use casitas_core::error::AppError;
use casitas_core::result::AppResult;
use casitas_core::traits::media::MediaStore;

#[cfg(feature = "cloudinary")]
pub use cloudinary::CloudinaryMediaStore;
pub use memory::MemoryMediaStore;

/// Build the media store selected by `config.provider`.
pub fn build_media_store(config: &MediaConfig) -> AppResult<Arc<dyn MediaStore>> {
    match config.provider.as_str() {
        #[cfg(feature = "cloudinary")]
        "cloudinary" => Ok(Arc::new(CloudinaryMediaStore::new(config)?)),
        "memory" => Ok(Arc::new(MemoryMediaStore::new(&config.delivery_base_url))),
        other => Err(AppError::configuration(format!(
            "Unknown media provider: {other}"
        ))),
    }
}
