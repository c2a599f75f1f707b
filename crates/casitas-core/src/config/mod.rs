//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod app;
pub mod client;
pub mod logging;
pub mod media;
pub mod records;
pub mod upload;

use serde::{Deserialize, Serialize};

pub use self::app::{CorsConfig, ServerConfig};
pub use self::client::ClientConfig;
pub use self::logging::LoggingConfig;
pub use self::media::MediaConfig;
pub use self::records::{DatabaseConfig, RecordsConfig};
pub use self::upload::UploadConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Chunk assembly settings.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Remote media store settings.
    #[serde(default)]
    pub media: MediaConfig,
    /// Record store settings.
    #[serde(default)]
    pub records: RecordsConfig,
    /// Transfer client and offline queue settings.
    #[serde(default)]
    pub client: ClientConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `CASITAS__`. The conventional
    /// `CLOUDINARY_*` and `PORT` variables win over everything else.
    pub fn load(env: &str) -> Result<Self, AppError> {
        Self::build(config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false)))
    }

    /// Load configuration from an explicit file path (plus environment overrides).
    pub fn load_file(path: &str) -> Result<Self, AppError> {
        Self::build(
            config::Config::builder().add_source(config::File::with_name(path).required(false)),
        )
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, AppError> {
        let builder = builder
            .add_source(
                config::Environment::with_prefix("CASITAS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("media.cloud_name", std::env::var("CLOUDINARY_CLOUD_NAME").ok())?
            .set_override_option("media.api_key", std::env::var("CLOUDINARY_API_KEY").ok())?
            .set_override_option("media.api_secret", std::env::var("CLOUDINARY_API_SECRET").ok())?
            .set_override_option(
                "server.port",
                std::env::var("PORT").ok().and_then(|p| p.parse::<i64>().ok()),
            )?;

        let config = builder
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
