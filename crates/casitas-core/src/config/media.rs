//! Remote media store configuration.

use serde::{Deserialize, Serialize};

/// Remote media store (Cloudinary-compatible) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Provider: `"cloudinary"` or `"memory"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Cloudinary cloud name.
    #[serde(default)]
    pub cloud_name: String,
    /// Cloudinary API key.
    #[serde(default)]
    pub api_key: String,
    /// Cloudinary API secret.
    #[serde(default)]
    pub api_secret: String,
    /// Base URL of the upload API.
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
    /// Host used for URLs issued by the in-memory provider.
    #[serde(default = "default_delivery_base")]
    pub delivery_base_url: String,
    /// Upload request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl MediaConfig {
    /// Whether the cloud name, key and secret are all present.
    pub fn credentials_configured(&self) -> bool {
        !self.cloud_name.is_empty() && !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            api_base_url: default_api_base(),
            delivery_base_url: default_delivery_base(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_provider() -> String {
    "cloudinary".to_string()
}

fn default_api_base() -> String {
    "https://api.cloudinary.com/v1_1".to_string()
}

fn default_delivery_base() -> String {
    "https://res.cloudinary.com".to_string()
}

fn default_timeout() -> u64 {
    120
}
