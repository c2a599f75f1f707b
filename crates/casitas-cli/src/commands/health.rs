//! Service health check.

use casitas_client::Uploader;
use casitas_core::config::AppConfig;
use casitas_core::error::AppError;

use crate::output;

/// Execute the health command
pub async fn execute(config: &AppConfig) -> Result<(), AppError> {
    let client = super::transfer_client(config)?;
    client.health().await?;
    output::print_success(&format!("{} is reachable", config.client.server_url));
    Ok(())
}
