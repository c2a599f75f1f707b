//! Record store migration commands.

use clap::{Args, Subcommand};

use crate::output;
use casitas_core::config::AppConfig;
use casitas_core::error::AppError;
use casitas_database::DatabasePool;

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration subcommand
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Run all pending migrations
    Run,
    /// Check that the record database answers
    Check,
}

/// Execute migration commands
pub async fn execute(args: &MigrateArgs, config: &AppConfig) -> Result<(), AppError> {
    if config.records.provider != "postgres" {
        return Err(AppError::configuration(format!(
            "records.provider is '{}'; migrations only apply to postgres",
            config.records.provider
        )));
    }
    let db = DatabasePool::connect(&config.records.database).await?;

    match &args.command {
        MigrateCommand::Run => {
            println!("Running database migrations...");
            casitas_database::migration::run_migrations(db.pool()).await?;
            output::print_success("All migrations applied successfully.");
        }
        MigrateCommand::Check => {
            if db.health_check().await? {
                output::print_success("Record database is reachable.");
            } else {
                output::print_warning("Record database did not answer the health query.");
            }
        }
    }

    db.close().await;
    Ok(())
}
