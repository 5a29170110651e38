//! Database migration management commands.

use clap::{Args, Subcommand};

use crate::output;
use depot_core::config::AppConfig;
use depot_core::error::AppError;

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration subcommand
    #[command(subcommand)]
    pub command: Option<MigrateCommand>,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Run all pending migrations (default)
    Run,
}

/// Execute migration commands
pub async fn execute(args: &MigrateArgs, config: &AppConfig) -> Result<(), AppError> {
    let pool = super::create_db_pool(config).await?;

    match args.command.as_ref().unwrap_or(&MigrateCommand::Run) {
        MigrateCommand::Run => {
            println!("Running database migrations...");
            depot_database::migration::run_migrations(&pool).await?;
            output::print_success("All migrations applied successfully.");
        }
    }

    Ok(())
}
