//! Worker management commands.

use std::sync::Arc;

use clap::{Args, Subcommand};

use crate::output;
use depot_core::config::AppConfig;
use depot_core::error::AppError;
use depot_database::repositories::{AuditLogRepository, FileRepository, VersionRepository};
use depot_service::{AuditTrail, ReconciliationEngine};
use depot_storage::s3::S3ObjectStore;
use depot_worker::scheduler::CronScheduler;

/// Arguments for the worker command
#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Worker subcommand
    #[command(subcommand)]
    pub command: WorkerCommand,
}

/// Worker subcommands
#[derive(Debug, Subcommand)]
pub enum WorkerCommand {
    /// Run the scheduled-task worker until interrupted
    Run,
}

/// Execute worker commands
pub async fn execute(args: &WorkerArgs, config: &AppConfig) -> Result<(), AppError> {
    match args.command {
        WorkerCommand::Run => {
            if !config.worker.enabled {
                output::print_warning("Worker is disabled in configuration.");
                return Ok(());
            }

            let pool = super::create_db_pool(config).await?;
            let store = Arc::new(S3ObjectStore::new(&config.object_store).await?);
            let file_repo = Arc::new(FileRepository::new(pool.clone()));
            let version_repo = Arc::new(VersionRepository::new(pool.clone()));
            let audit = AuditTrail::new(Arc::new(AuditLogRepository::new(pool.clone())));
            let engine = Arc::new(ReconciliationEngine::new(
                file_repo,
                version_repo,
                store,
                audit,
            ));

            let mut scheduler = CronScheduler::new(engine, config.worker.clone()).await?;
            scheduler.register_default_tasks().await?;
            scheduler.start().await?;
            output::print_success("Worker started. Press Ctrl+C to stop.");

            tokio::signal::ctrl_c()
                .await
                .map_err(|e| AppError::internal(format!("Failed to listen for shutdown: {}", e)))?;

            println!("Shutting down...");
            scheduler.shutdown().await?;
            output::print_success("Worker stopped.");
        }
    }

    Ok(())
}
