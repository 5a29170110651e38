//! File administration commands.

use clap::{Args, Subcommand};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::output;
use depot_core::config::AppConfig;
use depot_core::error::{AppError, ErrorKind};
use depot_core::traits::object_store::ObjectStore;
use depot_core::types::context::RequestContext;
use depot_database::repositories::{
    AuditLogRepository, FileRepository, LockRepository, VersionRepository,
};
use depot_entity::file::status::FileStatus;
use depot_service::AuditTrail;
use depot_storage::s3::S3ObjectStore;

/// Arguments for the files command
#[derive(Debug, Args)]
pub struct FilesArgs {
    /// Files subcommand
    #[command(subcommand)]
    pub command: FilesCommand,
}

/// Files subcommands
#[derive(Debug, Subcommand)]
pub enum FilesCommand {
    /// Delete a file (archive by default)
    Delete {
        /// The file's ID
        file_id: Uuid,

        /// Remove all metadata rows and backing objects instead of archiving
        #[arg(long)]
        physical: bool,
    },
}

/// Execute file commands
pub async fn execute(
    args: &FilesArgs,
    config: &AppConfig,
    ctx: RequestContext,
) -> Result<(), AppError> {
    let pool = super::create_db_pool(config).await?;

    match &args.command {
        FilesCommand::Delete { file_id, physical } => {
            let file_repo = FileRepository::new(pool.clone());
            let lock_repo = LockRepository::new(pool.clone());
            let audit = AuditTrail::new(Arc::new(AuditLogRepository::new(pool.clone())));

            let file = file_repo
                .find_by_id(*file_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))?;
            if let Some(lock) = lock_repo.find_by_file(*file_id).await? {
                return Err(AppError::lock_conflict(format!(
                    "File {file_id} is locked by {} and cannot be deleted",
                    lock.locked_by
                )));
            }

            if *physical {
                let store = S3ObjectStore::new(&config.object_store).await?;

                let mut tx = pool.begin().await.map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Transaction failed", e)
                })?;
                let object_keys = VersionRepository::delete_by_file_tx(&mut tx, *file_id).await?;
                FileRepository::delete_tx(&mut tx, *file_id).await?;
                tx.commit().await.map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Transaction failed", e)
                })?;

                for key in &object_keys {
                    if let Err(e) = store.delete(key).await {
                        warn!(key, error = %e, "Failed to delete object; left for reconciliation");
                    }
                }

                audit
                    .record(
                        &ctx,
                        "file",
                        *file_id,
                        "file.physical_delete",
                        Some(json!({ "deleted_versions": object_keys.len() })),
                    )
                    .await;
                output::print_success(&format!(
                    "File {} deleted with {} version(s).",
                    file_id,
                    object_keys.len()
                ));
            } else {
                file_repo
                    .set_status(*file_id, file.status.transition_to(FileStatus::Archived)?)
                    .await?;
                audit
                    .record(&ctx, "file", *file_id, "file.soft_delete", None)
                    .await;
                output::print_success(&format!("File {} archived.", file_id));
            }
        }
    }

    Ok(())
}
