//! Lock inspection and administration commands.

use std::sync::Arc;

use clap::{Args, Subcommand};
use serde_json::json;
use tabled::Tabled;
use uuid::Uuid;

use crate::output::{self, OutputFormat};
use depot_core::config::AppConfig;
use depot_core::error::AppError;
use depot_core::types::context::RequestContext;
use depot_database::repositories::{AuditLogRepository, FileRepository, LockRepository};
use depot_service::AuditTrail;

/// Arguments for the locks command
#[derive(Debug, Args)]
pub struct LocksArgs {
    /// Lock subcommand
    #[command(subcommand)]
    pub command: LocksCommand,
}

/// Lock subcommands
#[derive(Debug, Subcommand)]
pub enum LocksCommand {
    /// List all held locks with their health
    List,
    /// Forcibly release the lock on a file
    ForceUnlock {
        /// The locked file's ID
        file_id: Uuid,
    },
}

#[derive(Tabled, serde::Serialize)]
struct LockRow {
    #[tabled(rename = "File")]
    file_id: String,
    #[tabled(rename = "Path")]
    logical_path: String,
    #[tabled(rename = "Held By")]
    locked_by: String,
    #[tabled(rename = "Since")]
    locked_at: String,
    #[tabled(rename = "Forced")]
    forced: bool,
    #[tabled(rename = "Orphaned")]
    orphaned: bool,
}

/// Execute lock commands
pub async fn execute(
    args: &LocksArgs,
    config: &AppConfig,
    format: OutputFormat,
    ctx: RequestContext,
) -> Result<(), AppError> {
    let pool = super::create_db_pool(config).await?;

    let file_repo = FileRepository::new(pool.clone());
    let lock_repo = LockRepository::new(pool.clone());

    match &args.command {
        LocksCommand::List => {
            let locks = lock_repo.list_all().await?;
            let mut rows = Vec::with_capacity(locks.len());
            for row in locks {
                let draft = file_repo.find_draft_of(row.lock.file_id).await?;
                rows.push(LockRow {
                    file_id: row.lock.file_id.to_string(),
                    logical_path: row.logical_path,
                    locked_by: row.lock.locked_by.to_string(),
                    locked_at: row.lock.locked_at.to_rfc3339(),
                    forced: row.lock.forced,
                    orphaned: draft.is_none(),
                });
            }
            output::print_list(&rows, format);
            let orphaned = rows.iter().filter(|r| r.orphaned).count();
            if orphaned > 0 && format == OutputFormat::Table {
                output::print_warning(&format!(
                    "{} lock(s) have no live draft behind them.",
                    orphaned
                ));
            }
        }
        LocksCommand::ForceUnlock { file_id } => {
            let removed = lock_repo
                .force_release(*file_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("No lock exists on file {file_id}")))?;

            let audit = AuditTrail::new(Arc::new(AuditLogRepository::new(pool.clone())));
            audit
                .record(
                    &ctx,
                    "lock",
                    *file_id,
                    "lock.force_release",
                    Some(json!({
                        "displaced_holder": removed.locked_by,
                        "locked_at": removed.locked_at,
                        "forced": true,
                    })),
                )
                .await;

            output::print_success(&format!(
                "Lock on file {} released; displaced holder {}.",
                file_id, removed.locked_by
            ));
            if let Some(draft) = file_repo.find_draft_of(*file_id).await? {
                output::print_warning(&format!(
                    "Draft copy {} still exists and keeps its uncommitted content.",
                    draft.id
                ));
            }
        }
    }

    Ok(())
}
