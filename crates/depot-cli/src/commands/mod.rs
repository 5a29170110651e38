//! CLI command definitions and dispatch.
//!
//! The CLI is operator tooling: it talks to repositories and the object
//! store directly, with no access gate in between, and records its actions
//! in the audit log under the actor supplied by `--actor`.

pub mod files;
pub mod locks;
pub mod migrate;
pub mod reconcile;
pub mod worker;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::output::OutputFormat;
use depot_core::config::AppConfig;
use depot_core::error::AppError;
use depot_core::types::context::RequestContext;

/// Depot — Collaborative Versioned File Storage
#[derive(Debug, Parser)]
#[command(name = "depot", version, about, long_about = None)]
pub struct Cli {
    /// Configuration environment (reads config/<env>.toml over config/default.toml)
    #[arg(short, long, default_value = "default")]
    pub config: String,

    /// Actor recorded in the audit log for mutating commands
    #[arg(long)]
    pub actor: Option<Uuid>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Run a reconciliation scan
    Reconcile(reconcile::ReconcileArgs),
    /// Lock inspection and administration
    Locks(locks::LocksArgs),
    /// File administration
    Files(files::FilesArgs),
    /// Worker management
    Worker(worker::WorkerArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: &AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, config).await,
            Commands::Reconcile(args) => reconcile::execute(args, config, self.format).await,
            Commands::Locks(args) => {
                locks::execute(args, config, self.format, self.operator_context()).await
            }
            Commands::Files(args) => files::execute(args, config, self.operator_context()).await,
            Commands::Worker(args) => worker::execute(args, config).await,
        }
    }

    /// The context recorded for operator actions.
    fn operator_context(&self) -> RequestContext {
        match self.actor {
            Some(actor) => RequestContext::new(actor, Uuid::nil(), None, None),
            None => RequestContext::system(),
        }
    }
}

/// Helper: create database pool from config
pub async fn create_db_pool(config: &AppConfig) -> Result<sqlx::PgPool, AppError> {
    let pool = depot_database::connection::DatabasePool::connect(&config.database).await?;
    Ok(pool.into_pool())
}
