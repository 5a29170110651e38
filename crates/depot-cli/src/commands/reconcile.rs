//! Reconciliation scan command.

use std::sync::Arc;

use clap::Args;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use depot_core::config::AppConfig;
use depot_core::error::AppError;
use depot_database::repositories::{AuditLogRepository, FileRepository, VersionRepository};
use depot_service::{AuditTrail, ReconcileReport, ReconciliationEngine, ScanMode};
use depot_storage::s3::S3ObjectStore;

/// Arguments for the reconcile command
#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Apply corrective metadata changes instead of only reporting
    #[arg(long)]
    pub fix: bool,
}

#[derive(Tabled, serde::Serialize)]
struct MissingRow {
    #[tabled(rename = "Version")]
    version_id: String,
    #[tabled(rename = "File")]
    file_id: String,
    #[tabled(rename = "Object Key")]
    object_key: String,
}

#[derive(Tabled, serde::Serialize)]
struct OrphanRow {
    #[tabled(rename = "Orphan Object Key")]
    object_key: String,
}

/// Execute a reconciliation scan
pub async fn execute(
    args: &ReconcileArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let pool = super::create_db_pool(config).await?;

    let store = Arc::new(S3ObjectStore::new(&config.object_store).await?);
    let file_repo = Arc::new(FileRepository::new(pool.clone()));
    let version_repo = Arc::new(VersionRepository::new(pool.clone()));
    let audit = AuditTrail::new(Arc::new(AuditLogRepository::new(pool.clone())));

    let engine = ReconciliationEngine::new(file_repo, version_repo, store, audit);

    let mode = if args.fix {
        ScanMode::Fix
    } else {
        ScanMode::Report
    };
    let report = engine.scan(mode).await?;

    match format {
        OutputFormat::Json => output::print_item(&report, format),
        OutputFormat::Table => print_report(&report),
    }

    Ok(())
}

fn print_report(report: &ReconcileReport) {
    println!("Reconciliation scan ({:?} mode)", report.mode);
    output::print_kv("Started", &report.started_at.to_rfc3339());
    output::print_kv("Finished", &report.finished_at.to_rfc3339());
    output::print_kv("Versions checked", &report.versions_checked.to_string());
    output::print_kv("Missing objects", &report.missing.len().to_string());
    output::print_kv("Orphan objects", &report.orphan_objects.len().to_string());
    if report.mode == ScanMode::Fix {
        output::print_kv("Flagged corrupted", &report.flagged_corrupted.to_string());
        output::print_kv("Repointed files", &report.repointed_files.to_string());
        output::print_kv("Degraded files", &report.degraded_files.to_string());
    }

    if !report.missing.is_empty() {
        println!();
        let rows: Vec<MissingRow> = report
            .missing
            .iter()
            .map(|m| MissingRow {
                version_id: m.version_id.to_string(),
                file_id: m.file_id.to_string(),
                object_key: m.object_key.clone(),
            })
            .collect();
        output::print_list(&rows, OutputFormat::Table);
    }

    if !report.orphan_objects.is_empty() {
        println!();
        let rows: Vec<OrphanRow> = report
            .orphan_objects
            .iter()
            .map(|key| OrphanRow {
                object_key: key.clone(),
            })
            .collect();
        output::print_list(&rows, OutputFormat::Table);
    }

    println!();
    if !report.is_complete() {
        output::print_warning(
            "Scan did not complete; rerun once the object store is reachable.",
        );
    } else if report.has_findings() {
        output::print_warning("Drift detected between metadata and the object store.");
    } else {
        output::print_success("Metadata and object store are consistent.");
    }
}
