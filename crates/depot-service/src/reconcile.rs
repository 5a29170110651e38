//! Reconciliation engine — detects and heals drift between the object
//! store and the metadata store.
//!
//! Two passes. The DB-orphan pass verifies that every non-corrupted
//! version's object still exists; the object-orphan pass lists stored keys
//! and reports the ones no version row claims. The engine never deletes
//! objects; orphan bytes are cheap, while deleting the wrong object is not
//! recoverable.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use depot_core::result::AppResult;
use depot_core::traits::object_store::{ObjectMeta, ObjectStore};
use depot_core::types::context::RequestContext;
use depot_database::repositories::{FileStore, VersionStore};

use crate::audit::AuditTrail;

/// How a scan treats the drift it finds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Report findings only.
    Report,
    /// Report and apply corrective metadata changes.
    Fix,
}

/// A version whose backing object is missing.
#[derive(Debug, Clone, Serialize)]
pub struct MissingObject {
    /// The affected version.
    pub version_id: Uuid,
    /// The file owning the version.
    pub file_id: Uuid,
    /// The key that should have existed.
    pub object_key: String,
}

/// Outcome of a reconciliation scan.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    /// The mode the scan ran in.
    pub mode: ScanMode,
    /// When the scan started.
    pub started_at: DateTime<Utc>,
    /// When the scan finished.
    pub finished_at: DateTime<Utc>,
    /// Versions whose objects were checked.
    pub versions_checked: usize,
    /// Versions with missing objects.
    pub missing: Vec<MissingObject>,
    /// Versions newly flagged corrupted (Fix mode only).
    pub flagged_corrupted: usize,
    /// Files repointed to an older approved version (Fix mode only).
    pub repointed_files: usize,
    /// Files left with no healthy version (Fix mode only).
    pub degraded_files: usize,
    /// Object keys no version row claims.
    pub orphan_objects: Vec<String>,
    /// Whether the DB-orphan pass ran to completion.
    pub db_pass_complete: bool,
    /// Whether the object-orphan pass ran to completion.
    pub object_pass_complete: bool,
}

impl ReconcileReport {
    fn new(mode: ScanMode) -> Self {
        Self {
            mode,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            versions_checked: 0,
            missing: Vec::new(),
            flagged_corrupted: 0,
            repointed_files: 0,
            degraded_files: 0,
            orphan_objects: Vec::new(),
            db_pass_complete: false,
            object_pass_complete: false,
        }
    }

    /// Whether both passes completed.
    pub fn is_complete(&self) -> bool {
        self.db_pass_complete && self.object_pass_complete
    }

    /// Whether the scan found any drift.
    pub fn has_findings(&self) -> bool {
        !self.missing.is_empty() || !self.orphan_objects.is_empty()
    }
}

/// Scans for and optionally heals store/metadata drift.
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    file_repo: Arc<dyn FileStore>,
    version_repo: Arc<dyn VersionStore>,
    store: Arc<dyn ObjectStore>,
    audit: AuditTrail,
}

impl ReconciliationEngine {
    /// Create a new reconciliation engine.
    pub fn new(
        file_repo: Arc<dyn FileStore>,
        version_repo: Arc<dyn VersionStore>,
        store: Arc<dyn ObjectStore>,
        audit: AuditTrail,
    ) -> Self {
        Self {
            file_repo,
            version_repo,
            store,
            audit,
        }
    }

    /// Run a scan.
    ///
    /// A store failure aborts the pass it occurs in and leaves the report
    /// marked incomplete; findings from the completed portion are kept.
    pub async fn scan(&self, mode: ScanMode) -> AppResult<ReconcileReport> {
        info!(?mode, "Starting reconciliation scan");
        let mut report = ReconcileReport::new(mode);

        self.db_orphan_pass(&mut report).await?;
        self.object_orphan_pass(&mut report).await?;

        report.finished_at = Utc::now();
        info!(
            versions_checked = report.versions_checked,
            missing = report.missing.len(),
            orphans = report.orphan_objects.len(),
            complete = report.is_complete(),
            "Reconciliation scan finished"
        );

        let ctx = RequestContext::system();
        self.audit
            .record(
                &ctx,
                "reconciliation",
                Uuid::nil(),
                "reconcile.scan",
                Some(json!({
                    "mode": report.mode,
                    "versions_checked": report.versions_checked,
                    "missing": report.missing.len(),
                    "flagged_corrupted": report.flagged_corrupted,
                    "repointed_files": report.repointed_files,
                    "degraded_files": report.degraded_files,
                    "orphan_objects": report.orphan_objects.len(),
                    "complete": report.is_complete(),
                })),
            )
            .await;

        Ok(report)
    }

    /// Verify that every non-corrupted version's object exists.
    async fn db_orphan_pass(&self, report: &mut ReconcileReport) -> AppResult<()> {
        let versions = self.version_repo.list_unverified().await?;

        for version in &versions {
            match self.store.stat(&version.object_key).await {
                Ok(Some(_)) => {
                    report.versions_checked += 1;
                }
                Ok(None) => {
                    report.versions_checked += 1;
                    warn!(
                        version_id = %version.id,
                        file_id = %version.file_id,
                        key = %version.object_key,
                        "Version object missing"
                    );
                    report.missing.push(MissingObject {
                        version_id: version.id,
                        file_id: version.file_id,
                        object_key: version.object_key.clone(),
                    });
                }
                // Can't tell absent from unreachable; abort rather than
                // flag healthy versions as corrupted.
                Err(e) => {
                    error!(error = %e, "Object store stat failed; aborting DB-orphan pass");
                    return Ok(());
                }
            }
        }

        if report.mode == ScanMode::Fix {
            self.apply_fixes(report).await?;
        }

        report.db_pass_complete = true;
        Ok(())
    }

    /// Flag missing versions corrupted and repoint or degrade their files.
    async fn apply_fixes(&self, report: &mut ReconcileReport) -> AppResult<()> {
        let mut by_file: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for missing in &report.missing {
            by_file
                .entry(missing.file_id)
                .or_default()
                .push(missing.version_id);
        }

        for missing in &report.missing {
            self.version_repo.mark_corrupted(missing.version_id).await?;
            report.flagged_corrupted += 1;
        }

        for (file_id, corrupted_versions) in by_file {
            let file = match self.file_repo.find_by_id(file_id).await? {
                Some(file) => file,
                None => continue,
            };

            // Only files whose served version just went bad need repointing.
            let current_is_corrupted = file
                .current_version_id
                .map(|id| corrupted_versions.contains(&id))
                .unwrap_or(false);
            if !current_is_corrupted {
                continue;
            }

            match self.version_repo.find_latest_healthy_approved(file_id).await? {
                Some(fallback) => {
                    info!(
                        file_id = %file_id,
                        fallback_version = fallback.version_number,
                        "Repointing file to prior approved version"
                    );
                    self.file_repo
                        .repoint_current_version(file_id, Some(fallback.id), false)
                        .await?;
                    report.repointed_files += 1;
                }
                None => {
                    warn!(file_id = %file_id, "No healthy approved version; file degraded");
                    self.file_repo
                        .repoint_current_version(file_id, None, true)
                        .await?;
                    report.degraded_files += 1;
                }
            }
        }

        Ok(())
    }

    /// Report objects no version row claims. Never deletes.
    async fn object_orphan_pass(&self, report: &mut ReconcileReport) -> AppResult<()> {
        let known: HashSet<String> = self
            .version_repo
            .list_all_object_keys()
            .await?
            .into_iter()
            .collect();

        let listed = match self.store.list("").await {
            Ok(objects) => objects,
            Err(e) => {
                error!(error = %e, "Object store listing failed; aborting object-orphan pass");
                return Ok(());
            }
        };

        report.orphan_objects = orphan_keys(&known, &listed);
        report.object_pass_complete = true;
        Ok(())
    }
}

/// Keys present in the store but absent from the metadata.
fn orphan_keys(known: &HashSet<String>, listed: &[ObjectMeta]) -> Vec<String> {
    listed
        .iter()
        .filter(|meta| !known.contains(&meta.key))
        .map(|meta| meta.key.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::{
        MemoryAuditStore, MemoryFileStore, MemoryObjectStore, MemoryVersionStore, audit_trail,
        personal_file, version_row,
    };

    fn engine(
        files: Arc<MemoryFileStore>,
        versions: Arc<MemoryVersionStore>,
        store: Arc<MemoryObjectStore>,
    ) -> ReconciliationEngine {
        ReconciliationEngine::new(
            files,
            versions,
            store,
            audit_trail(Arc::new(MemoryAuditStore::default())),
        )
    }

    #[tokio::test]
    async fn test_fix_mode_repoints_file_with_missing_current_object() {
        let owner = Uuid::new_v4();
        let mut file = personal_file(owner, "docs/spec.md");
        let healthy = version_row(file.id, 1, "k/v1", Some("a"));
        let broken = version_row(file.id, 2, "k/v2", Some("b"));
        file.current_version_id = Some(broken.id);

        let files = MemoryFileStore::with(vec![file.clone()]);
        let versions = MemoryVersionStore::with(vec![healthy.clone(), broken.clone()]);
        versions.approve(healthy.id);
        // Only the older version's object survives.
        let store = MemoryObjectStore::with_keys(&["k/v1"]);
        let engine = engine(files.clone(), versions.clone(), store);

        let report = engine.scan(ScanMode::Fix).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].version_id, broken.id);
        assert_eq!(report.flagged_corrupted, 1);
        assert_eq!(report.repointed_files, 1);
        assert_eq!(report.degraded_files, 0);

        let fixed = files.get(file.id).unwrap();
        assert_eq!(fixed.current_version_id, Some(healthy.id));
        assert!(!fixed.degraded);
        assert!(versions.get(broken.id).unwrap().corrupted);
    }

    #[tokio::test]
    async fn test_fix_mode_is_idempotent() {
        let owner = Uuid::new_v4();
        let mut file = personal_file(owner, "docs/spec.md");
        let healthy = version_row(file.id, 1, "k/v1", Some("a"));
        let broken = version_row(file.id, 2, "k/v2", Some("b"));
        file.current_version_id = Some(broken.id);

        let files = MemoryFileStore::with(vec![file.clone()]);
        let versions = MemoryVersionStore::with(vec![healthy.clone(), broken]);
        versions.approve(healthy.id);
        let store = MemoryObjectStore::with_keys(&["k/v1"]);
        let engine = engine(files.clone(), versions.clone(), store);

        engine.scan(ScanMode::Fix).await.unwrap();
        let second = engine.scan(ScanMode::Fix).await.unwrap();

        // The corrupted version is out of scope now; nothing changes again.
        assert!(second.is_complete());
        assert!(second.missing.is_empty());
        assert_eq!(second.flagged_corrupted, 0);
        assert_eq!(second.repointed_files, 0);
        assert_eq!(files.get(file.id).unwrap().current_version_id, Some(healthy.id));
    }

    #[tokio::test]
    async fn test_fix_mode_degrades_file_without_fallback() {
        let owner = Uuid::new_v4();
        let mut file = personal_file(owner, "docs/spec.md");
        let broken = version_row(file.id, 1, "k/v1", Some("a"));
        file.current_version_id = Some(broken.id);

        let files = MemoryFileStore::with(vec![file.clone()]);
        let versions = MemoryVersionStore::with(vec![broken]);
        let store = MemoryObjectStore::with_keys(&[]);
        let engine = engine(files.clone(), versions, store);

        let report = engine.scan(ScanMode::Fix).await.unwrap();
        assert_eq!(report.degraded_files, 1);
        let degraded = files.get(file.id).unwrap();
        assert!(degraded.degraded);
        assert!(degraded.current_version_id.is_none());
    }

    fn meta(key: &str) -> ObjectMeta {
        ObjectMeta {
            key: key.to_string(),
            size: 1,
            mime_type: None,
            etag: None,
            last_modified: None,
        }
    }

    #[test]
    fn test_orphan_keys_reports_only_unclaimed() {
        let known: HashSet<String> = ["a/1", "a/2"].iter().map(|s| s.to_string()).collect();
        let listed = vec![meta("a/1"), meta("a/2"), meta("b/3")];
        assert_eq!(orphan_keys(&known, &listed), vec!["b/3".to_string()]);
    }

    #[test]
    fn test_orphan_keys_empty_store() {
        let known: HashSet<String> = ["a/1"].iter().map(|s| s.to_string()).collect();
        assert!(orphan_keys(&known, &[]).is_empty());
    }

    #[test]
    fn test_fresh_report_is_incomplete_until_both_passes_run() {
        let report = ReconcileReport::new(ScanMode::Report);
        assert!(!report.is_complete());
        assert!(!report.has_findings());
    }
}
