//! Lock manager — exclusive edit locks on files.

use std::sync::Arc;

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use depot_access::{AccessAction, AccessGate};
use depot_access::gate::AccessRequest;
use depot_core::config::workflow::WorkflowConfig;
use depot_core::error::AppError;
use depot_core::result::AppResult;
use depot_core::types::context::RequestContext;
use depot_database::repositories::{FileStore, LockStore};
use depot_entity::file::model::StorageFile;
use depot_entity::file::status::FileStatus;
use depot_entity::lock::model::{CreateFileLock, FileLock, LockStatus};

use crate::audit::AuditTrail;

/// Manages exclusive file locks.
///
/// Lock state lives entirely in the `file_locks` table; concurrency is
/// resolved by the database's unique constraint, and this service only
/// interprets the row counts.
#[derive(Debug, Clone)]
pub struct LockManager {
    file_repo: Arc<dyn FileStore>,
    lock_repo: Arc<dyn LockStore>,
    gate: Arc<AccessGate>,
    audit: AuditTrail,
    config: WorkflowConfig,
}

impl LockManager {
    /// Create a new lock manager.
    pub fn new(
        file_repo: Arc<dyn FileStore>,
        lock_repo: Arc<dyn LockStore>,
        gate: Arc<AccessGate>,
        audit: AuditTrail,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            file_repo,
            lock_repo,
            gate,
            audit,
            config,
        }
    }

    /// Acquire an exclusive lock on a file.
    ///
    /// Returns `LockConflict` carrying the current holder when the file is
    /// already locked.
    pub async fn acquire(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        reason: Option<String>,
    ) -> AppResult<FileLock> {
        let file = self.require_file(file_id).await?;
        self.gate
            .authorize(ctx, &write_request(&file, AccessAction::Write))
            .await?;

        let created = self
            .lock_repo
            .try_acquire(&CreateFileLock {
                file_id,
                locked_by: ctx.user_id,
                reason: reason.clone(),
                forced: false,
            })
            .await?;

        let lock = match created {
            Some(lock) => lock,
            None => {
                let holder = self.lock_repo.find_by_file(file_id).await?;
                return Err(lock_conflict_error(file_id, holder.as_ref()));
            }
        };

        info!(file_id = %file_id, user_id = %ctx.user_id, "Lock acquired");
        self.audit
            .record(
                ctx,
                "lock",
                file_id,
                "lock.acquire",
                Some(json!({ "reason": reason })),
            )
            .await;
        Ok(lock)
    }

    /// Release a lock held by the caller.
    ///
    /// Zero rows deleted means the caller does not hold the lock. A
    /// follow-up lookup distinguishes a lock held by someone else from a
    /// lock that is simply gone (never taken, or force-released).
    pub async fn release(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<()> {
        let file = self.require_file(file_id).await?;
        self.gate
            .authorize(ctx, &write_request(&file, AccessAction::Write))
            .await?;

        let released = self.lock_repo.release(file_id, ctx.user_id).await?;
        if !released {
            let holder = self.lock_repo.find_by_file(file_id).await?;
            return Err(release_refusal(file_id, holder.as_ref()));
        }

        info!(file_id = %file_id, user_id = %ctx.user_id, "Lock released");
        self.audit
            .record(ctx, "lock", file_id, "lock.release", None)
            .await;
        Ok(())
    }

    /// Forcibly release a lock regardless of holder. Administrative.
    ///
    /// The displaced holder is recorded in the audit details so the takeover
    /// is traceable after the lock row is gone. The displaced editor's draft
    /// copy survives by default; when `discard_draft_on_force_unlock` is set
    /// it is archived instead, so the uncommitted content stays recoverable
    /// but drops out of listings.
    pub async fn force_release(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<FileLock> {
        let file = self.require_file(file_id).await?;
        self.gate
            .authorize(ctx, &write_request(&file, AccessAction::Admin))
            .await?;

        let removed = self
            .lock_repo
            .force_release(file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("No lock exists on file {file_id}")))?;

        if self.config.discard_draft_on_force_unlock {
            if let Some(draft) = self.file_repo.find_draft_of(file_id).await? {
                self.file_repo
                    .set_status(draft.id, FileStatus::Archived)
                    .await?;
                info!(draft_id = %draft.id, file_id = %file_id, "Displaced draft archived");
                self.audit
                    .record(
                        ctx,
                        "file",
                        draft.id,
                        "file.draft_discarded",
                        Some(json!({ "source_file_id": file_id })),
                    )
                    .await;
            }
        }

        info!(
            file_id = %file_id,
            displaced = %removed.locked_by,
            user_id = %ctx.user_id,
            "Lock force-released"
        );
        self.audit
            .record(
                ctx,
                "lock",
                file_id,
                "lock.force_release",
                Some(json!({
                    "displaced_holder": removed.locked_by,
                    "locked_at": removed.locked_at,
                    "forced": true,
                })),
            )
            .await;
        Ok(removed)
    }

    /// List all held locks with their health.
    ///
    /// A lock is orphaned when no live draft copy references the locked
    /// file; the editing session that created it died without committing or
    /// releasing.
    pub async fn list(&self, _ctx: &RequestContext) -> AppResult<Vec<LockStatus>> {
        let locks = self.lock_repo.list_all().await?;
        let mut statuses = Vec::with_capacity(locks.len());

        for row in locks {
            let draft = self.file_repo.find_draft_of(row.lock.file_id).await?;
            statuses.push(LockStatus {
                orphaned: draft.is_none(),
                logical_path: row.logical_path,
                lock: row.lock,
            });
        }
        Ok(statuses)
    }

    async fn require_file(&self, file_id: Uuid) -> AppResult<StorageFile> {
        self.file_repo
            .find_by_id(file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }
}

fn write_request(file: &StorageFile, action: AccessAction) -> AccessRequest {
    AccessRequest {
        bucket_type: file.bucket_type,
        bucket_id: file.bucket_id,
        action,
        file_id: Some(file.id),
    }
}

/// Explain a failed release: not-owner when someone else holds the lock,
/// expired when no lock remains.
fn release_refusal(file_id: Uuid, holder: Option<&FileLock>) -> AppError {
    match holder {
        Some(lock) => AppError::access_denied(format!(
            "The lock on file {file_id} is held by {}, not the caller",
            lock.locked_by
        )),
        None => AppError::lock_expired(format!(
            "No lock exists on file {file_id}; it was never taken or was force-released"
        )),
    }
}

/// Build the conflict error reported when a file is already locked.
fn lock_conflict_error(file_id: Uuid, holder: Option<&FileLock>) -> AppError {
    match holder {
        Some(lock) => AppError::lock_conflict(format!(
            "File {file_id} is locked by {} since {}{}",
            lock.locked_by,
            lock.locked_at.to_rfc3339(),
            lock.reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default()
        )),
        // The competing lock was released between our insert and lookup.
        None => AppError::lock_conflict(format!("File {file_id} was locked concurrently")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use depot_core::error::ErrorKind;

    use crate::testing::{
        MemoryAuditStore, MemoryFileStore, MemoryLockStore, audit_trail, ctx, gate, lock_row,
        personal_file,
    };

    fn manager(
        file_store: Arc<MemoryFileStore>,
        lock_store: Arc<MemoryLockStore>,
        audit: Arc<MemoryAuditStore>,
    ) -> LockManager {
        LockManager::new(
            file_store,
            lock_store,
            gate(audit.clone()),
            audit_trail(audit),
            WorkflowConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_release_by_non_holder_reports_the_holder() {
        let ctx = ctx();
        let file = personal_file(ctx.user_id, "reports/q3.pdf");
        let other = Uuid::new_v4();
        let audit = Arc::new(MemoryAuditStore::default());
        let locks = MemoryLockStore::with(vec![lock_row(file.id, other)]);
        let manager = manager(MemoryFileStore::with(vec![file.clone()]), locks.clone(), audit);

        let err = manager.release(&ctx, file.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AccessDenied);
        assert!(err.message.contains(&other.to_string()));
        // The holder keeps the lock.
        assert_eq!(locks.holder_of(file.id), Some(other));
    }

    #[tokio::test]
    async fn test_release_after_force_release_reports_expired() {
        let ctx = ctx();
        let file = personal_file(ctx.user_id, "reports/q3.pdf");
        let audit = Arc::new(MemoryAuditStore::default());
        let manager = manager(
            MemoryFileStore::with(vec![file.clone()]),
            MemoryLockStore::with(Vec::new()),
            audit,
        );

        let err = manager.release(&ctx, file.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::LockExpired);
    }

    #[tokio::test]
    async fn test_release_by_holder_succeeds() {
        let ctx = ctx();
        let file = personal_file(ctx.user_id, "reports/q3.pdf");
        let audit = Arc::new(MemoryAuditStore::default());
        let locks = MemoryLockStore::with(vec![lock_row(file.id, ctx.user_id)]);
        let manager = manager(MemoryFileStore::with(vec![file.clone()]), locks.clone(), audit);

        manager.release(&ctx, file.id).await.unwrap();
        assert_eq!(locks.holder_of(file.id), None);
    }

    #[test]
    fn test_release_refusal_distinguishes_holder_from_absence() {
        let file_id = Uuid::new_v4();
        let holder = lock_row(file_id, Uuid::new_v4());

        let not_owner = release_refusal(file_id, Some(&holder));
        assert_eq!(not_owner.kind, ErrorKind::AccessDenied);
        assert!(not_owner.message.contains(&holder.locked_by.to_string()));

        let expired = release_refusal(file_id, None);
        assert_eq!(expired.kind, ErrorKind::LockExpired);
    }

    #[test]
    fn test_lock_conflict_error_names_holder() {
        let file_id = Uuid::new_v4();
        let holder = FileLock {
            id: Uuid::new_v4(),
            file_id,
            locked_by: Uuid::new_v4(),
            locked_at: Utc::now(),
            reason: Some("editing panel".to_string()),
            forced: false,
        };
        let err = lock_conflict_error(file_id, Some(&holder));
        assert_eq!(err.kind, ErrorKind::LockConflict);
        assert!(err.message.contains(&holder.locked_by.to_string()));
        assert!(err.message.contains("editing panel"));
    }

    #[test]
    fn test_lock_conflict_error_without_holder() {
        let err = lock_conflict_error(Uuid::new_v4(), None);
        assert_eq!(err.kind, ErrorKind::LockConflict);
    }
}
