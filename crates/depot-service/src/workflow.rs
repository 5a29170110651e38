//! Version workflow — copy-and-lock, commit, approve, reject, restore.
//!
//! Ordering discipline for every operation that touches both stores:
//! object-store writes happen before the database transaction, and metadata
//! rows are only committed once the bytes they reference exist. A failure
//! between the two leaves at worst an orphan object, which reconciliation
//! reports; it never leaves metadata pointing at nothing.

use std::sync::Arc;

use serde_json::json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use depot_access::gate::AccessRequest;
use depot_access::{AccessAction, AccessGate};
use depot_core::error::{AppError, ErrorKind};
use depot_core::result::AppResult;
use depot_core::traits::object_store::ObjectStore;
use depot_core::types::context::RequestContext;
use depot_database::repositories::{
    FileRepository, FileStore, LockRepository, LockStore, ValidationRepository, ValidationStore,
    VersionRepository, VersionStore,
};
use depot_entity::file::model::{CreateFile, StorageFile};
use depot_entity::file::status::{BucketType, FileStatus};
use depot_entity::file::version::{CreateFileVersion, FileVersion};
use depot_entity::lock::model::{CreateFileLock, FileLock};
use depot_entity::validation::model::{CreateValidation, Validation, ValidationState};
use depot_storage::keys;

use crate::audit::AuditTrail;

/// Where a checkout places its draft copy.
///
/// The destination bucket may differ from the source's; reading the
/// source and writing the destination are authorized independently.
#[derive(Debug, Clone)]
pub struct DraftDestination {
    /// Scope the draft is created in.
    pub bucket_type: BucketType,
    /// Owner of that scope.
    pub bucket_id: Uuid,
    /// Logical path of the draft within the destination bucket.
    pub logical_path: String,
}

/// Result of a copy-and-lock operation.
#[derive(Debug, Clone)]
pub struct CopyAndLockOutcome {
    /// The draft working copy.
    pub draft: StorageFile,
    /// The draft's initial version (the copied content).
    pub draft_version: FileVersion,
    /// The lock acquired on the source file.
    pub lock: FileLock,
}

/// Result of committing a draft back to its source.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    /// The source file, now pending validation.
    pub file: StorageFile,
    /// The newly recorded version.
    pub version: FileVersion,
    /// The validation opened for the new version.
    pub validation: Validation,
}

/// Result of recording an uploaded object against a file.
#[derive(Debug, Clone)]
pub struct RecordUploadOutcome {
    /// The file the upload was recorded against.
    pub file: StorageFile,
    /// The version row now holding the uploaded content.
    pub version: FileVersion,
    /// The validation opened for an initial upload; `None` for draft
    /// revisions, which are reviewed at commit time instead.
    pub validation: Option<Validation>,
}

/// Result of a review decision.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    /// The decided validation.
    pub validation: Validation,
    /// The reviewed file after the decision was applied.
    pub file: StorageFile,
}

/// Orchestrates the collaborative editing workflow.
#[derive(Debug, Clone)]
pub struct VersionWorkflow {
    pool: PgPool,
    file_repo: Arc<dyn FileStore>,
    version_repo: Arc<dyn VersionStore>,
    lock_repo: Arc<dyn LockStore>,
    validation_repo: Arc<dyn ValidationStore>,
    gate: Arc<AccessGate>,
    store: Arc<dyn ObjectStore>,
    audit: AuditTrail,
}

impl VersionWorkflow {
    /// Create a new version workflow service.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        file_repo: Arc<dyn FileStore>,
        version_repo: Arc<dyn VersionStore>,
        lock_repo: Arc<dyn LockStore>,
        validation_repo: Arc<dyn ValidationStore>,
        gate: Arc<AccessGate>,
        store: Arc<dyn ObjectStore>,
        audit: AuditTrail,
    ) -> Self {
        Self {
            pool,
            file_repo,
            version_repo,
            lock_repo,
            validation_repo,
            gate,
            store,
            audit,
        }
    }

    /// Check out a file for editing: copy its current content into a new
    /// draft file at the destination and lock the source, atomically.
    ///
    /// Reading the source bucket and writing the destination bucket are
    /// authorized separately; a cross-bucket checkout needs both.
    ///
    /// The object copy happens before the transaction. If the transaction
    /// fails, the copied object is orphaned and later reported by
    /// reconciliation; no metadata refers to it.
    pub async fn copy_and_lock(
        &self,
        ctx: &RequestContext,
        source_file_id: Uuid,
        dest: &DraftDestination,
        reason: Option<String>,
    ) -> AppResult<CopyAndLockOutcome> {
        let source = self.require_file(source_file_id).await?;
        self.gate
            .authorize(ctx, &access(&source, AccessAction::Read))
            .await?;
        self.gate
            .authorize(
                ctx,
                &AccessRequest {
                    bucket_type: dest.bucket_type,
                    bucket_id: dest.bucket_id,
                    action: AccessAction::Write,
                    file_id: None,
                },
            )
            .await?;

        // Fast-fail before copying any bytes.
        if let Some(holder) = self.lock_repo.find_by_file(source_file_id).await? {
            return Err(holder_conflict(source_file_id, &holder));
        }

        let source_version = self.require_current_version(&source).await?;

        let draft_key = keys::version_key(dest.bucket_type, dest.bucket_id, &dest.logical_path);
        self.store.copy(&source_version.object_key, &draft_key).await?;

        let mut tx = self.begin().await?;

        let draft = FileRepository::create_tx(
            &mut tx,
            &CreateFile {
                bucket_type: dest.bucket_type,
                bucket_id: dest.bucket_id,
                logical_path: dest.logical_path.clone(),
                filename: source.filename.clone(),
                owner_id: ctx.user_id,
                mime_type: source.mime_type.clone(),
                size: source_version.size,
                status: FileStatus::Draft,
                source_file_id: Some(source.id),
                tags: source.tags.clone(),
            },
        )
        .await?;

        let draft_version = VersionRepository::create_tx(
            &mut tx,
            &CreateFileVersion {
                file_id: draft.id,
                object_key: draft_key,
                size: source_version.size,
                mime_type: source_version.mime_type.clone(),
                checksum: source_version.checksum.clone(),
                changelog: Some(format!(
                    "Checked out from {} v{}",
                    source.logical_path, source_version.version_number
                )),
                tags: source.tags.clone(),
                created_by: ctx.user_id,
            },
        )
        .await?;

        let lock = LockRepository::try_acquire_tx(
            &mut tx,
            &CreateFileLock {
                file_id: source.id,
                locked_by: ctx.user_id,
                reason,
                forced: false,
            },
        )
        .await?;

        let lock = match lock {
            Some(lock) => lock,
            // Lost the race after the fast-fail check; roll everything back.
            None => {
                tx.rollback().await.map_err(tx_error)?;
                let holder = self.lock_repo.find_by_file(source_file_id).await?;
                return Err(match holder {
                    Some(h) => holder_conflict(source_file_id, &h),
                    None => AppError::lock_conflict(format!(
                        "File {source_file_id} was locked concurrently"
                    )),
                });
            }
        };

        tx.commit().await.map_err(tx_error)?;

        info!(
            source_file_id = %source.id,
            draft_id = %draft.id,
            user_id = %ctx.user_id,
            "File checked out for editing"
        );
        self.audit
            .record(
                ctx,
                "file",
                source.id,
                "file.copy_and_lock",
                Some(json!({
                    "draft_id": draft.id,
                    "dest_bucket_type": dest.bucket_type.as_str(),
                    "dest_bucket_id": dest.bucket_id,
                    "dest_path": dest.logical_path,
                    "baseline_version": source_version.version_number,
                })),
            )
            .await;

        Ok(CopyAndLockOutcome {
            draft,
            draft_version,
            lock,
        })
    }

    /// Record an uploaded object as a file's content.
    ///
    /// The caller obtains a presigned destination from the file service,
    /// uploads to it, then reports the key here. Nothing enters metadata
    /// until the object actually exists under that key.
    ///
    /// On a draft copy this appends a revision, picked up by the next
    /// commit. On a file awaiting its first upload this records version 1
    /// and opens a validation straight away.
    pub async fn record_upload(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        object_key: &str,
        checksum: Option<String>,
        changelog: Option<String>,
    ) -> AppResult<RecordUploadOutcome> {
        let file = self.require_file(file_id).await?;
        self.gate
            .authorize(ctx, &access(&file, AccessAction::Write))
            .await?;

        let meta = self.store.stat(object_key).await?.ok_or_else(|| {
            AppError::validation(format!("No uploaded object exists at '{object_key}'"))
        })?;

        match file.status {
            FileStatus::Draft => {
                if file.owner_id != ctx.user_id {
                    return Err(AppError::access_denied(
                        "Only the draft's owner can record uploads to it",
                    ));
                }

                let version = self
                    .version_repo
                    .create(&CreateFileVersion {
                        file_id: file.id,
                        object_key: object_key.to_string(),
                        size: meta.size as i64,
                        mime_type: meta.mime_type.clone().or_else(|| file.mime_type.clone()),
                        checksum,
                        changelog,
                        tags: file.tags.clone(),
                        created_by: ctx.user_id,
                    })
                    .await?;

                info!(
                    draft_id = %file.id,
                    version = version.version_number,
                    user_id = %ctx.user_id,
                    "Upload recorded as draft revision"
                );
                self.audit
                    .record(
                        ctx,
                        "file",
                        file.id,
                        "file.record_upload",
                        Some(json!({ "version_id": version.id, "object_key": object_key })),
                    )
                    .await;

                Ok(RecordUploadOutcome {
                    file,
                    version,
                    validation: None,
                })
            }
            FileStatus::UploadPending => {
                let mut tx = self.begin().await?;

                let version = VersionRepository::create_tx(
                    &mut tx,
                    &CreateFileVersion {
                        file_id: file.id,
                        object_key: object_key.to_string(),
                        size: meta.size as i64,
                        mime_type: meta.mime_type.clone().or_else(|| file.mime_type.clone()),
                        checksum,
                        changelog,
                        tags: file.tags.clone(),
                        created_by: ctx.user_id,
                    },
                )
                .await?;

                let file = FileRepository::set_status_tx(
                    &mut tx,
                    file.id,
                    file.status.transition_to(FileStatus::PendingValidation)?,
                )
                .await?;

                let validation = ValidationRepository::create_tx(
                    &mut tx,
                    &CreateValidation {
                        version_id: version.id,
                        requested_by: ctx.user_id,
                    },
                )
                .await?;

                tx.commit().await.map_err(tx_error)?;

                info!(
                    file_id = %file.id,
                    user_id = %ctx.user_id,
                    "Initial upload recorded, validation pending"
                );
                self.audit
                    .record(
                        ctx,
                        "file",
                        file.id,
                        "file.record_upload",
                        Some(json!({
                            "version_id": version.id,
                            "object_key": object_key,
                            "initial": true,
                        })),
                    )
                    .await;

                Ok(RecordUploadOutcome {
                    file,
                    version,
                    validation: Some(validation),
                })
            }
            _ => Err(AppError::validation(format!(
                "File {file_id} is not awaiting an upload; check it out and commit instead"
            ))),
        }
    }

    /// Commit a draft's content back to its source file as a new version
    /// pending validation.
    ///
    /// The lock is consumed inside the same transaction as the version
    /// insert; a vanished lock rolls everything back. The served version is
    /// not advanced here; that only happens on approval.
    pub async fn commit(
        &self,
        ctx: &RequestContext,
        draft_id: Uuid,
        changelog: Option<String>,
    ) -> AppResult<CommitOutcome> {
        let draft = self.require_file(draft_id).await?;
        if !draft.is_draft_copy() {
            return Err(AppError::validation(format!(
                "File {draft_id} is not a draft copy"
            )));
        }
        if draft.owner_id != ctx.user_id {
            return Err(AppError::access_denied(
                "Only the draft's owner can commit it",
            ));
        }

        // is_draft_copy guarantees the source reference exists.
        let source_id = draft
            .source_file_id
            .ok_or_else(|| AppError::internal("Draft copy lost its source reference"))?;
        let source = self.require_file(source_id).await?;
        self.gate
            .authorize(ctx, &access(&source, AccessAction::Write))
            .await?;

        // The committer must still hold the edit lock. The authoritative
        // check is the conditional delete inside the transaction below;
        // this one fails fast before any bytes are copied.
        match self.lock_repo.find_by_file(source.id).await? {
            Some(lock) if lock.is_held_by(ctx.user_id) => {}
            _ => {
                return Err(AppError::lock_expired(
                    "The edit lock was released or taken over; commit aborted",
                ));
            }
        }

        let draft_versions = self.version_repo.list_by_file(draft.id).await?;
        let edited = draft_versions
            .first()
            .ok_or_else(|| AppError::internal(format!("Draft {draft_id} has no versions")))?;
        let baseline = draft_versions
            .last()
            .ok_or_else(|| AppError::internal(format!("Draft {draft_id} has no versions")))?;

        // The baseline is the checksum captured at checkout time. If the
        // source's served version changed since, someone else's commit was
        // approved in the meantime.
        let source_current = self.require_current_version(&source).await?;
        if baseline_drifted(
            baseline.checksum.as_deref(),
            source_current.checksum.as_deref(),
        ) {
            return Err(AppError::version_conflict(
                "Source file modified during edit",
            ));
        }

        let committed_key =
            keys::version_key(source.bucket_type, source.bucket_id, &source.logical_path);
        self.store.copy(&edited.object_key, &committed_key).await?;

        let mut tx = self.begin().await?;

        let released = LockRepository::release_tx(&mut tx, source.id, ctx.user_id).await?;
        if !released {
            tx.rollback().await.map_err(tx_error)?;
            return Err(AppError::lock_expired(
                "The edit lock was released or taken over; commit aborted",
            ));
        }

        let version = VersionRepository::create_tx(
            &mut tx,
            &CreateFileVersion {
                file_id: source.id,
                object_key: committed_key,
                size: edited.size,
                mime_type: edited.mime_type.clone(),
                checksum: edited.checksum.clone(),
                changelog,
                tags: draft.tags.clone(),
                created_by: ctx.user_id,
            },
        )
        .await?;

        let file = FileRepository::set_status_tx(
            &mut tx,
            source.id,
            source.status.transition_to(FileStatus::PendingValidation)?,
        )
        .await?;

        // The draft served its purpose; keep it out of listings.
        FileRepository::set_status_tx(&mut tx, draft.id, FileStatus::Archived).await?;

        let validation = ValidationRepository::create_tx(
            &mut tx,
            &CreateValidation {
                version_id: version.id,
                requested_by: ctx.user_id,
            },
        )
        .await?;

        tx.commit().await.map_err(tx_error)?;

        info!(
            file_id = %source.id,
            version = version.version_number,
            user_id = %ctx.user_id,
            "Draft committed, validation pending"
        );
        self.audit
            .record(
                ctx,
                "file",
                source.id,
                "file.commit",
                Some(json!({
                    "draft_id": draft.id,
                    "version_id": version.id,
                    "version_number": version.version_number,
                })),
            )
            .await;

        Ok(CommitOutcome {
            file,
            version,
            validation,
        })
    }

    /// Approve a pending validation, making its version the served one.
    pub async fn approve(
        &self,
        ctx: &RequestContext,
        validation_id: Uuid,
        comment: Option<String>,
    ) -> AppResult<ReviewOutcome> {
        let (validation, version, file) = self.load_review_target(validation_id).await?;
        ensure_not_self_review(ctx.user_id, version.created_by)?;
        self.gate
            .authorize(ctx, &access(&file, AccessAction::Review))
            .await?;

        let mut tx = self.begin().await?;

        let decided = ValidationRepository::decide_tx(
            &mut tx,
            validation.id,
            ValidationState::Approved,
            ctx.user_id,
            ctx.request_time,
            comment.as_deref(),
            None,
        )
        .await?
        .ok_or_else(|| AppError::validation_conflict("Validation was already decided"))?;

        let file = FileRepository::promote_version_tx(
            &mut tx,
            file.id,
            file.status.transition_to(FileStatus::Approved)?,
            version.id,
            version.size,
        )
        .await?;

        tx.commit().await.map_err(tx_error)?;

        info!(
            file_id = %file.id,
            version = version.version_number,
            reviewer = %ctx.user_id,
            "Version approved"
        );
        self.audit
            .record(
                ctx,
                "validation",
                decided.id,
                "validation.approve",
                Some(json!({
                    "file_id": file.id,
                    "version_id": version.id,
                    "comment": comment,
                })),
            )
            .await;

        Ok(ReviewOutcome {
            validation: decided,
            file,
        })
    }

    /// Reject a pending validation.
    ///
    /// With `require_new_version` the file is sent back for revision;
    /// without it the file returns to its previously approved content. The
    /// served version is never changed by a rejection.
    pub async fn reject(
        &self,
        ctx: &RequestContext,
        validation_id: Uuid,
        comment: Option<String>,
        require_new_version: bool,
    ) -> AppResult<ReviewOutcome> {
        let (validation, version, file) = self.load_review_target(validation_id).await?;
        ensure_not_self_review(ctx.user_id, version.created_by)?;
        self.gate
            .authorize(ctx, &access(&file, AccessAction::Review))
            .await?;

        let target = if require_new_version {
            FileStatus::RequiresRevision
        } else {
            FileStatus::Approved
        };

        let mut tx = self.begin().await?;

        let decided = ValidationRepository::decide_tx(
            &mut tx,
            validation.id,
            ValidationState::Rejected,
            ctx.user_id,
            ctx.request_time,
            comment.as_deref(),
            Some(require_new_version),
        )
        .await?
        .ok_or_else(|| AppError::validation_conflict("Validation was already decided"))?;

        let file =
            FileRepository::set_status_tx(&mut tx, file.id, file.status.transition_to(target)?)
                .await?;

        tx.commit().await.map_err(tx_error)?;

        info!(
            file_id = %file.id,
            version = version.version_number,
            reviewer = %ctx.user_id,
            require_new_version,
            "Version rejected"
        );
        self.audit
            .record(
                ctx,
                "validation",
                decided.id,
                "validation.reject",
                Some(json!({
                    "file_id": file.id,
                    "version_id": version.id,
                    "comment": comment,
                    "require_new_version": require_new_version,
                })),
            )
            .await;

        Ok(ReviewOutcome {
            validation: decided,
            file,
        })
    }

    /// Restore an older version by recording it as a new version pending
    /// validation. History is never rewritten; the restored row is read,
    /// its object copied, and a fresh max+1 version appended.
    pub async fn restore(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        version_number: i32,
        changelog: Option<String>,
    ) -> AppResult<CommitOutcome> {
        let file = self.require_file(file_id).await?;
        self.gate
            .authorize(ctx, &access(&file, AccessAction::Write))
            .await?;
        // A restore mid-edit would invalidate the lock holder's baseline.
        if let Some(lock) = self.lock_repo.find_by_file(file_id).await? {
            return Err(holder_conflict(file_id, &lock));
        }

        let old = self
            .version_repo
            .find_by_number(file_id, version_number)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("File {file_id} has no version {version_number}"))
            })?;
        if old.corrupted {
            return Err(AppError::corrupted(format!(
                "Version {version_number} of file {file_id} is corrupted and cannot be restored"
            )));
        }

        let restored_key =
            keys::version_key(file.bucket_type, file.bucket_id, &file.logical_path);
        self.store.copy(&old.object_key, &restored_key).await?;

        let mut tx = self.begin().await?;

        let version = VersionRepository::create_tx(
            &mut tx,
            &CreateFileVersion {
                file_id,
                object_key: restored_key,
                size: old.size,
                mime_type: old.mime_type.clone(),
                checksum: old.checksum.clone(),
                changelog: changelog
                    .or_else(|| Some(format!("Restored from version {version_number}"))),
                tags: old.tags.clone(),
                created_by: ctx.user_id,
            },
        )
        .await?;

        let file = FileRepository::set_status_tx(
            &mut tx,
            file_id,
            file.status.transition_to(FileStatus::PendingValidation)?,
        )
        .await?;

        let validation = ValidationRepository::create_tx(
            &mut tx,
            &CreateValidation {
                version_id: version.id,
                requested_by: ctx.user_id,
            },
        )
        .await?;

        tx.commit().await.map_err(tx_error)?;

        info!(
            file_id = %file_id,
            restored_from = version_number,
            new_version = version.version_number,
            user_id = %ctx.user_id,
            "Version restored"
        );
        self.audit
            .record(
                ctx,
                "file",
                file_id,
                "file.restore",
                Some(json!({
                    "restored_from": version_number,
                    "new_version_id": version.id,
                })),
            )
            .await;

        Ok(CommitOutcome {
            file,
            version,
            validation,
        })
    }

    async fn load_review_target(
        &self,
        validation_id: Uuid,
    ) -> AppResult<(Validation, FileVersion, StorageFile)> {
        let validation = self
            .validation_repo
            .find_by_id(validation_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Validation {validation_id} not found"))
            })?;
        if validation.state.is_decided() {
            return Err(AppError::validation_conflict(
                "Validation was already decided",
            ));
        }

        let version = self
            .version_repo
            .find_by_id(validation.version_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Version {} not found", validation.version_id))
            })?;
        let file = self.require_file(version.file_id).await?;
        Ok((validation, version, file))
    }

    async fn require_file(&self, file_id: Uuid) -> AppResult<StorageFile> {
        self.file_repo
            .find_by_id(file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }

    async fn require_current_version(&self, file: &StorageFile) -> AppResult<FileVersion> {
        let version_id = file.current_version_id.ok_or_else(|| {
            AppError::conflict(format!(
                "File {} has no approved content to work from",
                file.id
            ))
        })?;
        self.version_repo
            .find_by_id(version_id)
            .await?
            .ok_or_else(|| {
                AppError::internal(format!(
                    "File {} references missing version {version_id}",
                    file.id
                ))
            })
    }

    async fn begin(&self) -> AppResult<sqlx::Transaction<'_, sqlx::Postgres>> {
        self.pool.begin().await.map_err(tx_error)
    }
}

fn access(file: &StorageFile, action: AccessAction) -> AccessRequest {
    AccessRequest {
        bucket_type: file.bucket_type,
        bucket_id: file.bucket_id,
        action,
        file_id: Some(file.id),
    }
}

fn holder_conflict(file_id: Uuid, holder: &FileLock) -> AppError {
    AppError::lock_conflict(format!(
        "File {file_id} is locked by {} since {}",
        holder.locked_by,
        holder.locked_at.to_rfc3339()
    ))
}

fn tx_error(e: sqlx::Error) -> AppError {
    AppError::with_source(ErrorKind::Database, "Transaction failed", e)
}

/// Whether the source drifted away from the checkout baseline.
///
/// Drift is only detectable when both checksums were recorded; a missing
/// checksum on either side cannot prove a change and does not block the
/// commit.
fn baseline_drifted(baseline: Option<&str>, source_current: Option<&str>) -> bool {
    matches!((baseline, source_current), (Some(b), Some(s)) if b != s)
}

/// A reviewer may not decide on a version they created themselves.
fn ensure_not_self_review(reviewer: Uuid, created_by: Uuid) -> AppResult<()> {
    if reviewer == created_by {
        Err(AppError::access_denied(
            "A version cannot be reviewed by its author",
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use depot_core::error::ErrorKind;

    use crate::testing::{
        MemoryAuditStore, MemoryFileStore, MemoryLockStore, MemoryObjectStore,
        MemoryValidationStore, MemoryVersionStore, audit_trail, ctx, gate, lazy_pool, lock_row,
        personal_file, version_row,
    };

    fn workflow(
        files: Arc<MemoryFileStore>,
        versions: Arc<MemoryVersionStore>,
        locks: Arc<MemoryLockStore>,
        store: Arc<MemoryObjectStore>,
        audit: Arc<MemoryAuditStore>,
    ) -> VersionWorkflow {
        VersionWorkflow::new(
            lazy_pool(),
            files,
            versions,
            locks,
            Arc::new(MemoryValidationStore::default()),
            gate(audit.clone()),
            store,
            audit_trail(audit),
        )
    }

    fn draft_of(source: &StorageFile, owner: Uuid, path: &str) -> StorageFile {
        let mut draft = personal_file(owner, path);
        draft.status = FileStatus::Draft;
        draft.source_file_id = Some(source.id);
        draft
    }

    #[tokio::test]
    async fn test_checkout_requires_write_on_destination_bucket() {
        let ctx = ctx();
        let mut source = personal_file(ctx.user_id, "docs/spec.md");
        source.bucket_type = BucketType::Organizational;
        source.bucket_id = ctx.org_id;

        let audit = Arc::new(MemoryAuditStore::default());
        let wf = workflow(
            MemoryFileStore::with(vec![source.clone()]),
            MemoryVersionStore::with(Vec::new()),
            MemoryLockStore::with(Vec::new()),
            MemoryObjectStore::with_keys(&[]),
            audit.clone(),
        );

        // Readable source, but the destination belongs to someone else.
        let dest = DraftDestination {
            bucket_type: BucketType::Personal,
            bucket_id: Uuid::new_v4(),
            logical_path: "drafts/spec.md".to_string(),
        };
        let err = wf.copy_and_lock(&ctx, source.id, &dest, None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AccessDenied);
        assert!(audit.actions().contains(&"access.denied".to_string()));
    }

    #[tokio::test]
    async fn test_checkout_proceeds_past_gates_with_destination_write() {
        let ctx = ctx();
        let mut source = personal_file(ctx.user_id, "docs/spec.md");
        source.bucket_type = BucketType::Organizational;
        source.bucket_id = ctx.org_id;
        let other = Uuid::new_v4();

        let audit = Arc::new(MemoryAuditStore::default());
        let wf = workflow(
            MemoryFileStore::with(vec![source.clone()]),
            MemoryVersionStore::with(Vec::new()),
            MemoryLockStore::with(vec![lock_row(source.id, other)]),
            MemoryObjectStore::with_keys(&[]),
            audit,
        );

        // Destination is the caller's own bucket, so both gates pass and
        // the existing lock is what stops the checkout.
        let dest = DraftDestination {
            bucket_type: BucketType::Personal,
            bucket_id: ctx.user_id,
            logical_path: "drafts/spec.md".to_string(),
        };
        let err = wf.copy_and_lock(&ctx, source.id, &dest, None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::LockConflict);
        assert!(err.message.contains(&other.to_string()));
    }

    #[tokio::test]
    async fn test_commit_after_force_release_is_rejected() {
        let ctx = ctx();
        let mut source = personal_file(ctx.user_id, "docs/spec.md");
        let current = version_row(source.id, 1, "k/source-1", Some("a"));
        source.current_version_id = Some(current.id);
        let draft = draft_of(&source, ctx.user_id, "drafts/spec.md");
        let baseline = version_row(draft.id, 1, "k/draft-1", Some("a"));

        let wf = workflow(
            MemoryFileStore::with(vec![source.clone(), draft.clone()]),
            MemoryVersionStore::with(vec![current, baseline]),
            // The operator force-released the lock mid-edit.
            MemoryLockStore::with(Vec::new()),
            MemoryObjectStore::with_keys(&["k/source-1", "k/draft-1"]),
            Arc::new(MemoryAuditStore::default()),
        );

        let err = wf.commit(&ctx, draft.id, None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::LockExpired);
    }

    #[tokio::test]
    async fn test_commit_rejected_when_lock_was_taken_over() {
        let ctx = ctx();
        let mut source = personal_file(ctx.user_id, "docs/spec.md");
        let current = version_row(source.id, 1, "k/source-1", Some("a"));
        source.current_version_id = Some(current.id);
        let draft = draft_of(&source, ctx.user_id, "drafts/spec.md");
        let baseline = version_row(draft.id, 1, "k/draft-1", Some("a"));

        let wf = workflow(
            MemoryFileStore::with(vec![source.clone(), draft.clone()]),
            MemoryVersionStore::with(vec![current, baseline]),
            MemoryLockStore::with(vec![lock_row(source.id, Uuid::new_v4())]),
            MemoryObjectStore::with_keys(&["k/source-1", "k/draft-1"]),
            Arc::new(MemoryAuditStore::default()),
        );

        let err = wf.commit(&ctx, draft.id, None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::LockExpired);
    }

    #[tokio::test]
    async fn test_commit_rejects_source_that_moved_on() {
        let ctx = ctx();
        let mut source = personal_file(ctx.user_id, "docs/spec.md");
        // Someone else's commit was approved after this checkout.
        let current = version_row(source.id, 2, "k/source-2", Some("b"));
        source.current_version_id = Some(current.id);
        let draft = draft_of(&source, ctx.user_id, "drafts/spec.md");
        let baseline = version_row(draft.id, 1, "k/draft-1", Some("a"));

        let wf = workflow(
            MemoryFileStore::with(vec![source.clone(), draft.clone()]),
            MemoryVersionStore::with(vec![current, baseline]),
            MemoryLockStore::with(vec![lock_row(source.id, ctx.user_id)]),
            MemoryObjectStore::with_keys(&["k/source-2", "k/draft-1"]),
            Arc::new(MemoryAuditStore::default()),
        );

        let err = wf.commit(&ctx, draft.id, None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::VersionConflict);
    }

    #[tokio::test]
    async fn test_restore_blocked_while_locked() {
        let ctx = ctx();
        let file = personal_file(ctx.user_id, "docs/spec.md");
        let holder = Uuid::new_v4();

        let wf = workflow(
            MemoryFileStore::with(vec![file.clone()]),
            MemoryVersionStore::with(Vec::new()),
            MemoryLockStore::with(vec![lock_row(file.id, holder)]),
            MemoryObjectStore::with_keys(&[]),
            Arc::new(MemoryAuditStore::default()),
        );

        let err = wf.restore(&ctx, file.id, 1, None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::LockConflict);
        assert!(err.message.contains(&holder.to_string()));
    }

    #[tokio::test]
    async fn test_record_upload_requires_uploaded_object() {
        let ctx = ctx();
        let source = personal_file(ctx.user_id, "docs/spec.md");
        let draft = draft_of(&source, ctx.user_id, "drafts/spec.md");

        let wf = workflow(
            MemoryFileStore::with(vec![draft.clone()]),
            MemoryVersionStore::with(Vec::new()),
            MemoryLockStore::with(Vec::new()),
            MemoryObjectStore::with_keys(&[]),
            Arc::new(MemoryAuditStore::default()),
        );

        let err = wf
            .record_upload(&ctx, draft.id, "k/never-uploaded", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_record_upload_appends_draft_revision() {
        let ctx = ctx();
        let source = personal_file(ctx.user_id, "docs/spec.md");
        let draft = draft_of(&source, ctx.user_id, "drafts/spec.md");
        let baseline = version_row(draft.id, 1, "k/draft-1", Some("a"));
        let versions = MemoryVersionStore::with(vec![baseline]);

        let wf = workflow(
            MemoryFileStore::with(vec![draft.clone()]),
            versions.clone(),
            MemoryLockStore::with(Vec::new()),
            MemoryObjectStore::with_keys(&["k/draft-edit"]),
            Arc::new(MemoryAuditStore::default()),
        );

        let outcome = wf
            .record_upload(&ctx, draft.id, "k/draft-edit", Some("e".to_string()), None)
            .await
            .unwrap();
        assert_eq!(outcome.version.version_number, 2);
        assert_eq!(outcome.version.object_key, "k/draft-edit");
        assert_eq!(outcome.version.checksum.as_deref(), Some("e"));
        assert!(outcome.validation.is_none());
        assert_eq!(versions.count_for(draft.id), 2);
    }

    #[tokio::test]
    async fn test_record_upload_rejects_settled_file() {
        let ctx = ctx();
        let file = personal_file(ctx.user_id, "docs/spec.md");

        let wf = workflow(
            MemoryFileStore::with(vec![file.clone()]),
            MemoryVersionStore::with(Vec::new()),
            MemoryLockStore::with(Vec::new()),
            MemoryObjectStore::with_keys(&["k/loose"]),
            Arc::new(MemoryAuditStore::default()),
        );

        // Approved content only changes through checkout and commit.
        let err = wf
            .record_upload(&ctx, file.id, "k/loose", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_self_review_is_rejected() {
        let author = Uuid::new_v4();
        assert!(ensure_not_self_review(author, author).is_err());
        assert!(ensure_not_self_review(Uuid::new_v4(), author).is_ok());
    }

    #[test]
    fn test_baseline_drift_requires_both_checksums() {
        assert!(baseline_drifted(Some("abc"), Some("def")));
        assert!(!baseline_drifted(Some("abc"), Some("abc")));
        assert!(!baseline_drifted(None, Some("abc")));
        assert!(!baseline_drifted(Some("abc"), None));
        assert!(!baseline_drifted(None, None));
    }

    #[test]
    fn test_reject_targets_depend_on_revision_flag() {
        // Mirrors the status choice made in reject().
        let with_revision = FileStatus::PendingValidation
            .transition_to(FileStatus::RequiresRevision)
            .unwrap();
        assert_eq!(with_revision, FileStatus::RequiresRevision);

        let without_revision = FileStatus::PendingValidation
            .transition_to(FileStatus::Approved)
            .unwrap();
        assert_eq!(without_revision, FileStatus::Approved);
    }
}
