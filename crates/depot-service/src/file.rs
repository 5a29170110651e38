//! File service — info, metadata, deletion, and transfer URLs.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use depot_access::gate::AccessRequest;
use depot_access::{AccessAction, AccessGate};
use depot_core::config::object_store::ObjectStoreConfig;
use depot_core::error::{AppError, ErrorKind};
use depot_core::result::AppResult;
use depot_core::traits::object_store::ObjectStore;
use depot_core::types::context::RequestContext;
use depot_core::types::pagination::{PageRequest, PageResponse};
use depot_database::repositories::{
    FileRepository, FileStore, LockStore, ValidationStore, VersionRepository, VersionStore,
};
use depot_entity::file::model::{CreateFile, StorageFile, UpdateFileMetadata};
use depot_entity::file::status::{BucketType, FileStatus};
use depot_entity::file::version::FileVersion;
use depot_entity::lock::model::FileLock;

use crate::audit::AuditTrail;

/// A file with its surrounding state, as returned by `info`.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    /// The file row.
    pub file: StorageFile,
    /// The currently served version, when one exists.
    pub current_version: Option<FileVersion>,
    /// The lock on the file, when held.
    pub lock: Option<FileLock>,
}

/// Data for registering a brand-new file.
#[derive(Debug, Clone)]
pub struct CreateFileRequest {
    /// Scope the file belongs to.
    pub bucket_type: BucketType,
    /// Owner of the scope.
    pub bucket_id: Uuid,
    /// Logical path within the bucket.
    pub logical_path: String,
    /// Display file name.
    pub filename: String,
    /// MIME type, if known up front.
    pub mime_type: Option<String>,
    /// Free-form tags.
    pub tags: Option<serde_json::Value>,
}

/// A registered file together with its upload destination.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedUpload {
    /// The file row, awaiting its first upload.
    pub file: StorageFile,
    /// Object key the content must be uploaded under.
    pub object_key: String,
    /// Presigned URL for the upload.
    pub upload_url: String,
}

/// File-level operations outside the editing workflow.
#[derive(Debug, Clone)]
pub struct FileService {
    pool: PgPool,
    file_repo: Arc<dyn FileStore>,
    version_repo: Arc<dyn VersionStore>,
    lock_repo: Arc<dyn LockStore>,
    validation_repo: Arc<dyn ValidationStore>,
    gate: Arc<AccessGate>,
    store: Arc<dyn ObjectStore>,
    audit: AuditTrail,
    presign_expiry: Duration,
}

impl FileService {
    /// Create a new file service.
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
        config: &ObjectStoreConfig,
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
            presign_expiry: Duration::from_secs(config.presign_expiry_seconds),
        }
    }

    /// Register a brand-new file and issue its first upload destination.
    ///
    /// The row is created in `UploadPending` status with no versions; it
    /// carries no content until the caller uploads to the returned URL and
    /// records the key through the workflow, which creates version 1 and
    /// opens a validation.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        request: &CreateFileRequest,
    ) -> AppResult<CreatedUpload> {
        self.gate
            .authorize(
                ctx,
                &AccessRequest {
                    bucket_type: request.bucket_type,
                    bucket_id: request.bucket_id,
                    action: AccessAction::Write,
                    file_id: None,
                },
            )
            .await?;

        let file = self
            .file_repo
            .create(&CreateFile {
                bucket_type: request.bucket_type,
                bucket_id: request.bucket_id,
                logical_path: request.logical_path.clone(),
                filename: request.filename.clone(),
                owner_id: ctx.user_id,
                mime_type: request.mime_type.clone(),
                size: 0,
                status: FileStatus::UploadPending,
                source_file_id: None,
                tags: request.tags.clone(),
            })
            .await?;

        let object_key = depot_storage::keys::version_key(
            file.bucket_type,
            file.bucket_id,
            &file.logical_path,
        );
        let upload_url = self.store.presign_put(&object_key, self.presign_expiry).await?;

        info!(file_id = %file.id, path = %file.logical_path, user_id = %ctx.user_id, "File registered");
        self.audit
            .record(
                ctx,
                "file",
                file.id,
                "file.create",
                Some(json!({
                    "logical_path": file.logical_path,
                    "object_key": object_key,
                })),
            )
            .await;

        Ok(CreatedUpload {
            file,
            object_key,
            upload_url,
        })
    }

    /// Fetch a file with its current version and lock state.
    pub async fn info(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<FileInfo> {
        let file = self.require_file(file_id).await?;
        self.gate
            .authorize(ctx, &access(&file, AccessAction::Read))
            .await?;

        let current_version = match file.current_version_id {
            Some(version_id) => self.version_repo.find_by_id(version_id).await?,
            None => None,
        };
        let lock = self.lock_repo.find_by_file(file_id).await?;

        Ok(FileInfo {
            file,
            current_version,
            lock,
        })
    }

    /// List visible files in a bucket.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        bucket_type: BucketType,
        bucket_id: Uuid,
        page: &PageRequest,
    ) -> AppResult<PageResponse<StorageFile>> {
        self.gate
            .authorize(
                ctx,
                &AccessRequest {
                    bucket_type,
                    bucket_id,
                    action: AccessAction::Read,
                    file_id: None,
                },
            )
            .await?;
        self.file_repo.list_by_bucket(bucket_type, bucket_id, page).await
    }

    /// List a file's versions, newest first.
    pub async fn list_versions(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
    ) -> AppResult<Vec<FileVersion>> {
        let file = self.require_file(file_id).await?;
        self.gate
            .authorize(ctx, &access(&file, AccessAction::Read))
            .await?;
        self.version_repo.list_by_file(file_id).await
    }

    /// List a version's review history, newest first.
    pub async fn list_validations(
        &self,
        ctx: &RequestContext,
        version_id: Uuid,
    ) -> AppResult<Vec<depot_entity::validation::model::Validation>> {
        let version = self
            .version_repo
            .find_by_id(version_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Version {version_id} not found")))?;
        let file = self.require_file(version.file_id).await?;
        self.gate
            .authorize(ctx, &access(&file, AccessAction::Read))
            .await?;
        self.validation_repo.list_by_version(version_id).await
    }

    /// Update a file's mutable metadata.
    pub async fn update_metadata(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        update: &UpdateFileMetadata,
    ) -> AppResult<StorageFile> {
        let file = self.require_file(file_id).await?;
        self.gate
            .authorize(ctx, &access(&file, AccessAction::Write))
            .await?;

        let updated = self.file_repo.update_metadata(file_id, update).await?;
        self.audit
            .record(
                ctx,
                "file",
                file_id,
                "file.update_metadata",
                Some(json!({
                    "filename": update.filename,
                    "tags": update.tags,
                })),
            )
            .await;
        Ok(updated)
    }

    /// Soft-delete a file: archive it, keeping all metadata and objects.
    pub async fn soft_delete(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<StorageFile> {
        let file = self.require_file(file_id).await?;
        self.gate
            .authorize(ctx, &access(&file, AccessAction::Write))
            .await?;
        if let Some(lock) = self.lock_repo.find_by_file(file_id).await? {
            return Err(AppError::lock_conflict(format!(
                "File {file_id} is locked by {} and cannot be deleted",
                lock.locked_by
            )));
        }

        let archived = self
            .file_repo
            .set_status(file_id, file.status.transition_to(FileStatus::Archived)?)
            .await?;

        info!(file_id = %file_id, user_id = %ctx.user_id, "File archived");
        self.audit
            .record(ctx, "file", file_id, "file.soft_delete", None)
            .await;
        Ok(archived)
    }

    /// Physically delete a file: all metadata rows first, in one
    /// transaction, then the backing objects.
    ///
    /// Object deletions happen only after the transaction commits, so a
    /// crash can orphan objects (reconciliation reports them) but can never
    /// leave version rows pointing at deleted content. Returns the number
    /// of versions removed.
    pub async fn physical_delete(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<usize> {
        let file = self.require_file(file_id).await?;
        self.gate
            .authorize(ctx, &access(&file, AccessAction::Admin))
            .await?;
        if let Some(lock) = self.lock_repo.find_by_file(file_id).await? {
            return Err(AppError::lock_conflict(format!(
                "File {file_id} is locked by {} and cannot be deleted",
                lock.locked_by
            )));
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Transaction failed", e)
        })?;
        let object_keys = VersionRepository::delete_by_file_tx(&mut tx, file_id).await?;
        FileRepository::delete_tx(&mut tx, file_id).await?;
        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Transaction failed", e)
        })?;

        let deleted_versions = object_keys.len();
        for key in &object_keys {
            if let Err(e) = self.store.delete(key).await {
                warn!(key, error = %e, "Failed to delete object; left for reconciliation");
            }
        }

        info!(
            file_id = %file_id,
            versions = deleted_versions,
            user_id = %ctx.user_id,
            "File physically deleted"
        );
        self.audit
            .record(
                ctx,
                "file",
                file_id,
                "file.physical_delete",
                Some(json!({ "deleted_versions": deleted_versions })),
            )
            .await;
        Ok(deleted_versions)
    }

    /// Issue a presigned download URL for a version's content.
    ///
    /// When the backing object is missing the version is flagged corrupted
    /// on the spot and the caller gets a not-found error instead of a URL
    /// that would 404 later.
    pub async fn download_url(
        &self,
        ctx: &RequestContext,
        version_id: Uuid,
    ) -> AppResult<String> {
        let version = self
            .version_repo
            .find_by_id(version_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Version {version_id} not found")))?;
        let file = self.require_file(version.file_id).await?;
        self.gate
            .authorize(ctx, &access(&file, AccessAction::Read))
            .await?;

        if version.corrupted {
            return Err(AppError::corrupted(format!(
                "Version {version_id} is corrupted"
            )));
        }

        if self.store.stat(&version.object_key).await?.is_none() {
            warn!(
                version_id = %version_id,
                key = %version.object_key,
                "Version object missing; flagging corrupted"
            );
            self.version_repo.mark_corrupted(version_id).await?;
            self.audit
                .record(
                    ctx,
                    "version",
                    version_id,
                    "version.corrupted_on_read",
                    Some(json!({ "object_key": version.object_key })),
                )
                .await;
            return Err(AppError::not_found(format!(
                "Content of version {version_id} is missing from the object store"
            )));
        }

        self.store
            .presign_get(&version.object_key, self.presign_expiry)
            .await
    }

    /// Issue a presigned upload URL targeting a fresh key for a file.
    ///
    /// The caller uploads to the returned URL and then reports the key
    /// through the workflow's record-upload operation; nothing is recorded
    /// in metadata until then.
    pub async fn upload_url(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
    ) -> AppResult<(String, String)> {
        let file = self.require_file(file_id).await?;
        self.gate
            .authorize(ctx, &access(&file, AccessAction::Write))
            .await?;

        let key = depot_storage::keys::version_key(
            file.bucket_type,
            file.bucket_id,
            &file.logical_path,
        );
        let url = self.store.presign_put(&key, self.presign_expiry).await?;
        Ok((key, url))
    }

    async fn require_file(&self, file_id: Uuid) -> AppResult<StorageFile> {
        self.file_repo
            .find_by_id(file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
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

#[cfg(test)]
mod tests {
    use super::*;

    use depot_core::config::object_store::ObjectStoreConfig;
    use depot_core::error::ErrorKind as Kind;

    use crate::testing::{
        MemoryAuditStore, MemoryFileStore, MemoryLockStore, MemoryObjectStore,
        MemoryValidationStore, MemoryVersionStore, audit_trail, ctx, gate, lazy_pool, lock_row,
        personal_file,
    };

    fn service(
        files: Arc<MemoryFileStore>,
        locks: Arc<MemoryLockStore>,
        audit: Arc<MemoryAuditStore>,
    ) -> FileService {
        FileService::new(
            lazy_pool(),
            files,
            Arc::new(MemoryVersionStore::default()),
            locks,
            Arc::new(MemoryValidationStore::default()),
            gate(audit.clone()),
            MemoryObjectStore::with_keys(&[]),
            audit_trail(audit),
            &ObjectStoreConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_create_registers_file_awaiting_upload() {
        let ctx = ctx();
        let audit = Arc::new(MemoryAuditStore::default());
        let files = Arc::new(MemoryFileStore::default());
        let svc = service(files.clone(), Arc::new(MemoryLockStore::default()), audit.clone());

        let created = svc
            .create(
                &ctx,
                &CreateFileRequest {
                    bucket_type: BucketType::Personal,
                    bucket_id: ctx.user_id,
                    logical_path: "reports/q3.pdf".to_string(),
                    filename: "q3.pdf".to_string(),
                    mime_type: Some("application/pdf".to_string()),
                    tags: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(created.file.status, FileStatus::UploadPending);
        assert!(created.file.current_version_id.is_none());
        assert!(created.upload_url.contains(&created.object_key));
        // The row is persisted before any content exists.
        assert!(files.get(created.file.id).is_some());
        assert!(audit.actions().contains(&"file.create".to_string()));
    }

    #[tokio::test]
    async fn test_create_refused_outside_own_bucket() {
        let ctx = ctx();
        let audit = Arc::new(MemoryAuditStore::default());
        let svc = service(
            Arc::new(MemoryFileStore::default()),
            Arc::new(MemoryLockStore::default()),
            audit,
        );

        let err = svc
            .create(
                &ctx,
                &CreateFileRequest {
                    bucket_type: BucketType::Personal,
                    bucket_id: Uuid::new_v4(),
                    logical_path: "reports/q3.pdf".to_string(),
                    filename: "q3.pdf".to_string(),
                    mime_type: None,
                    tags: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, Kind::AccessDenied);
    }

    #[tokio::test]
    async fn test_soft_delete_blocked_while_locked() {
        let ctx = ctx();
        let file = personal_file(ctx.user_id, "reports/q3.pdf");
        let audit = Arc::new(MemoryAuditStore::default());
        let svc = service(
            MemoryFileStore::with(vec![file.clone()]),
            MemoryLockStore::with(vec![lock_row(file.id, Uuid::new_v4())]),
            audit,
        );

        let err = svc.soft_delete(&ctx, file.id).await.unwrap_err();
        assert_eq!(err.kind, Kind::LockConflict);
    }
}
