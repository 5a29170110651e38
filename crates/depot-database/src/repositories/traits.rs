//! Repository capability traits.
//!
//! Services depend on these traits rather than on the concrete repository
//! structs, so tests can substitute in-memory implementations. Only
//! pool-level methods are abstracted; the `*_tx` functions that compose
//! into transactions stay on the concrete types, since a transaction is a
//! Postgres concern with no meaningful stand-in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use depot_core::result::AppResult;
use depot_core::types::pagination::{PageRequest, PageResponse};
use depot_entity::audit::model::{AuditLogEntry, CreateAuditLogEntry};
use depot_entity::file::model::{CreateFile, StorageFile, UpdateFileMetadata};
use depot_entity::file::status::{BucketType, FileStatus};
use depot_entity::file::version::{CreateFileVersion, FileVersion};
use depot_entity::lock::model::{CreateFileLock, FileLock};
use depot_entity::validation::model::Validation;

use super::lock::LockWithPath;

/// File row access.
#[async_trait]
pub trait FileStore: Send + Sync + std::fmt::Debug + 'static {
    /// Find a file by ID.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<StorageFile>>;

    /// Find a file by its bucket and logical path.
    async fn find_by_path(
        &self,
        bucket_type: BucketType,
        bucket_id: Uuid,
        logical_path: &str,
    ) -> AppResult<Option<StorageFile>>;

    /// List visible files in a bucket with pagination.
    async fn list_by_bucket(
        &self,
        bucket_type: BucketType,
        bucket_id: Uuid,
        page: &PageRequest,
    ) -> AppResult<PageResponse<StorageFile>>;

    /// Create a new file record.
    async fn create(&self, data: &CreateFile) -> AppResult<StorageFile>;

    /// Update mutable file metadata.
    async fn update_metadata(
        &self,
        file_id: Uuid,
        update: &UpdateFileMetadata,
    ) -> AppResult<StorageFile>;

    /// Set a file's status.
    async fn set_status(&self, file_id: Uuid, status: FileStatus) -> AppResult<StorageFile>;

    /// Repoint the served version, used by reconciliation fallback.
    async fn repoint_current_version(
        &self,
        file_id: Uuid,
        version_id: Option<Uuid>,
        degraded: bool,
    ) -> AppResult<()>;

    /// Find the draft copy created from a source file, if one exists.
    async fn find_draft_of(&self, source_file_id: Uuid) -> AppResult<Option<StorageFile>>;
}

/// Version row access.
#[async_trait]
pub trait VersionStore: Send + Sync + std::fmt::Debug + 'static {
    /// Find a version by ID.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<FileVersion>>;

    /// List all versions of a file, newest first.
    async fn list_by_file(&self, file_id: Uuid) -> AppResult<Vec<FileVersion>>;

    /// Find a specific version of a file by number.
    async fn find_by_number(
        &self,
        file_id: Uuid,
        version_number: i32,
    ) -> AppResult<Option<FileVersion>>;

    /// Record a new version.
    async fn create(&self, data: &CreateFileVersion) -> AppResult<FileVersion>;

    /// Mark a version as corrupted. Idempotent.
    async fn mark_corrupted(&self, version_id: Uuid) -> AppResult<()>;

    /// Find the newest healthy version of a file that passed review.
    async fn find_latest_healthy_approved(&self, file_id: Uuid)
        -> AppResult<Option<FileVersion>>;

    /// List every version that reconciliation should verify.
    async fn list_unverified(&self) -> AppResult<Vec<FileVersion>>;

    /// List every object key recorded in version rows.
    async fn list_all_object_keys(&self) -> AppResult<Vec<String>>;
}

/// Lock row access.
#[async_trait]
pub trait LockStore: Send + Sync + std::fmt::Debug + 'static {
    /// Find the lock on a file, if any.
    async fn find_by_file(&self, file_id: Uuid) -> AppResult<Option<FileLock>>;

    /// Attempt to acquire a lock; `None` means the file is already locked.
    async fn try_acquire(&self, data: &CreateFileLock) -> AppResult<Option<FileLock>>;

    /// Release a lock held by a specific user. `false` means no such lock.
    async fn release(&self, file_id: Uuid, locked_by: Uuid) -> AppResult<bool>;

    /// Release a lock regardless of holder, returning the removed row.
    async fn force_release(&self, file_id: Uuid) -> AppResult<Option<FileLock>>;

    /// List all held locks with the locked file's path, oldest first.
    async fn list_all(&self) -> AppResult<Vec<LockWithPath>>;
}

/// Validation row access.
#[async_trait]
pub trait ValidationStore: Send + Sync + std::fmt::Debug + 'static {
    /// Find a validation by ID.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Validation>>;

    /// Find the pending validation for a version, if any.
    async fn find_pending_by_version(&self, version_id: Uuid) -> AppResult<Option<Validation>>;

    /// List the review history of a version, newest first.
    async fn list_by_version(&self, version_id: Uuid) -> AppResult<Vec<Validation>>;

    /// List pending validations across all files, oldest first.
    async fn list_pending(&self) -> AppResult<Vec<Validation>>;
}

/// Audit log access.
#[async_trait]
pub trait AuditStore: Send + Sync + std::fmt::Debug + 'static {
    /// Create an audit log entry.
    async fn create(&self, data: &CreateAuditLogEntry) -> AppResult<AuditLogEntry>;

    /// List the audit trail of one entity with pagination, newest first.
    async fn list_by_entity(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        page: &PageRequest,
    ) -> AppResult<PageResponse<AuditLogEntry>>;

    /// Count occurrences of an action since a specific time.
    async fn count_actions_since(&self, action: &str, since: DateTime<Utc>) -> AppResult<i64>;
}
