//! In-memory repository and object-store implementations for service
//! tests. State lives behind `Mutex`ed maps; the semantics mirror the SQL
//! each real repository runs, close enough for exercising service logic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use depot_access::{AccessGate, ProjectAccessClient};
use depot_core::config::access::AccessConfig;
use depot_core::error::AppError;
use depot_core::result::AppResult;
use depot_core::traits::object_store::{ObjectMeta, ObjectStore};
use depot_core::types::context::RequestContext;
use depot_core::types::pagination::{PageRequest, PageResponse};
use depot_database::repositories::lock::LockWithPath;
use depot_database::repositories::{
    AuditStore, FileStore, LockStore, ValidationStore, VersionStore,
};
use depot_entity::audit::model::{AuditLogEntry, CreateAuditLogEntry};
use depot_entity::file::model::{CreateFile, StorageFile, UpdateFileMetadata};
use depot_entity::file::status::{BucketType, FileStatus};
use depot_entity::file::version::{CreateFileVersion, FileVersion};
use depot_entity::lock::model::{CreateFileLock, FileLock};
use depot_entity::validation::model::Validation;

use crate::audit::AuditTrail;

/// A pool that is never connected. Tests that reach a transaction are
/// broken by construction; everything they need must come from the
/// in-memory stores.
pub(crate) fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .connect_lazy("postgres://depot@localhost:1/depot_test")
        .expect("lazy pool from a well-formed url")
}

pub(crate) fn ctx() -> RequestContext {
    RequestContext::new(Uuid::new_v4(), Uuid::new_v4(), None, None)
}

pub(crate) fn gate(audit: Arc<MemoryAuditStore>) -> Arc<AccessGate> {
    let client =
        ProjectAccessClient::new(&AccessConfig::default()).expect("default client builds");
    Arc::new(AccessGate::new(client, audit))
}

pub(crate) fn audit_trail(audit: Arc<MemoryAuditStore>) -> AuditTrail {
    AuditTrail::new(audit)
}

pub(crate) fn personal_file(owner: Uuid, path: &str) -> StorageFile {
    StorageFile {
        id: Uuid::new_v4(),
        bucket_type: BucketType::Personal,
        bucket_id: owner,
        logical_path: path.to_string(),
        filename: path.rsplit('/').next().unwrap_or(path).to_string(),
        owner_id: owner,
        mime_type: Some("application/octet-stream".to_string()),
        size: 1024,
        status: FileStatus::Approved,
        current_version_id: None,
        source_file_id: None,
        tags: None,
        degraded: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub(crate) fn version_row(
    file_id: Uuid,
    number: i32,
    object_key: &str,
    checksum: Option<&str>,
) -> FileVersion {
    FileVersion {
        id: Uuid::new_v4(),
        file_id,
        version_number: number,
        object_key: object_key.to_string(),
        size: 1024,
        mime_type: Some("application/octet-stream".to_string()),
        checksum: checksum.map(|c| c.to_string()),
        changelog: None,
        tags: None,
        corrupted: false,
        created_by: Uuid::new_v4(),
        created_at: Utc::now(),
    }
}

pub(crate) fn lock_row(file_id: Uuid, locked_by: Uuid) -> FileLock {
    FileLock {
        id: Uuid::new_v4(),
        file_id,
        locked_by,
        locked_at: Utc::now(),
        reason: None,
        forced: false,
    }
}

#[derive(Debug, Default)]
pub(crate) struct MemoryFileStore {
    files: Mutex<HashMap<Uuid, StorageFile>>,
}

impl MemoryFileStore {
    pub(crate) fn with(files: Vec<StorageFile>) -> Arc<Self> {
        Arc::new(Self {
            files: Mutex::new(files.into_iter().map(|f| (f.id, f)).collect()),
        })
    }

    pub(crate) fn get(&self, id: Uuid) -> Option<StorageFile> {
        self.files.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<StorageFile>> {
        Ok(self.files.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_path(
        &self,
        bucket_type: BucketType,
        bucket_id: Uuid,
        logical_path: &str,
    ) -> AppResult<Option<StorageFile>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .values()
            .find(|f| {
                f.bucket_type == bucket_type
                    && f.bucket_id == bucket_id
                    && f.logical_path == logical_path
            })
            .cloned())
    }

    async fn list_by_bucket(
        &self,
        bucket_type: BucketType,
        bucket_id: Uuid,
        page: &PageRequest,
    ) -> AppResult<PageResponse<StorageFile>> {
        let mut files: Vec<StorageFile> = self
            .files
            .lock()
            .unwrap()
            .values()
            .filter(|f| {
                f.bucket_type == bucket_type
                    && f.bucket_id == bucket_id
                    && f.status.is_visible()
            })
            .cloned()
            .collect();
        files.sort_by(|a, b| a.logical_path.cmp(&b.logical_path));
        let total = files.len() as u64;
        Ok(PageResponse::new(files, page.page, page.page_size, total))
    }

    async fn create(&self, data: &CreateFile) -> AppResult<StorageFile> {
        let file = StorageFile {
            id: Uuid::new_v4(),
            bucket_type: data.bucket_type,
            bucket_id: data.bucket_id,
            logical_path: data.logical_path.clone(),
            filename: data.filename.clone(),
            owner_id: data.owner_id,
            mime_type: data.mime_type.clone(),
            size: data.size,
            status: data.status,
            current_version_id: None,
            source_file_id: data.source_file_id,
            tags: data.tags.clone(),
            degraded: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.files.lock().unwrap().insert(file.id, file.clone());
        Ok(file)
    }

    async fn update_metadata(
        &self,
        file_id: Uuid,
        update: &UpdateFileMetadata,
    ) -> AppResult<StorageFile> {
        let mut files = self.files.lock().unwrap();
        let file = files
            .get_mut(&file_id)
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))?;
        if let Some(filename) = &update.filename {
            file.filename = filename.clone();
        }
        if let Some(mime_type) = &update.mime_type {
            file.mime_type = Some(mime_type.clone());
        }
        if let Some(tags) = &update.tags {
            file.tags = Some(tags.clone());
        }
        Ok(file.clone())
    }

    async fn set_status(&self, file_id: Uuid, status: FileStatus) -> AppResult<StorageFile> {
        let mut files = self.files.lock().unwrap();
        let file = files
            .get_mut(&file_id)
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))?;
        file.status = status;
        Ok(file.clone())
    }

    async fn repoint_current_version(
        &self,
        file_id: Uuid,
        version_id: Option<Uuid>,
        degraded: bool,
    ) -> AppResult<()> {
        let mut files = self.files.lock().unwrap();
        if let Some(file) = files.get_mut(&file_id) {
            file.current_version_id = version_id;
            file.degraded = degraded;
        }
        Ok(())
    }

    async fn find_draft_of(&self, source_file_id: Uuid) -> AppResult<Option<StorageFile>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .values()
            .find(|f| f.source_file_id == Some(source_file_id) && f.status == FileStatus::Draft)
            .cloned())
    }
}

#[derive(Debug, Default)]
pub(crate) struct MemoryVersionStore {
    versions: Mutex<Vec<FileVersion>>,
    approved: Mutex<Vec<Uuid>>,
}

impl MemoryVersionStore {
    pub(crate) fn with(versions: Vec<FileVersion>) -> Arc<Self> {
        Arc::new(Self {
            versions: Mutex::new(versions),
            approved: Mutex::new(Vec::new()),
        })
    }

    /// Record an approval so `find_latest_healthy_approved` can see it.
    pub(crate) fn approve(&self, version_id: Uuid) {
        self.approved.lock().unwrap().push(version_id);
    }

    pub(crate) fn get(&self, id: Uuid) -> Option<FileVersion> {
        self.versions.lock().unwrap().iter().find(|v| v.id == id).cloned()
    }

    pub(crate) fn count_for(&self, file_id: Uuid) -> usize {
        self.versions
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.file_id == file_id)
            .count()
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<FileVersion>> {
        Ok(self.get(id))
    }

    async fn list_by_file(&self, file_id: Uuid) -> AppResult<Vec<FileVersion>> {
        let mut versions: Vec<FileVersion> = self
            .versions
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.file_id == file_id)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        Ok(versions)
    }

    async fn find_by_number(
        &self,
        file_id: Uuid,
        version_number: i32,
    ) -> AppResult<Option<FileVersion>> {
        Ok(self
            .versions
            .lock()
            .unwrap()
            .iter()
            .find(|v| v.file_id == file_id && v.version_number == version_number)
            .cloned())
    }

    async fn create(&self, data: &CreateFileVersion) -> AppResult<FileVersion> {
        let mut versions = self.versions.lock().unwrap();
        let next = versions
            .iter()
            .filter(|v| v.file_id == data.file_id)
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0)
            + 1;
        let version = FileVersion {
            id: Uuid::new_v4(),
            file_id: data.file_id,
            version_number: next,
            object_key: data.object_key.clone(),
            size: data.size,
            mime_type: data.mime_type.clone(),
            checksum: data.checksum.clone(),
            changelog: data.changelog.clone(),
            tags: data.tags.clone(),
            corrupted: false,
            created_by: data.created_by,
            created_at: Utc::now(),
        };
        versions.push(version.clone());
        Ok(version)
    }

    async fn mark_corrupted(&self, version_id: Uuid) -> AppResult<()> {
        let mut versions = self.versions.lock().unwrap();
        if let Some(version) = versions.iter_mut().find(|v| v.id == version_id) {
            version.corrupted = true;
        }
        Ok(())
    }

    async fn find_latest_healthy_approved(
        &self,
        file_id: Uuid,
    ) -> AppResult<Option<FileVersion>> {
        let approved = self.approved.lock().unwrap();
        let mut candidates: Vec<FileVersion> = self
            .versions
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.file_id == file_id && !v.corrupted && approved.contains(&v.id))
            .cloned()
            .collect();
        candidates.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        Ok(candidates.into_iter().next())
    }

    async fn list_unverified(&self) -> AppResult<Vec<FileVersion>> {
        Ok(self
            .versions
            .lock()
            .unwrap()
            .iter()
            .filter(|v| !v.corrupted)
            .cloned()
            .collect())
    }

    async fn list_all_object_keys(&self) -> AppResult<Vec<String>> {
        Ok(self
            .versions
            .lock()
            .unwrap()
            .iter()
            .map(|v| v.object_key.clone())
            .collect())
    }
}

#[derive(Debug, Default)]
pub(crate) struct MemoryLockStore {
    locks: Mutex<HashMap<Uuid, FileLock>>,
}

impl MemoryLockStore {
    pub(crate) fn with(locks: Vec<FileLock>) -> Arc<Self> {
        Arc::new(Self {
            locks: Mutex::new(locks.into_iter().map(|l| (l.file_id, l)).collect()),
        })
    }

    pub(crate) fn holder_of(&self, file_id: Uuid) -> Option<Uuid> {
        self.locks.lock().unwrap().get(&file_id).map(|l| l.locked_by)
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn find_by_file(&self, file_id: Uuid) -> AppResult<Option<FileLock>> {
        Ok(self.locks.lock().unwrap().get(&file_id).cloned())
    }

    async fn try_acquire(&self, data: &CreateFileLock) -> AppResult<Option<FileLock>> {
        let mut locks = self.locks.lock().unwrap();
        if locks.contains_key(&data.file_id) {
            return Ok(None);
        }
        let lock = FileLock {
            id: Uuid::new_v4(),
            file_id: data.file_id,
            locked_by: data.locked_by,
            locked_at: Utc::now(),
            reason: data.reason.clone(),
            forced: data.forced,
        };
        locks.insert(lock.file_id, lock.clone());
        Ok(Some(lock))
    }

    async fn release(&self, file_id: Uuid, locked_by: Uuid) -> AppResult<bool> {
        let mut locks = self.locks.lock().unwrap();
        match locks.get(&file_id) {
            Some(lock) if lock.locked_by == locked_by => {
                locks.remove(&file_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn force_release(&self, file_id: Uuid) -> AppResult<Option<FileLock>> {
        Ok(self.locks.lock().unwrap().remove(&file_id))
    }

    async fn list_all(&self) -> AppResult<Vec<LockWithPath>> {
        let mut rows: Vec<LockWithPath> = self
            .locks
            .lock()
            .unwrap()
            .values()
            .map(|lock| LockWithPath {
                lock: lock.clone(),
                logical_path: String::new(),
            })
            .collect();
        rows.sort_by(|a, b| a.lock.locked_at.cmp(&b.lock.locked_at));
        Ok(rows)
    }
}

#[derive(Debug, Default)]
pub(crate) struct MemoryValidationStore {
    validations: Mutex<Vec<Validation>>,
}

#[async_trait]
impl ValidationStore for MemoryValidationStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Validation>> {
        Ok(self
            .validations
            .lock()
            .unwrap()
            .iter()
            .find(|v| v.id == id)
            .cloned())
    }

    async fn find_pending_by_version(&self, version_id: Uuid) -> AppResult<Option<Validation>> {
        Ok(self
            .validations
            .lock()
            .unwrap()
            .iter()
            .find(|v| v.version_id == version_id && !v.state.is_decided())
            .cloned())
    }

    async fn list_by_version(&self, version_id: Uuid) -> AppResult<Vec<Validation>> {
        Ok(self
            .validations
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.version_id == version_id)
            .cloned()
            .collect())
    }

    async fn list_pending(&self) -> AppResult<Vec<Validation>> {
        Ok(self
            .validations
            .lock()
            .unwrap()
            .iter()
            .filter(|v| !v.state.is_decided())
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub(crate) struct MemoryAuditStore {
    entries: Mutex<Vec<AuditLogEntry>>,
}

impl MemoryAuditStore {
    pub(crate) fn actions(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.action.clone())
            .collect()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn create(&self, data: &CreateAuditLogEntry) -> AppResult<AuditLogEntry> {
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            entity_type: data.entity_type.clone(),
            entity_id: data.entity_id,
            action: data.action.clone(),
            actor_id: data.actor_id,
            details: data.details.clone(),
            ip_address: data.ip_address.clone(),
            user_agent: data.user_agent.clone(),
            created_at: Utc::now(),
        };
        self.entries.lock().unwrap().push(entry.clone());
        Ok(entry)
    }

    async fn list_by_entity(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        page: &PageRequest,
    ) -> AppResult<PageResponse<AuditLogEntry>> {
        let entries: Vec<AuditLogEntry> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.entity_type == entity_type && e.entity_id == entity_id)
            .cloned()
            .collect();
        let total = entries.len() as u64;
        Ok(PageResponse::new(entries, page.page, page.page_size, total))
    }

    async fn count_actions_since(
        &self,
        action: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<i64> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.action == action && e.created_at >= since)
            .count() as i64)
    }
}

/// Key-to-metadata map standing in for the S3 adapter.
#[derive(Debug, Default)]
pub(crate) struct MemoryObjectStore {
    objects: Mutex<HashMap<String, ObjectMeta>>,
}

impl MemoryObjectStore {
    pub(crate) fn with_keys(keys: &[&str]) -> Arc<Self> {
        let store = Self::default();
        {
            let mut objects = store.objects.lock().unwrap();
            for key in keys {
                objects.insert(
                    key.to_string(),
                    ObjectMeta {
                        key: key.to_string(),
                        size: 1024,
                        mime_type: Some("application/octet-stream".to_string()),
                        etag: None,
                        last_modified: Some(Utc::now()),
                    },
                );
            }
        }
        Arc::new(store)
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn put(&self, key: &str, data: Bytes) -> AppResult<()> {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            ObjectMeta {
                key: key.to_string(),
                size: data.len() as u64,
                mime_type: None,
                etag: None,
                last_modified: Some(Utc::now()),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> AppResult<Bytes> {
        if self.contains(key) {
            Ok(Bytes::new())
        } else {
            Err(AppError::not_found(format!("Object {key} not found")))
        }
    }

    async fn copy(&self, from: &str, to: &str) -> AppResult<()> {
        let mut objects = self.objects.lock().unwrap();
        let mut meta = objects
            .get(from)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Object {from} not found")))?;
        meta.key = to.to_string();
        objects.insert(to.to_string(), meta);
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn stat(&self, key: &str) -> AppResult<Option<ObjectMeta>> {
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }

    async fn list(&self, prefix: &str) -> AppResult<Vec<ObjectMeta>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .values()
            .filter(|meta| meta.key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn presign_put(&self, key: &str, _expires_in: std::time::Duration) -> AppResult<String> {
        Ok(format!("https://objects.invalid/upload/{key}"))
    }

    async fn presign_get(&self, key: &str, _expires_in: std::time::Duration) -> AppResult<String> {
        Ok(format!("https://objects.invalid/download/{key}"))
    }
}
