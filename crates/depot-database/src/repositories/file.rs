//! File repository implementation.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use depot_core::error::{AppError, ErrorKind};
use depot_core::result::AppResult;
use depot_core::types::pagination::{PageRequest, PageResponse};
use depot_entity::file::model::{CreateFile, StorageFile, UpdateFileMetadata};
use depot_entity::file::status::{BucketType, FileStatus};

use super::traits::FileStore;

/// Repository for file CRUD and query operations.
#[derive(Debug, Clone)]
pub struct FileRepository {
    pool: PgPool,
}

impl FileRepository {
    /// Create a new file repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a file by ID.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<StorageFile>> {
        sqlx::query_as::<_, StorageFile>("SELECT * FROM storage_files WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find file", e))
    }

    /// Find a file by its bucket and logical path.
    pub async fn find_by_path(
        &self,
        bucket_type: BucketType,
        bucket_id: Uuid,
        logical_path: &str,
    ) -> AppResult<Option<StorageFile>> {
        sqlx::query_as::<_, StorageFile>(
            "SELECT * FROM storage_files \
             WHERE bucket_type = $1 AND bucket_id = $2 AND logical_path = $3",
        )
        .bind(bucket_type)
        .bind(bucket_id)
        .bind(logical_path)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find file by path", e))
    }

    /// List visible files in a bucket with pagination.
    ///
    /// Archived files and in-flight draft copies are excluded.
    pub async fn list_by_bucket(
        &self,
        bucket_type: BucketType,
        bucket_id: Uuid,
        page: &PageRequest,
    ) -> AppResult<PageResponse<StorageFile>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM storage_files \
             WHERE bucket_type = $1 AND bucket_id = $2 \
             AND status NOT IN ('archived', 'draft')",
        )
        .bind(bucket_type)
        .bind(bucket_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count files", e))?;

        let files = sqlx::query_as::<_, StorageFile>(
            "SELECT * FROM storage_files \
             WHERE bucket_type = $1 AND bucket_id = $2 \
             AND status NOT IN ('archived', 'draft') \
             ORDER BY logical_path ASC LIMIT $3 OFFSET $4",
        )
        .bind(bucket_type)
        .bind(bucket_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list files", e))?;

        Ok(PageResponse::new(
            files,
            page.page,
            page.page_size,
            total as u64,
        ))
    }

    /// Create a new file record.
    pub async fn create(&self, data: &CreateFile) -> AppResult<StorageFile> {
        let mut conn = self.acquire().await?;
        Self::create_tx(&mut conn, data).await
    }

    /// Create a new file record inside an open transaction.
    pub async fn create_tx(conn: &mut PgConnection, data: &CreateFile) -> AppResult<StorageFile> {
        sqlx::query_as::<_, StorageFile>(
            "INSERT INTO storage_files \
             (bucket_type, bucket_id, logical_path, filename, owner_id, mime_type, size, status, source_file_id, tags) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
        )
        .bind(data.bucket_type)
        .bind(data.bucket_id)
        .bind(&data.logical_path)
        .bind(&data.filename)
        .bind(data.owner_id)
        .bind(&data.mime_type)
        .bind(data.size)
        .bind(data.status)
        .bind(data.source_file_id)
        .bind(&data.tags)
        .fetch_one(conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err)
                if db_err.constraint() == Some("storage_files_bucket_path_key") =>
            {
                AppError::conflict(format!(
                    "A file already exists at '{}' in this bucket",
                    data.logical_path
                ))
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create file", e),
        })
    }

    /// Update mutable file metadata, leaving `None` fields untouched.
    pub async fn update_metadata(
        &self,
        file_id: Uuid,
        update: &UpdateFileMetadata,
    ) -> AppResult<StorageFile> {
        sqlx::query_as::<_, StorageFile>(
            "UPDATE storage_files SET \
             filename = COALESCE($2, filename), \
             mime_type = COALESCE($3, mime_type), \
             tags = COALESCE($4, tags), \
             updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(file_id)
        .bind(&update.filename)
        .bind(&update.mime_type)
        .bind(&update.tags)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update metadata", e))?
        .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }

    /// Set a file's status.
    pub async fn set_status(&self, file_id: Uuid, status: FileStatus) -> AppResult<StorageFile> {
        let mut conn = self.acquire().await?;
        Self::set_status_tx(&mut conn, file_id, status).await
    }

    /// Set a file's status inside an open transaction.
    pub async fn set_status_tx(
        conn: &mut PgConnection,
        file_id: Uuid,
        status: FileStatus,
    ) -> AppResult<StorageFile> {
        sqlx::query_as::<_, StorageFile>(
            "UPDATE storage_files SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(file_id)
        .bind(status)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update file status", e))?
        .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }

    /// Set both status and served version inside an open transaction.
    ///
    /// Used by approval, which is the only operation allowed to advance
    /// `current_version_id`.
    pub async fn promote_version_tx(
        conn: &mut PgConnection,
        file_id: Uuid,
        status: FileStatus,
        version_id: Uuid,
        size: i64,
    ) -> AppResult<StorageFile> {
        sqlx::query_as::<_, StorageFile>(
            "UPDATE storage_files \
             SET status = $2, current_version_id = $3, size = $4, degraded = FALSE, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(file_id)
        .bind(status)
        .bind(version_id)
        .bind(size)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to promote version", e))?
        .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }

    /// Repoint the served version, used by reconciliation fallback.
    ///
    /// `version_id = None` together with `degraded = true` records that no
    /// healthy version remains.
    pub async fn repoint_current_version(
        &self,
        file_id: Uuid,
        version_id: Option<Uuid>,
        degraded: bool,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE storage_files \
             SET current_version_id = $2, degraded = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(file_id)
        .bind(version_id)
        .bind(degraded)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to repoint current version", e)
        })?;
        Ok(())
    }

    /// Find the draft copy created from a source file, if one exists.
    pub async fn find_draft_of(&self, source_file_id: Uuid) -> AppResult<Option<StorageFile>> {
        sqlx::query_as::<_, StorageFile>(
            "SELECT * FROM storage_files WHERE source_file_id = $1 AND status = 'draft'",
        )
        .bind(source_file_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find draft copy", e))
    }

    /// Delete a file row inside an open transaction.
    pub async fn delete_tx(conn: &mut PgConnection, file_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM storage_files WHERE id = $1")
            .bind(file_id)
            .execute(conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete file", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Count all files.
    pub async fn count_all(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM storage_files")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count files", e))
    }

    async fn acquire(&self) -> AppResult<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        self.pool.acquire().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to acquire connection", e)
        })
    }
}

#[async_trait]
impl FileStore for FileRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<StorageFile>> {
        FileRepository::find_by_id(self, id).await
    }

    async fn find_by_path(
        &self,
        bucket_type: BucketType,
        bucket_id: Uuid,
        logical_path: &str,
    ) -> AppResult<Option<StorageFile>> {
        FileRepository::find_by_path(self, bucket_type, bucket_id, logical_path).await
    }

    async fn list_by_bucket(
        &self,
        bucket_type: BucketType,
        bucket_id: Uuid,
        page: &PageRequest,
    ) -> AppResult<PageResponse<StorageFile>> {
        FileRepository::list_by_bucket(self, bucket_type, bucket_id, page).await
    }

    async fn create(&self, data: &CreateFile) -> AppResult<StorageFile> {
        FileRepository::create(self, data).await
    }

    async fn update_metadata(
        &self,
        file_id: Uuid,
        update: &UpdateFileMetadata,
    ) -> AppResult<StorageFile> {
        FileRepository::update_metadata(self, file_id, update).await
    }

    async fn set_status(&self, file_id: Uuid, status: FileStatus) -> AppResult<StorageFile> {
        FileRepository::set_status(self, file_id, status).await
    }

    async fn repoint_current_version(
        &self,
        file_id: Uuid,
        version_id: Option<Uuid>,
        degraded: bool,
    ) -> AppResult<()> {
        FileRepository::repoint_current_version(self, file_id, version_id, degraded).await
    }

    async fn find_draft_of(&self, source_file_id: Uuid) -> AppResult<Option<StorageFile>> {
        FileRepository::find_draft_of(self, source_file_id).await
    }
}
