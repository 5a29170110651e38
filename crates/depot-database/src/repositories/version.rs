//! File version repository implementation.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use depot_core::error::{AppError, ErrorKind};
use depot_core::result::AppResult;
use depot_entity::file::version::{CreateFileVersion, FileVersion};

use super::traits::VersionStore;

/// Repository for append-only file version rows.
#[derive(Debug, Clone)]
pub struct VersionRepository {
    pool: PgPool,
}

impl VersionRepository {
    /// Create a new version repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a version by ID.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<FileVersion>> {
        sqlx::query_as::<_, FileVersion>("SELECT * FROM file_versions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find version", e))
    }

    /// List all versions of a file, newest first.
    pub async fn list_by_file(&self, file_id: Uuid) -> AppResult<Vec<FileVersion>> {
        sqlx::query_as::<_, FileVersion>(
            "SELECT * FROM file_versions WHERE file_id = $1 ORDER BY version_number DESC",
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list versions", e))
    }

    /// Find a specific version of a file by number.
    pub async fn find_by_number(
        &self,
        file_id: Uuid,
        version_number: i32,
    ) -> AppResult<Option<FileVersion>> {
        sqlx::query_as::<_, FileVersion>(
            "SELECT * FROM file_versions WHERE file_id = $1 AND version_number = $2",
        )
        .bind(file_id)
        .bind(version_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find version", e))
    }

    /// Record a new version.
    pub async fn create(&self, data: &CreateFileVersion) -> AppResult<FileVersion> {
        let mut conn = self.acquire().await?;
        Self::create_tx(&mut conn, data).await
    }

    /// Record a new version inside an open transaction.
    ///
    /// The version number is assigned by the database in the same statement
    /// that inserts the row, so two concurrent commits can never claim the
    /// same number. The loser of the race hits the unique constraint and is
    /// surfaced as a version conflict.
    pub async fn create_tx(
        conn: &mut PgConnection,
        data: &CreateFileVersion,
    ) -> AppResult<FileVersion> {
        sqlx::query_as::<_, FileVersion>(
            "INSERT INTO file_versions \
             (file_id, version_number, object_key, size, mime_type, checksum, changelog, tags, created_by) \
             SELECT $1, COALESCE(MAX(version_number), 0) + 1, $2, $3, $4, $5, $6, $7, $8 \
             FROM file_versions WHERE file_id = $1 \
             RETURNING *",
        )
        .bind(data.file_id)
        .bind(&data.object_key)
        .bind(data.size)
        .bind(&data.mime_type)
        .bind(&data.checksum)
        .bind(&data.changelog)
        .bind(&data.tags)
        .bind(data.created_by)
        .fetch_one(conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err)
                if db_err.constraint() == Some("file_versions_file_number_key") =>
            {
                AppError::version_conflict("Concurrent version creation detected")
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create version", e),
        })
    }

    /// Mark a version as corrupted. Idempotent.
    pub async fn mark_corrupted(&self, version_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE file_versions SET corrupted = TRUE WHERE id = $1")
            .bind(version_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to mark version corrupted", e)
            })?;
        Ok(())
    }

    /// Find the newest healthy version of a file that passed review.
    ///
    /// Used by reconciliation to pick a fallback when the served version
    /// turns out to be corrupted.
    pub async fn find_latest_healthy_approved(
        &self,
        file_id: Uuid,
    ) -> AppResult<Option<FileVersion>> {
        sqlx::query_as::<_, FileVersion>(
            "SELECT v.* FROM file_versions v \
             WHERE v.file_id = $1 AND v.corrupted = FALSE \
             AND EXISTS (\
                 SELECT 1 FROM validations val \
                 WHERE val.version_id = v.id AND val.state = 'approved'\
             ) \
             ORDER BY v.version_number DESC LIMIT 1",
        )
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find fallback version", e)
        })
    }

    /// List every version that reconciliation should verify.
    ///
    /// Versions already flagged corrupted are skipped; their objects are
    /// known to be gone.
    pub async fn list_unverified(&self) -> AppResult<Vec<FileVersion>> {
        sqlx::query_as::<_, FileVersion>(
            "SELECT * FROM file_versions WHERE corrupted = FALSE ORDER BY file_id, version_number",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list versions for scan", e)
        })
    }

    /// List every object key recorded in version rows.
    pub async fn list_all_object_keys(&self) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT object_key FROM file_versions")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to list object keys", e)
            })
    }

    /// Delete all versions of a file inside an open transaction.
    ///
    /// Returns the object keys of the deleted rows so the caller can remove
    /// the backing objects after the transaction commits.
    pub async fn delete_by_file_tx(
        conn: &mut PgConnection,
        file_id: Uuid,
    ) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "DELETE FROM file_versions WHERE file_id = $1 RETURNING object_key",
        )
        .bind(file_id)
        .fetch_all(conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete versions", e))
    }

    async fn acquire(&self) -> AppResult<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        self.pool.acquire().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to acquire connection", e)
        })
    }
}

#[async_trait]
impl VersionStore for VersionRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<FileVersion>> {
        VersionRepository::find_by_id(self, id).await
    }

    async fn list_by_file(&self, file_id: Uuid) -> AppResult<Vec<FileVersion>> {
        VersionRepository::list_by_file(self, file_id).await
    }

    async fn find_by_number(
        &self,
        file_id: Uuid,
        version_number: i32,
    ) -> AppResult<Option<FileVersion>> {
        VersionRepository::find_by_number(self, file_id, version_number).await
    }

    async fn create(&self, data: &CreateFileVersion) -> AppResult<FileVersion> {
        VersionRepository::create(self, data).await
    }

    async fn mark_corrupted(&self, version_id: Uuid) -> AppResult<()> {
        VersionRepository::mark_corrupted(self, version_id).await
    }

    async fn find_latest_healthy_approved(
        &self,
        file_id: Uuid,
    ) -> AppResult<Option<FileVersion>> {
        VersionRepository::find_latest_healthy_approved(self, file_id).await
    }

    async fn list_unverified(&self) -> AppResult<Vec<FileVersion>> {
        VersionRepository::list_unverified(self).await
    }

    async fn list_all_object_keys(&self) -> AppResult<Vec<String>> {
        VersionRepository::list_all_object_keys(self).await
    }
}
