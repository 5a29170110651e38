//! File lock repository implementation.

use async_trait::async_trait;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use depot_core::error::{AppError, ErrorKind};
use depot_core::result::AppResult;
use depot_entity::lock::model::{CreateFileLock, FileLock};

use super::traits::LockStore;

/// A lock row joined with the locked file's logical path.
#[derive(Debug, Clone, FromRow)]
pub struct LockWithPath {
    /// The lock row, flattened.
    #[sqlx(flatten)]
    pub lock: FileLock,
    /// Logical path of the locked file.
    pub logical_path: String,
}

/// Repository for exclusive file locks.
///
/// Lock rows are hard state: a row exists while the lock is held and is
/// deleted on release. All mutations go through conditional statements so
/// concurrent callers are serialized by the database, not by application
/// logic.
#[derive(Debug, Clone)]
pub struct LockRepository {
    pool: PgPool,
}

impl LockRepository {
    /// Create a new lock repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the lock on a file, if any.
    pub async fn find_by_file(&self, file_id: Uuid) -> AppResult<Option<FileLock>> {
        sqlx::query_as::<_, FileLock>("SELECT * FROM file_locks WHERE file_id = $1")
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find lock", e))
    }

    /// Attempt to acquire a lock.
    ///
    /// Returns `None` when another lock already exists on the file. The
    /// unique constraint on `file_id` makes this safe under concurrency;
    /// exactly one of two simultaneous callers gets a row back.
    pub async fn try_acquire(&self, data: &CreateFileLock) -> AppResult<Option<FileLock>> {
        let mut conn = self.acquire_conn().await?;
        Self::try_acquire_tx(&mut conn, data).await
    }

    /// Attempt to acquire a lock inside an open transaction.
    pub async fn try_acquire_tx(
        conn: &mut PgConnection,
        data: &CreateFileLock,
    ) -> AppResult<Option<FileLock>> {
        sqlx::query_as::<_, FileLock>(
            "INSERT INTO file_locks (file_id, locked_by, reason, forced) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (file_id) DO NOTHING \
             RETURNING *",
        )
        .bind(data.file_id)
        .bind(data.locked_by)
        .bind(&data.reason)
        .bind(data.forced)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to acquire lock", e))
    }

    /// Release a lock held by a specific user.
    ///
    /// Returns `false` when no such lock exists, which callers treat as the
    /// lock having been force-released underneath them.
    pub async fn release(&self, file_id: Uuid, locked_by: Uuid) -> AppResult<bool> {
        let mut conn = self.acquire_conn().await?;
        Self::release_tx(&mut conn, file_id, locked_by).await
    }

    /// Release a held lock inside an open transaction.
    pub async fn release_tx(
        conn: &mut PgConnection,
        file_id: Uuid,
        locked_by: Uuid,
    ) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM file_locks WHERE file_id = $1 AND locked_by = $2")
            .bind(file_id)
            .bind(locked_by)
            .execute(conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to release lock", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Release a lock regardless of holder. Administrative path.
    ///
    /// Returns the removed lock so the caller can audit who lost it.
    pub async fn force_release(&self, file_id: Uuid) -> AppResult<Option<FileLock>> {
        sqlx::query_as::<_, FileLock>("DELETE FROM file_locks WHERE file_id = $1 RETURNING *")
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to force-release lock", e)
            })
    }

    /// List all held locks with the locked file's path, oldest first.
    pub async fn list_all(&self) -> AppResult<Vec<LockWithPath>> {
        sqlx::query_as::<_, LockWithPath>(
            "SELECT l.*, f.logical_path FROM file_locks l \
             JOIN storage_files f ON f.id = l.file_id \
             ORDER BY l.locked_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list locks", e))
    }

    async fn acquire_conn(&self) -> AppResult<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        self.pool.acquire().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to acquire connection", e)
        })
    }
}

#[async_trait]
impl LockStore for LockRepository {
    async fn find_by_file(&self, file_id: Uuid) -> AppResult<Option<FileLock>> {
        LockRepository::find_by_file(self, file_id).await
    }

    async fn try_acquire(&self, data: &CreateFileLock) -> AppResult<Option<FileLock>> {
        LockRepository::try_acquire(self, data).await
    }

    async fn release(&self, file_id: Uuid, locked_by: Uuid) -> AppResult<bool> {
        LockRepository::release(self, file_id, locked_by).await
    }

    async fn force_release(&self, file_id: Uuid) -> AppResult<Option<FileLock>> {
        LockRepository::force_release(self, file_id).await
    }

    async fn list_all(&self) -> AppResult<Vec<LockWithPath>> {
        LockRepository::list_all(self).await
    }
}
