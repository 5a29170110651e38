//! Validation repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use depot_core::error::{AppError, ErrorKind};
use depot_core::result::AppResult;
use depot_entity::validation::model::{CreateValidation, Validation, ValidationState};

use super::traits::ValidationStore;

/// Repository for validation (review) requests.
#[derive(Debug, Clone)]
pub struct ValidationRepository {
    pool: PgPool,
}

impl ValidationRepository {
    /// Create a new validation repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a validation by ID.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Validation>> {
        sqlx::query_as::<_, Validation>("SELECT * FROM validations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find validation", e))
    }

    /// Find the pending validation for a version, if any.
    pub async fn find_pending_by_version(&self, version_id: Uuid) -> AppResult<Option<Validation>> {
        sqlx::query_as::<_, Validation>(
            "SELECT * FROM validations WHERE version_id = $1 AND state = 'pending'",
        )
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find pending validation", e)
        })
    }

    /// List the review history of a version, newest first.
    pub async fn list_by_version(&self, version_id: Uuid) -> AppResult<Vec<Validation>> {
        sqlx::query_as::<_, Validation>(
            "SELECT * FROM validations WHERE version_id = $1 ORDER BY requested_at DESC",
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list validations", e))
    }

    /// Open a pending validation inside an open transaction.
    ///
    /// The partial unique index on pending validations makes a second open
    /// request for the same version fail; that is surfaced as a conflict.
    pub async fn create_tx(
        conn: &mut PgConnection,
        data: &CreateValidation,
    ) -> AppResult<Validation> {
        sqlx::query_as::<_, Validation>(
            "INSERT INTO validations (version_id, requested_by) VALUES ($1, $2) RETURNING *",
        )
        .bind(data.version_id)
        .bind(data.requested_by)
        .fetch_one(conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err)
                if db_err.constraint() == Some("idx_validations_one_pending") =>
            {
                AppError::validation_conflict("A review is already pending for this version")
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create validation", e),
        })
    }

    /// Decide a pending validation inside an open transaction.
    ///
    /// The update is conditional on `state = 'pending'`; a `None` return
    /// means another reviewer decided first and the caller must not apply
    /// any side effects.
    #[allow(clippy::too_many_arguments)]
    pub async fn decide_tx(
        conn: &mut PgConnection,
        validation_id: Uuid,
        state: ValidationState,
        reviewed_by: Uuid,
        reviewed_at: DateTime<Utc>,
        comment: Option<&str>,
        require_new_version: Option<bool>,
    ) -> AppResult<Option<Validation>> {
        sqlx::query_as::<_, Validation>(
            "UPDATE validations \
             SET state = $2, reviewed_by = $3, reviewed_at = $4, comment = $5, require_new_version = $6 \
             WHERE id = $1 AND state = 'pending' \
             RETURNING *",
        )
        .bind(validation_id)
        .bind(state)
        .bind(reviewed_by)
        .bind(reviewed_at)
        .bind(comment)
        .bind(require_new_version)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to decide validation", e))
    }

    /// List pending validations across all files, oldest first.
    pub async fn list_pending(&self) -> AppResult<Vec<Validation>> {
        sqlx::query_as::<_, Validation>(
            "SELECT * FROM validations WHERE state = 'pending' ORDER BY requested_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list pending validations", e)
        })
    }
}

#[async_trait]
impl ValidationStore for ValidationRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Validation>> {
        ValidationRepository::find_by_id(self, id).await
    }

    async fn find_pending_by_version(&self, version_id: Uuid) -> AppResult<Option<Validation>> {
        ValidationRepository::find_pending_by_version(self, version_id).await
    }

    async fn list_by_version(&self, version_id: Uuid) -> AppResult<Vec<Validation>> {
        ValidationRepository::list_by_version(self, version_id).await
    }

    async fn list_pending(&self) -> AppResult<Vec<Validation>> {
        ValidationRepository::list_pending(self).await
    }
}
