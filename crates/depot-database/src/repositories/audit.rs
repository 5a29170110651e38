//! Audit log repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use depot_core::error::{AppError, ErrorKind};
use depot_core::result::AppResult;
use depot_core::types::pagination::{PageRequest, PageResponse};
use depot_entity::audit::model::{AuditLogEntry, CreateAuditLogEntry};

use super::traits::AuditStore;

/// Repository for audit log entries.
#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    /// Create a new audit log repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an audit log entry.
    pub async fn create(&self, data: &CreateAuditLogEntry) -> AppResult<AuditLogEntry> {
        sqlx::query_as::<_, AuditLogEntry>(
            "INSERT INTO audit_log (entity_type, entity_id, action, actor_id, details, ip_address, user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(&data.entity_type)
        .bind(data.entity_id)
        .bind(&data.action)
        .bind(data.actor_id)
        .bind(&data.details)
        .bind(&data.ip_address)
        .bind(&data.user_agent)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create audit entry", e))
    }

    /// List the audit trail of one entity with pagination, newest first.
    pub async fn list_by_entity(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        page: &PageRequest,
    ) -> AppResult<PageResponse<AuditLogEntry>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_log WHERE entity_type = $1 AND entity_id = $2",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to count audit entries", e)
        })?;

        let entries = sqlx::query_as::<_, AuditLogEntry>(
            "SELECT * FROM audit_log WHERE entity_type = $1 AND entity_id = $2 \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list audit entries", e))?;

        Ok(PageResponse::new(
            entries,
            page.page,
            page.page_size,
            total as u64,
        ))
    }

    /// Count occurrences of an action since a specific time.
    pub async fn count_actions_since(
        &self,
        action: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_log WHERE action = $1 AND created_at >= $2",
        )
        .bind(action)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count audit actions", e))
    }
}

#[async_trait]
impl AuditStore for AuditLogRepository {
    async fn create(&self, data: &CreateAuditLogEntry) -> AppResult<AuditLogEntry> {
        AuditLogRepository::create(self, data).await
    }

    async fn list_by_entity(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        page: &PageRequest,
    ) -> AppResult<PageResponse<AuditLogEntry>> {
        AuditLogRepository::list_by_entity(self, entity_type, entity_id, page).await
    }

    async fn count_actions_since(
        &self,
        action: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<i64> {
        AuditLogRepository::count_actions_since(self, action, since).await
    }
}
