//! Audit trail service.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use depot_core::result::AppResult;
use depot_core::types::context::RequestContext;
use depot_core::types::pagination::{PageRequest, PageResponse};
use depot_database::repositories::AuditStore;
use depot_entity::audit::model::{AuditLogEntry, CreateAuditLogEntry};

/// Append-only audit trail over workflow operations.
///
/// Recording is best-effort: a failed insert is logged and swallowed so an
/// audit outage never blocks the operation being audited. Reads are plain
/// repository queries.
#[derive(Debug, Clone)]
pub struct AuditTrail {
    audit_repo: Arc<dyn AuditStore>,
}

impl AuditTrail {
    /// Create a new audit trail.
    pub fn new(audit_repo: Arc<dyn AuditStore>) -> Self {
        Self { audit_repo }
    }

    /// Record an action. Failures are logged, never propagated.
    pub async fn record(
        &self,
        ctx: &RequestContext,
        entity_type: &str,
        entity_id: Uuid,
        action: &str,
        details: Option<Value>,
    ) {
        let entry = CreateAuditLogEntry {
            entity_type: entity_type.to_string(),
            entity_id,
            action: action.to_string(),
            actor_id: ctx.user_id,
            details,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        };

        if let Err(e) = self.audit_repo.create(&entry).await {
            warn!(action, entity_id = %entity_id, error = %e, "Failed to record audit entry");
        }
    }

    /// List the audit trail of an entity, newest first.
    pub async fn list(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        page: &PageRequest,
    ) -> AppResult<PageResponse<AuditLogEntry>> {
        self.audit_repo
            .list_by_entity(entity_type, entity_id, page)
            .await
    }
}
