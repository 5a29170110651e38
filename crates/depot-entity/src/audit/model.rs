//! Audit log entry entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An immutable audit log entry recording an action.
///
/// The table is append-only. Entries are never updated or deleted by the
/// application.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogEntry {
    /// Unique audit entry identifier.
    pub id: Uuid,
    /// The type of entity acted on (e.g. `"file"`, `"lock"`, `"validation"`).
    pub entity_type: String,
    /// The entity's identifier.
    pub entity_id: Uuid,
    /// The action performed (e.g. `"file.commit"`, `"lock.force_release"`).
    pub action: String,
    /// The user who performed the action.
    pub actor_id: Uuid,
    /// Additional details about the action (JSON).
    pub details: Option<serde_json::Value>,
    /// IP address of the actor.
    pub ip_address: Option<String>,
    /// User-Agent of the actor.
    pub user_agent: Option<String>,
    /// When the action occurred.
    pub created_at: DateTime<Utc>,
}

/// Data required to create a new audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLogEntry {
    /// The type of entity acted on.
    pub entity_type: String,
    /// The entity's identifier.
    pub entity_id: Uuid,
    /// The action performed.
    pub action: String,
    /// The acting user.
    pub actor_id: Uuid,
    /// Additional details.
    pub details: Option<serde_json::Value>,
    /// Actor's IP address.
    pub ip_address: Option<String>,
    /// Actor's User-Agent.
    pub user_agent: Option<String>,
}
