//! File version entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An immutable version of a file's content.
///
/// Version rows are append-only. Numbers are assigned sequentially per
/// file by the database and are never reused, so a restore produces a new
/// highest version rather than rewriting history.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileVersion {
    /// Unique version identifier.
    pub id: Uuid,
    /// The file this version belongs to.
    pub file_id: Uuid,
    /// Sequential version number, unique per file.
    pub version_number: i32,
    /// Key of this version's content in the object store.
    pub object_key: String,
    /// Size in bytes.
    pub size: i64,
    /// MIME type at the time this version was written.
    pub mime_type: Option<String>,
    /// SHA-256 checksum of the content.
    pub checksum: Option<String>,
    /// Optional comment describing the change.
    pub changelog: Option<String>,
    /// Tags captured at commit time.
    pub tags: Option<serde_json::Value>,
    /// Set by reconciliation when the backing object is missing.
    pub corrupted: bool,
    /// User who created this version.
    pub created_by: Uuid,
    /// When this version was created.
    pub created_at: DateTime<Utc>,
}

/// Data required to record a new file version.
///
/// The version number is intentionally absent; the database assigns the
/// next number atomically at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFileVersion {
    /// The file the version belongs to.
    pub file_id: Uuid,
    /// Object store key of the content.
    pub object_key: String,
    /// Size in bytes.
    pub size: i64,
    /// MIME type.
    pub mime_type: Option<String>,
    /// SHA-256 checksum.
    pub checksum: Option<String>,
    /// Change description.
    pub changelog: Option<String>,
    /// Tags at commit time.
    pub tags: Option<serde_json::Value>,
    /// The committing user.
    pub created_by: Uuid,
}
