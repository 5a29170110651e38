//! File lock entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An exclusive edit lock on a file.
///
/// At most one lock exists per file, enforced by a unique constraint on
/// `file_id`. Releasing a lock deletes the row; there is no soft state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileLock {
    /// Unique lock identifier.
    pub id: Uuid,
    /// The locked file.
    pub file_id: Uuid,
    /// The user holding the lock.
    pub locked_by: Uuid,
    /// When the lock was acquired.
    pub locked_at: DateTime<Utc>,
    /// Optional free-form reason stated at acquisition.
    pub reason: Option<String>,
    /// Whether an administrator acquired this lock by force.
    pub forced: bool,
}

impl FileLock {
    /// Whether `user_id` holds this lock.
    pub fn is_held_by(&self, user_id: Uuid) -> bool {
        self.locked_by == user_id
    }
}

/// Data required to acquire a lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFileLock {
    /// The file to lock.
    pub file_id: Uuid,
    /// The acquiring user.
    pub locked_by: Uuid,
    /// Optional reason.
    pub reason: Option<String>,
    /// Whether this is an administrative forced acquisition.
    pub forced: bool,
}

/// A lock annotated with its health, as shown in administrative listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockStatus {
    /// The lock row.
    pub lock: FileLock,
    /// Logical path of the locked file.
    pub logical_path: String,
    /// True when the lock has no live draft behind it.
    pub orphaned: bool,
}
