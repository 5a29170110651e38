//! Storage file entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::{BucketType, FileStatus};

/// A versioned file tracked by Depot.
///
/// The row holds metadata only; content lives in the object store, one
/// object per version. `(bucket_type, bucket_id, logical_path)` is unique
/// among rows, so a path identifies at most one live file per bucket.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StorageFile {
    /// Unique file identifier.
    pub id: Uuid,
    /// Scope the file belongs to.
    pub bucket_type: BucketType,
    /// Owner of the scope (user, organization, or project id).
    pub bucket_id: Uuid,
    /// Logical path within the bucket (e.g. `"designs/2026/panel.dwg"`).
    pub logical_path: String,
    /// Display file name (including extension).
    pub filename: String,
    /// The user who created the file.
    pub owner_id: Uuid,
    /// MIME type of the file content.
    pub mime_type: Option<String>,
    /// Size in bytes of the current version's content.
    pub size: i64,
    /// Lifecycle status.
    pub status: FileStatus,
    /// The version currently served to readers. Advanced only on approval.
    pub current_version_id: Option<Uuid>,
    /// For draft copies, the file this draft was copied from.
    pub source_file_id: Option<Uuid>,
    /// Free-form tags (JSON array of strings).
    pub tags: Option<serde_json::Value>,
    /// Set when every recorded version of this file is corrupted.
    pub degraded: bool,
    /// When the file was created.
    pub created_at: DateTime<Utc>,
    /// When the file was last updated.
    pub updated_at: DateTime<Utc>,
}

impl StorageFile {
    /// Get the file extension (lowercase), if any.
    pub fn extension(&self) -> Option<String> {
        self.filename
            .rsplit('.')
            .next()
            .filter(|ext| *ext != self.filename)
            .map(|ext| ext.to_lowercase())
    }

    /// Whether this file is a working draft produced by copy-and-lock.
    pub fn is_draft_copy(&self) -> bool {
        self.source_file_id.is_some() && matches!(self.status, FileStatus::Draft)
    }
}

/// Data required to create a new file record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFile {
    /// Scope the file belongs to.
    pub bucket_type: BucketType,
    /// Owner of the scope.
    pub bucket_id: Uuid,
    /// Logical path within the bucket.
    pub logical_path: String,
    /// Display file name.
    pub filename: String,
    /// The creating user.
    pub owner_id: Uuid,
    /// MIME type.
    pub mime_type: Option<String>,
    /// Size in bytes.
    pub size: i64,
    /// Initial status.
    pub status: FileStatus,
    /// Source file when this record is a draft copy.
    pub source_file_id: Option<Uuid>,
    /// Free-form tags.
    pub tags: Option<serde_json::Value>,
}

/// Mutable metadata fields of a file.
///
/// `None` leaves the corresponding column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFileMetadata {
    /// New display name.
    pub filename: Option<String>,
    /// New MIME type.
    pub mime_type: Option<String>,
    /// Replacement tag set.
    pub tags: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> StorageFile {
        StorageFile {
            id: Uuid::new_v4(),
            bucket_type: BucketType::Personal,
            bucket_id: Uuid::new_v4(),
            logical_path: "reports/q3.pdf".to_string(),
            filename: "q3.pdf".to_string(),
            owner_id: Uuid::new_v4(),
            mime_type: Some("application/pdf".to_string()),
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

    #[test]
    fn test_extension() {
        let file = sample_file();
        assert_eq!(file.extension(), Some("pdf".to_string()));
    }

    #[test]
    fn test_draft_copy_requires_source_and_status() {
        let mut file = sample_file();
        assert!(!file.is_draft_copy());
        file.source_file_id = Some(Uuid::new_v4());
        assert!(!file.is_draft_copy());
        file.status = FileStatus::Draft;
        assert!(file.is_draft_copy());
    }
}
