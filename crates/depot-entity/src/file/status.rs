//! File status and bucket type enumerations.

use depot_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The scope a file belongs to.
///
/// The bucket type decides which authorization rule applies to the file;
/// the paired `bucket_id` names the concrete owner of that scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "bucket_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BucketType {
    /// Visible only to the single user whose id equals `bucket_id`.
    Personal,
    /// Visible to every member of the organization `bucket_id`.
    Organizational,
    /// Governed by the external project access service for project `bucket_id`.
    Project,
}

impl BucketType {
    /// Return the bucket type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Organizational => "organizational",
            Self::Project => "project",
        }
    }
}

impl fmt::Display for BucketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "file_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// A working copy created by copy-and-lock, not yet committed.
    Draft,
    /// Record created, object bytes not yet confirmed in the store.
    UploadPending,
    /// A version was committed and awaits review.
    PendingValidation,
    /// The current version passed review.
    Approved,
    /// The current version was rejected outright.
    Rejected,
    /// Rejected with a request for a corrected version.
    RequiresRevision,
    /// Soft-deleted. Hidden from normal listings, restorable.
    Archived,
}

impl FileStatus {
    /// Whether a new editing cycle may start from this status.
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Rejected | Self::RequiresRevision
        )
    }

    /// Whether the file is visible in normal listings.
    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::Archived)
    }

    /// Validate a status transition, returning the target status.
    ///
    /// Transitions not produced by a workflow operation are rejected so a
    /// buggy caller cannot move a file into an inconsistent state.
    pub fn transition_to(&self, target: FileStatus) -> AppResult<FileStatus> {
        let allowed = match (self, target) {
            // Commit of a draft puts the source under review.
            (Self::Approved | Self::Rejected | Self::RequiresRevision, Self::PendingValidation) => {
                true
            }
            (Self::Draft, Self::PendingValidation) => true,
            (Self::UploadPending, Self::PendingValidation) => true,
            // Review outcomes.
            (Self::PendingValidation, Self::Approved) => true,
            (Self::PendingValidation, Self::Rejected) => true,
            (Self::PendingValidation, Self::RequiresRevision) => true,
            // A rejection that does not demand a new version falls back to
            // the previously approved content.
            (Self::RequiresRevision, Self::Approved) => true,
            // Soft delete and restore.
            (_, Self::Archived) => !matches!(self, Self::Archived),
            (Self::Archived, Self::Approved) => true,
            _ => false,
        };

        if allowed {
            Ok(target)
        } else {
            Err(AppError::conflict(format!(
                "Invalid file status transition: {self} -> {target}"
            )))
        }
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::UploadPending => "upload_pending",
            Self::PendingValidation => "pending_validation",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::RequiresRevision => "requires_revision",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
