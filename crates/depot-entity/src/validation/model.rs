//! Validation entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// State of a validation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "validation_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ValidationState {
    /// Awaiting a reviewer decision.
    Pending,
    /// Reviewer approved the version.
    Approved,
    /// Reviewer rejected the version.
    Rejected,
}

impl ValidationState {
    /// Check if the validation has been decided.
    pub fn is_decided(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Return the state as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A review request for a specific file version.
///
/// A partial unique index permits at most one pending validation per
/// version; decided validations accumulate as review history.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Validation {
    /// Unique validation identifier.
    pub id: Uuid,
    /// The version under review.
    pub version_id: Uuid,
    /// Current state.
    pub state: ValidationState,
    /// The user who submitted the version for review.
    pub requested_by: Uuid,
    /// When review was requested.
    pub requested_at: DateTime<Utc>,
    /// The reviewer who decided, once decided.
    pub reviewed_by: Option<Uuid>,
    /// When the decision was made.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Reviewer comment.
    pub comment: Option<String>,
    /// On rejection, whether a corrected version is expected.
    pub require_new_version: Option<bool>,
}

/// Data required to open a validation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateValidation {
    /// The version to review.
    pub version_id: Uuid,
    /// The requesting user.
    pub requested_by: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_is_undecided() {
        assert!(!ValidationState::Pending.is_decided());
        assert!(ValidationState::Approved.is_decided());
        assert!(ValidationState::Rejected.is_decided());
    }
}
