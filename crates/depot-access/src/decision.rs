//! Access decision types.

use serde::{Deserialize, Serialize};
use std::fmt;

use depot_core::error::AppError;
use depot_core::result::AppResult;

/// The action an access check is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessAction {
    /// Read file content or metadata.
    Read,
    /// Create or modify files, acquire locks, commit versions.
    Write,
    /// Decide validations.
    Review,
    /// Administrative operations (force-unlock, physical delete).
    Admin,
}

impl AccessAction {
    /// Return the action as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Review => "review",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for AccessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of an access check.
///
/// `Denied` and `Unavailable` are deliberately distinct: a denial is an
/// authorization answer, while unavailability means no answer could be
/// obtained and the caller should expect the operation to work again later
/// without any permission change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum AccessDecision {
    /// The action is permitted.
    Allowed,
    /// The action is not permitted.
    Denied {
        /// Human-readable reason for the denial.
        reason: String,
    },
    /// No authorization answer could be obtained.
    Unavailable {
        /// What prevented the check.
        reason: String,
    },
}

impl AccessDecision {
    /// Whether the decision permits the action.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Convert the decision into a result, mapping refusals onto the
    /// matching error kinds.
    pub fn into_result(self) -> AppResult<()> {
        match self {
            Self::Allowed => Ok(()),
            Self::Denied { reason } => Err(AppError::access_denied(reason)),
            Self::Unavailable { reason } => Err(AppError::access_unavailable(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::error::ErrorKind;

    #[test]
    fn test_denied_and_unavailable_map_to_distinct_kinds() {
        let denied = AccessDecision::Denied {
            reason: "not a member".to_string(),
        }
        .into_result()
        .unwrap_err();
        assert_eq!(denied.kind, ErrorKind::AccessDenied);

        let unavailable = AccessDecision::Unavailable {
            reason: "timeout".to_string(),
        }
        .into_result()
        .unwrap_err();
        assert_eq!(unavailable.kind, ErrorKind::AccessUnavailable);
    }

    #[test]
    fn test_allowed_is_ok() {
        assert!(AccessDecision::Allowed.into_result().is_ok());
    }
}
