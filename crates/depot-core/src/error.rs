//! Unified application error types for Depot.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. Each [`ErrorKind`] carries a stable
//! machine-readable code plus the HTTP status an edge layer would map it to,
//! so collaborating services can tell a definite "no" from "couldn't ask."

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested file, version, or lock was not found.
    NotFound,
    /// The caller does not have permission to perform the action (local rule
    /// violation or an explicit deny from the project access service).
    AccessDenied,
    /// The project access service timed out or failed; treated as a deny but
    /// reported distinctly so clients can decide whether to retry later.
    AccessUnavailable,
    /// The file is already locked by another actor.
    LockConflict,
    /// The lock vanished between acquisition and use.
    LockExpired,
    /// A concurrent commit advanced the file past the caller's baseline.
    VersionConflict,
    /// The validation record is not in the state the operation requires.
    ValidationConflict,
    /// A referenced object is missing from the object store.
    Corrupted,
    /// A generic conflict (duplicate path, destination already exists).
    Conflict,
    /// Input validation failed.
    Validation,
    /// A database error occurred.
    Database,
    /// An object-store I/O error occurred.
    Storage,
    /// An external service error occurred.
    ExternalService,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal error occurred.
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::AccessUnavailable => "ACCESS_UNAVAILABLE",
            Self::LockConflict => "LOCK_CONFLICT",
            Self::LockExpired => "LOCK_EXPIRED",
            Self::VersionConflict => "VERSION_CONFLICT",
            Self::ValidationConflict => "VALIDATION_CONFLICT",
            Self::Corrupted => "CORRUPTED",
            Self::Conflict => "CONFLICT",
            Self::Validation => "VALIDATION_ERROR",
            Self::Database => "DATABASE",
            Self::Storage => "STORAGE",
            Self::ExternalService => "EXTERNAL_SERVICE",
            Self::Configuration => "CONFIGURATION",
            Self::Serialization => "SERIALIZATION",
            Self::Internal => "INTERNAL",
        }
    }

    /// The HTTP status an edge layer maps this kind to.
    ///
    /// `AccessUnavailable` deliberately maps to 503 rather than 403 so a
    /// client can distinguish "no" from "couldn't ask."
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::AccessDenied => 403,
            Self::AccessUnavailable => 503,
            Self::LockConflict
            | Self::LockExpired
            | Self::VersionConflict
            | Self::ValidationConflict
            | Self::Conflict => 409,
            Self::Corrupted => 404,
            Self::Validation => 400,
            Self::ExternalService => 502,
            _ => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The unified application error used throughout Depot.
///
/// All crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls. This provides a single error type for
/// the entire application boundary.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create an access-denied error.
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccessDenied, message)
    }

    /// Create an access-unavailable error.
    pub fn access_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccessUnavailable, message)
    }

    /// Create a lock-conflict error.
    pub fn lock_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LockConflict, message)
    }

    /// Create a lock-expired error.
    pub fn lock_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LockExpired, message)
    }

    /// Create a version-conflict error.
    pub fn version_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::VersionConflict, message)
    }

    /// Create a validation-state-conflict error.
    pub fn validation_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationConflict, message)
    }

    /// Create a corrupted-object error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Corrupted, message)
    }

    /// Create a generic conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create an input-validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Create an external-service error.
    pub fn external_service(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExternalService, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Storage, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_is_distinct_from_denied() {
        assert_ne!(ErrorKind::AccessDenied.code(), ErrorKind::AccessUnavailable.code());
        assert_eq!(ErrorKind::AccessDenied.http_status(), 403);
        assert_eq!(ErrorKind::AccessUnavailable.http_status(), 503);
    }

    #[test]
    fn test_conflict_family_maps_to_409() {
        for kind in [
            ErrorKind::LockConflict,
            ErrorKind::LockExpired,
            ErrorKind::VersionConflict,
            ErrorKind::ValidationConflict,
            ErrorKind::Conflict,
        ] {
            assert_eq!(kind.http_status(), 409, "{kind} should map to 409");
        }
    }

    #[test]
    fn test_error_display_includes_code_and_message() {
        let err = AppError::lock_expired("Lock expired or removed");
        assert_eq!(err.to_string(), "LOCK_EXPIRED: Lock expired or removed");
    }
}
