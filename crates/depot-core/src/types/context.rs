//! Request context carrying the authenticated actor and captured request
//! metadata.
//!
//! The context is built once at the service boundary (from whatever decoded
//! the caller's token) and passed explicitly into every operation, so the
//! access gate and audit trail never reach into ambient state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context for the current authenticated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The authenticated user's ID.
    pub user_id: Uuid,
    /// The user's organization ID.
    pub org_id: Uuid,
    /// IP address of the request origin.
    pub ip_address: Option<String>,
    /// User-Agent header value.
    pub user_agent: Option<String>,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a new request context.
    pub fn new(
        user_id: Uuid,
        org_id: Uuid,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            user_id,
            org_id,
            ip_address,
            user_agent,
            request_time: Utc::now(),
        }
    }

    /// Context for system-initiated work (reconciliation, scheduled jobs).
    pub fn system() -> Self {
        Self::new(Uuid::nil(), Uuid::nil(), None, None)
    }
}
