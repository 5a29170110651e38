//! # depot-access
//!
//! Authorization for Depot buckets. Personal and organizational rules are
//! decided locally; project buckets are delegated to an external project
//! access service. The gate always fails closed: when the remote service
//! cannot answer, access is refused with a distinct "unavailable" outcome
//! rather than denied or silently allowed.

pub mod decision;
pub mod gate;
pub mod project;

pub use decision::{AccessAction, AccessDecision};
pub use gate::AccessGate;
pub use project::ProjectAccessClient;
