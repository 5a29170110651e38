//! # depot-service
//!
//! Business logic service layer for Depot. Each service orchestrates
//! repositories, the object store, and the access gate to implement
//! application-level use cases.
//!
//! Services follow constructor injection — all dependencies are provided
//! at construction time via `Arc` references.

pub mod audit;
pub mod file;
pub mod lock;
pub mod reconcile;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::AuditTrail;
pub use file::{CreateFileRequest, CreatedUpload, FileInfo, FileService};
pub use lock::LockManager;
pub use reconcile::{ReconcileReport, ReconciliationEngine, ScanMode};
pub use workflow::{
    CommitOutcome, CopyAndLockOutcome, DraftDestination, RecordUploadOutcome, ReviewOutcome,
    VersionWorkflow,
};
