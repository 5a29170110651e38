//! Repository implementations for all Depot entities.

pub mod audit;
pub mod file;
pub mod lock;
pub mod traits;
pub mod validation;
pub mod version;

pub use audit::AuditLogRepository;
pub use file::FileRepository;
pub use lock::LockRepository;
pub use traits::{AuditStore, FileStore, LockStore, ValidationStore, VersionStore};
pub use validation::ValidationRepository;
pub use version::VersionRepository;
