//! File lock entities.

pub mod model;

pub use model::{CreateFileLock, FileLock, LockStatus};
