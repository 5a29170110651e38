//! File domain entities.

pub mod model;
pub mod status;
pub mod version;

pub use model::{CreateFile, StorageFile, UpdateFileMetadata};
pub use status::{BucketType, FileStatus};
pub use version::{CreateFileVersion, FileVersion};
