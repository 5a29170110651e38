//! # depot-storage
//!
//! Object store adapter for Depot. Content bytes live in an S3-compatible
//! store (AWS S3 or MinIO), one immutable object per file version; this
//! crate implements the `ObjectStore` trait over that store and owns the
//! object key scheme.

pub mod keys;
pub mod s3;

pub use s3::S3ObjectStore;
