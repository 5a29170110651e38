//! Object-store capability trait.
//!
//! Depot treats the object store as content-addressable-by-key storage:
//! every write targets a fresh key and nothing is ever overwritten in place.
//! The trait is defined here in `depot-core` and implemented in
//! `depot-storage`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::result::AppResult;

/// Metadata about a stored object.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ObjectMeta {
    /// Key within the object store.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type (if known).
    pub mime_type: Option<String>,
    /// ETag reported by the store (if any).
    pub etag: Option<String>,
    /// Last modified timestamp.
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
}

/// Trait for the S3-compatible object store backend.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug + 'static {
    /// Check whether the backend is healthy and reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Write bytes under the given key.
    async fn put(&self, key: &str, data: Bytes) -> AppResult<()>;

    /// Read the complete object stored under the given key.
    ///
    /// A missing key is a `NotFound` error, not an empty payload.
    async fn get(&self, key: &str) -> AppResult<Bytes>;

    /// Copy an object from one key to another within the store.
    async fn copy(&self, from: &str, to: &str) -> AppResult<()>;

    /// Delete the object stored under the given key.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Stat an object. Returns `Ok(None)` when the key does not exist,
    /// reserving `Err` for genuine transport/backend failures so callers
    /// (the reconciliation engine in particular) can tell "absent" from
    /// "couldn't check."
    async fn stat(&self, key: &str) -> AppResult<Option<ObjectMeta>>;

    /// List all objects whose key starts with the given prefix.
    async fn list(&self, prefix: &str) -> AppResult<Vec<ObjectMeta>>;

    /// Issue a presigned URL for uploading to the given key.
    async fn presign_put(&self, key: &str, expires_in: Duration) -> AppResult<String>;

    /// Issue a presigned URL for downloading the given key.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> AppResult<String>;
}
