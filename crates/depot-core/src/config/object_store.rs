//! Object store configuration.

use serde::{Deserialize, Serialize};

/// S3-compatible object storage configuration (AWS S3 or MinIO).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Endpoint URL (empty for AWS S3, set for MinIO and compatibles).
    #[serde(default)]
    pub endpoint: String,
    /// Region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Bucket name holding all Depot objects.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Access key ID (empty to use the ambient credential chain).
    #[serde(default)]
    pub access_key: String,
    /// Secret access key.
    #[serde(default)]
    pub secret_key: String,
    /// Whether to address the bucket path-style (required by MinIO).
    #[serde(default = "default_true")]
    pub force_path_style: bool,
    /// Presigned URL lifetime in seconds.
    #[serde(default = "default_presign_expiry")]
    pub presign_expiry_seconds: u64,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: default_region(),
            bucket: default_bucket(),
            access_key: String::new(),
            secret_key: String::new(),
            force_path_style: true,
            presign_expiry_seconds: default_presign_expiry(),
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket() -> String {
    "depot".to_string()
}

fn default_true() -> bool {
    true
}

fn default_presign_expiry() -> u64 {
    3600
}
