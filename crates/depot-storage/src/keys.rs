//! Object key construction.
//!
//! Every version of a file gets its own object under a fresh key; keys are
//! never reused, so an interrupted write can at worst leave an orphan
//! object, never clobber committed content.

use uuid::Uuid;

use depot_entity::file::status::BucketType;

/// Build a fresh object key for a new file version.
///
/// Layout: `{bucket_type}/{bucket_id}/{logical_path}/{uuid}`. The trailing
/// UUID makes the key unique even when the same logical path is written
/// repeatedly.
pub fn version_key(bucket_type: BucketType, bucket_id: Uuid, logical_path: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        bucket_type.as_str(),
        bucket_id,
        logical_path.trim_matches('/'),
        Uuid::new_v4()
    )
}

/// The key prefix covering every object in a bucket scope.
pub fn bucket_prefix(bucket_type: BucketType, bucket_id: Uuid) -> String {
    format!("{}/{}/", bucket_type.as_str(), bucket_id)
}
