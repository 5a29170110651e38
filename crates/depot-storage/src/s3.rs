//! S3-compatible object store implementation (AWS S3 or MinIO).

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, info};

use depot_core::config::object_store::ObjectStoreConfig;
use depot_core::error::{AppError, ErrorKind};
use depot_core::result::AppResult;
use depot_core::traits::object_store::{ObjectMeta, ObjectStore};

/// Object store backed by an S3-compatible service.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a store from configuration.
    ///
    /// An empty `endpoint` targets AWS S3 proper; a non-empty one targets a
    /// compatible service such as MinIO, which also needs path-style
    /// addressing.
    pub async fn new(config: &ObjectStoreConfig) -> AppResult<Self> {
        info!(
            endpoint = %config.endpoint,
            region = %config.region,
            bucket = %config.bucket,
            "Initializing S3 object store"
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if !config.access_key.is_empty() {
            loader = loader.credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "depot-config",
            ));
        }

        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style);
        if !config.endpoint.is_empty() {
            builder = builder.endpoint_url(config.endpoint.clone());
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        })
    }

    /// The bucket this store writes into.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn health_check(&self) -> AppResult<bool> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| true)
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Object store health check failed for bucket '{}'", self.bucket),
                    e,
                )
            })
    }

    async fn put(&self, key: &str, data: Bytes) -> AppResult<()> {
        debug!(key, size = data.len(), "Putting object");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(data.into())
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Storage, format!("Failed to put object '{key}'"), e)
            })?;
        Ok(())
    }

    async fn get(&self, key: &str) -> AppResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    AppError::not_found(format!("Object '{key}' not found"))
                } else {
                    AppError::with_source(
                        ErrorKind::Storage,
                        format!("Failed to get object '{key}'"),
                        e,
                    )
                }
            })?;

        let data = output.body.collect().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to read object body for '{key}'"),
                e,
            )
        })?;
        Ok(data.into_bytes())
    }

    async fn copy(&self, from: &str, to: &str) -> AppResult<()> {
        debug!(from, to, "Copying object");
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, from))
            .key(to)
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to copy object '{from}' to '{to}'"),
                    e,
                )
            })?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        debug!(key, "Deleting object");
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to delete object '{key}'"),
                    e,
                )
            })?;
        Ok(())
    }

    async fn stat(&self, key: &str) -> AppResult<Option<ObjectMeta>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(head) => Ok(Some(ObjectMeta {
                key: key.to_string(),
                size: head.content_length().unwrap_or(0).max(0) as u64,
                mime_type: head.content_type().map(str::to_string),
                etag: head.e_tag().map(str::to_string),
                last_modified: head
                    .last_modified()
                    .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), 0)),
            })),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(None),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to stat object '{key}'"),
                e,
            )),
        }
    }

    async fn list(&self, prefix: &str) -> AppResult<Vec<ObjectMeta>> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }

            let output = request.send().await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to list objects under '{prefix}'"),
                    e,
                )
            })?;

            for obj in output.contents() {
                if let Some(key) = obj.key() {
                    objects.push(ObjectMeta {
                        key: key.to_string(),
                        size: obj.size().unwrap_or(0).max(0) as u64,
                        mime_type: None,
                        etag: obj.e_tag().map(str::to_string),
                        last_modified: obj
                            .last_modified()
                            .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), 0)),
                    });
                }
            }

            match output.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(objects)
    }

    async fn presign_put(&self, key: &str, expires_in: Duration) -> AppResult<String> {
        let presigning = PresigningConfig::expires_in(expires_in).map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Invalid presign expiry", e)
        })?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to presign upload for '{key}'"),
                    e,
                )
            })?;
        Ok(request.uri().to_string())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> AppResult<String> {
        let presigning = PresigningConfig::expires_in(expires_in).map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Invalid presign expiry", e)
        })?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to presign download for '{key}'"),
                    e,
                )
            })?;
        Ok(request.uri().to_string())
    }
}
