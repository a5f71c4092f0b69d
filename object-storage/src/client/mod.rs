//! Client facade for S3-compatible object stores
//!
//! The client is built once from an [`Environment`] plus builder options and
//! is immutable afterwards: it can be cloned and shared freely between tasks
//! issuing independent `put`/`delete` calls.

mod error;

use std::sync::Arc;
use std::time::Duration;

use aws_sdk_s3::Client as S3Client;
use tokio::io::AsyncRead;
use tokio::time;
use tracing::{debug, info, Instrument, Span};

use crate::types::Environment;
use crate::uploader::{UploadError, UploadedObject, Uploader};

pub use error::{StorageError, StorageResult};

/// Default per-call request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default multipart chunk size (8 MiB)
pub const DEFAULT_PART_SIZE: usize = 8 * 1024 * 1024;

/// Default number of simultaneous part uploads
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Client for uploading and deleting objects in an S3-compatible store
#[derive(Debug, Clone)]
pub struct ObjectStorage {
    client: Arc<S3Client>,
    uploader: Uploader,
    timeout: Duration,
    span: Span,
}

impl ObjectStorage {
    /// Creates a builder with default settings
    #[must_use]
    pub fn builder() -> ObjectStorageBuilder {
        ObjectStorageBuilder::default()
    }

    /// Per-call request timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Multipart chunk size in bytes
    #[must_use]
    pub const fn part_size(&self) -> usize {
        self.uploader.part_size()
    }

    /// Maximum number of simultaneous part uploads
    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.uploader.concurrency()
    }

    /// Uploads a body stream to `bucket`/`key`, overwriting any existing
    /// object, and returns the stored object's location
    ///
    /// Bodies larger than the configured part size are uploaded as a
    /// multipart upload with concurrent part uploads; smaller bodies go out
    /// as a single request. Either way the object becomes visible in full or
    /// not at all.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Timeout` when the configured per-call timeout
    /// expires (already-uploaded parts are aborted first), or
    /// `StorageError::Upload` with the cause preserved when the body stream
    /// or the backend fails.
    pub async fn put<R>(&self, bucket: &str, key: &str, body: R) -> StorageResult<UploadedObject>
    where
        R: AsyncRead + Send + Unpin,
    {
        debug!(parent: &self.span, "Uploading object to {}/{}", bucket, key);

        let uploaded = self
            .uploader
            .upload(bucket, key, body, self.timeout)
            .instrument(self.span.clone())
            .await
            .map_err(|err| match err {
                UploadError::Timeout(bound) => StorageError::Timeout(bound),
                other => StorageError::Upload(other),
            })?;

        info!(parent: &self.span, "Uploaded object to {}", uploaded.location);

        Ok(uploaded)
    }

    /// Deletes the object at `bucket`/`key`
    ///
    /// Deletion is idempotent: the backend reports success for a nonexistent
    /// key, so only genuine failures (timeout, network, permission) surface.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Timeout` when the configured per-call timeout
    /// expires, or `StorageError::DeleteObject` when the backend rejects the
    /// request.
    pub async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        debug!(parent: &self.span, "Deleting object {}/{}", bucket, key);

        let request = self
            .client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .instrument(self.span.clone());

        match time::timeout(self.timeout, request).await {
            Ok(Ok(_output)) => {
                debug!(parent: &self.span, "Deleted object {}/{}", bucket, key);
                Ok(())
            }
            Ok(Err(err)) => Err(StorageError::DeleteObject(err)),
            Err(_elapsed) => Err(StorageError::Timeout(self.timeout)),
        }
    }
}

/// Builder for [`ObjectStorage`]
///
/// Every setter overrides exactly one field; applying the same option twice
/// keeps the last value. Validation happens in [`ObjectStorageBuilder::build`].
#[derive(Debug)]
pub struct ObjectStorageBuilder {
    timeout: Duration,
    part_size: usize,
    concurrency: usize,
    span: Span,
}

impl Default for ObjectStorageBuilder {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            part_size: DEFAULT_PART_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            span: Span::none(),
        }
    }
}

impl ObjectStorageBuilder {
    /// Overrides the per-call request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the diagnostic span client operations are recorded under
    #[must_use]
    pub fn span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Overrides the multipart chunk size in bytes
    #[must_use]
    pub const fn part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size;
        self
    }

    /// Overrides the maximum number of simultaneous part uploads
    #[must_use]
    pub const fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Builds the client, resolving the base cloud configuration for the
    /// given environment
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidConfig` if the part size or concurrency
    /// is zero.
    pub async fn build(self, environment: &Environment) -> StorageResult<ObjectStorage> {
        if self.part_size == 0 {
            return Err(StorageError::InvalidConfig(
                "part size must be positive".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(StorageError::InvalidConfig(
                "concurrency must be positive".to_string(),
            ));
        }

        let shared_config = environment.aws_config().await;

        let endpoint = environment.override_aws_endpoint_url().map_or_else(
            || {
                let region = shared_config
                    .region()
                    .map_or_else(|| "us-east-1".to_string(), |r| r.as_ref().to_string());
                format!("https://s3.{region}.amazonaws.com")
            },
            |url| url.trim_end_matches('/').to_string(),
        );

        // Bucket names go into the URL path rather than a subdomain so the
        // client works against non-AWS S3-compatible backends
        let s3_config: aws_sdk_s3::Config = (&shared_config).into();
        let mut s3_builder = s3_config.to_builder();
        s3_builder.set_force_path_style(Some(true));
        let client = Arc::new(S3Client::from_conf(s3_builder.build()));

        info!(
            parent: &self.span,
            "Initialized object storage client ({} byte parts, concurrency {})",
            self.part_size,
            self.concurrency
        );

        Ok(ObjectStorage {
            uploader: Uploader::new(
                Arc::clone(&client),
                endpoint,
                self.part_size,
                self.concurrency,
            ),
            client,
            timeout: self.timeout,
            span: self.span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builder_defaults() {
        let storage = ObjectStorage::builder()
            .build(&Environment::Development)
            .await
            .unwrap();

        assert_eq!(storage.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(storage.part_size(), DEFAULT_PART_SIZE);
        assert_eq!(storage.concurrency(), DEFAULT_CONCURRENCY);
    }

    #[tokio::test]
    async fn test_last_applied_option_wins() {
        let storage = ObjectStorage::builder()
            .timeout(Duration::from_secs(5))
            .part_size(1024)
            .timeout(Duration::from_secs(2))
            .build(&Environment::Development)
            .await
            .unwrap();

        assert_eq!(storage.timeout(), Duration::from_secs(2));
        assert_eq!(storage.part_size(), 1024);
    }

    #[tokio::test]
    async fn test_zero_part_size_rejected() {
        let result = ObjectStorage::builder()
            .part_size(0)
            .build(&Environment::Development)
            .await;

        assert!(matches!(result, Err(StorageError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected() {
        let result = ObjectStorage::builder()
            .concurrency(0)
            .build(&Environment::Development)
            .await;

        assert!(matches!(result, Err(StorageError::InvalidConfig(_))));
    }

    #[test]
    fn test_timeout_classification() {
        let err = StorageError::Timeout(Duration::from_secs(1));
        assert!(err.is_timeout());

        let err = StorageError::Upload(UploadError::Timeout(Duration::from_secs(1)));
        assert!(err.is_timeout());

        let err = StorageError::InvalidConfig("part size must be positive".to_string());
        assert!(!err.is_timeout());
        assert!(!err.is_upstream_error());
    }
}
