//! Concurrent multipart upload orchestration
//!
//! The uploader reads the body stream in fixed-size chunks and decides
//! between a single `PutObject` request and a multipart upload: a body that
//! ends within the first chunk is uploaded in one shot, anything larger is
//! split into parts of exactly the configured size (except the final part)
//! with up to the configured number of part uploads in flight at once. The
//! backend assembles parts by part number, so completion order of the
//! concurrent uploads does not matter. A multipart upload that fails or
//! times out is aborted so no orphaned parts are left on the backing store.

mod error;

use std::sync::Arc;
use std::time::Duration;

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client as S3Client;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time;
use tracing::{debug, error, Instrument};

pub use error::{UploadError, UploadResult};

/// Maximum number of parts the backend accepts per multipart upload
const MAX_PARTS: i32 = 10_000;

/// Bound on the abort request issued after a failed or timed-out upload
const ABORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a successful upload
#[derive(Debug, Clone)]
pub struct UploadedObject {
    /// URL of the stored object
    pub location: String,
    /// `ETag` reported by the backend, when available
    pub e_tag: Option<String>,
}

/// Concurrent multipart uploader for S3-compatible backends
#[derive(Debug, Clone)]
pub struct Uploader {
    client: Arc<S3Client>,
    endpoint: String,
    part_size: usize,
    concurrency: usize,
}

impl Uploader {
    /// Creates a new uploader
    ///
    /// # Arguments
    ///
    /// * `client` - Pre-configured S3 client
    /// * `endpoint` - Base endpoint URL used to derive object locations
    /// * `part_size` - Multipart chunk size in bytes
    /// * `concurrency` - Maximum number of simultaneous part uploads
    #[must_use]
    pub const fn new(
        client: Arc<S3Client>,
        endpoint: String,
        part_size: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            client,
            endpoint,
            part_size,
            concurrency,
        }
    }

    /// Multipart chunk size in bytes
    #[must_use]
    pub const fn part_size(&self) -> usize {
        self.part_size
    }

    /// Maximum number of simultaneous part uploads
    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Uploads a body stream to `bucket`/`key` within `timeout`
    ///
    /// The bound covers the whole upload including the retries the SDK
    /// performs internally. When it expires, in-flight part uploads are
    /// cancelled and any started multipart upload is aborted before the
    /// timeout error is returned.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Timeout` when the bound expires, otherwise the
    /// first failure encountered while reading the body or talking to the
    /// backend, with its cause preserved.
    pub async fn upload<R>(
        &self,
        bucket: &str,
        key: &str,
        body: R,
        timeout: Duration,
    ) -> UploadResult<UploadedObject>
    where
        R: AsyncRead + Send + Unpin,
    {
        let in_progress = Mutex::new(None);

        match time::timeout(timeout, self.run(bucket, key, body, &in_progress)).await {
            Ok(Ok(uploaded)) => Ok(uploaded),
            Ok(Err(err)) => {
                self.cleanup(bucket, key, &in_progress).await;
                Err(err)
            }
            Err(_elapsed) => {
                self.cleanup(bucket, key, &in_progress).await;
                Err(UploadError::Timeout(timeout))
            }
        }
    }

    async fn run<R>(
        &self,
        bucket: &str,
        key: &str,
        mut body: R,
        in_progress: &Mutex<Option<String>>,
    ) -> UploadResult<UploadedObject>
    where
        R: AsyncRead + Send + Unpin,
    {
        let first = read_part(&mut body, self.part_size).await?;

        // A body that ends within the first chunk fits a single request
        if first.len() < self.part_size {
            return self.put_single(bucket, key, first).await;
        }

        self.put_multipart(bucket, key, body, first, in_progress)
            .await
    }

    async fn put_single(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
    ) -> UploadResult<UploadedObject> {
        let size = data.len();
        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await?;

        debug!("Uploaded {} byte object to {}/{}", size, bucket, key);

        Ok(UploadedObject {
            location: self.object_url(bucket, key),
            e_tag: output.e_tag().map(std::string::ToString::to_string),
        })
    }

    #[allow(clippy::cognitive_complexity)]
    async fn put_multipart<R>(
        &self,
        bucket: &str,
        key: &str,
        mut body: R,
        first: Bytes,
        in_progress: &Mutex<Option<String>>,
    ) -> UploadResult<UploadedObject>
    where
        R: AsyncRead + Send + Unpin,
    {
        let create = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;

        let upload_id = create
            .upload_id()
            .ok_or(UploadError::MissingUploadId)?
            .to_string();
        *in_progress.lock().await = Some(upload_id.clone());

        debug!("Started multipart upload {} for {}/{}", upload_id, bucket, key);

        let mut tasks: JoinSet<UploadResult<CompletedPart>> = JoinSet::new();
        let mut completed = Vec::new();
        let mut part_number: i32 = 0;
        let mut chunk = first;

        while !chunk.is_empty() {
            // Reading the next chunk only once a slot frees up bounds
            // buffered memory at roughly concurrency * part_size
            if tasks.len() >= self.concurrency {
                if let Some(joined) = tasks.join_next().await {
                    completed.push(joined??);
                }
            }

            if part_number >= MAX_PARTS {
                return Err(UploadError::TooManyParts);
            }
            part_number += 1;

            let final_part = chunk.len() < self.part_size;
            tasks.spawn(
                upload_part(
                    Arc::clone(&self.client),
                    bucket.to_owned(),
                    key.to_owned(),
                    upload_id.clone(),
                    part_number,
                    chunk,
                )
                .instrument(tracing::Span::current()),
            );

            if final_part {
                break;
            }
            chunk = read_part(&mut body, self.part_size).await?;
        }

        while let Some(joined) = tasks.join_next().await {
            completed.push(joined??);
        }

        // The backend assembles the object by part number, not by the order
        // the concurrent uploads finished in
        completed.sort_by_key(CompletedPart::part_number);

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await?;
        *in_progress.lock().await = None;

        debug!(
            "Completed multipart upload {} ({} parts) for {}/{}",
            upload_id, part_number, bucket, key
        );

        Ok(UploadedObject {
            location: output
                .location()
                .map_or_else(|| self.object_url(bucket, key), ToString::to_string),
            e_tag: output.e_tag().map(std::string::ToString::to_string),
        })
    }

    /// Aborts the started multipart upload, if any, under its own bound so
    /// cleanup still runs when the call's deadline has already passed
    async fn cleanup(&self, bucket: &str, key: &str, in_progress: &Mutex<Option<String>>) {
        let Some(upload_id) = in_progress.lock().await.take() else {
            return;
        };

        match time::timeout(ABORT_TIMEOUT, self.abort(bucket, key, &upload_id)).await {
            Ok(Ok(())) => debug!("Aborted multipart upload {}", upload_id),
            Ok(Err(err)) => error!("Failed to abort multipart upload {}: {}", upload_id, err),
            Err(_elapsed) => error!("Timed out aborting multipart upload {}", upload_id),
        }
    }

    async fn abort(&self, bucket: &str, key: &str, upload_id: &str) -> UploadResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|source| UploadError::AbortMultipart {
                upload_id: upload_id.to_string(),
                source,
            })?;

        Ok(())
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{bucket}/{key}", self.endpoint)
    }
}

/// Uploads one part and records its `ETag` for the completion request
async fn upload_part(
    client: Arc<S3Client>,
    bucket: String,
    key: String,
    upload_id: String,
    part_number: i32,
    data: Bytes,
) -> UploadResult<CompletedPart> {
    let size = data.len();
    let output = client
        .upload_part()
        .bucket(&bucket)
        .key(&key)
        .upload_id(&upload_id)
        .part_number(part_number)
        .body(ByteStream::from(data))
        .send()
        .await
        .map_err(|source| UploadError::UploadPart {
            part_number,
            source,
        })?;

    let e_tag = output
        .e_tag()
        .ok_or(UploadError::MissingETag(part_number))?
        .to_string();

    debug!("Uploaded part {} ({} bytes)", part_number, size);

    Ok(CompletedPart::builder()
        .e_tag(e_tag)
        .part_number(part_number)
        .build())
}

/// Reads up to `part_size` bytes from the stream; a short chunk means the
/// stream is exhausted
async fn read_part<R>(body: &mut R, part_size: usize) -> std::io::Result<Bytes>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = BytesMut::with_capacity(part_size);
    while buf.len() < part_size {
        let remaining = part_size - buf.len();
        let n = body.read_buf(&mut (&mut buf).limit(remaining)).await?;
        if n == 0 {
            break;
        }
    }
    Ok(buf.freeze())
}
