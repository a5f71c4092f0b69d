//! Error types for upload operations

use std::time::Duration;

use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::abort_multipart_upload::AbortMultipartUploadError;
use aws_sdk_s3::operation::complete_multipart_upload::CompleteMultipartUploadError;
use aws_sdk_s3::operation::create_multipart_upload::CreateMultipartUploadError;
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::operation::upload_part::UploadPartError;
use thiserror::Error;

/// Result type alias for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Error types for upload operations
#[derive(Error, Debug)]
pub enum UploadError {
    /// Error reading the upload body stream
    #[error("Failed to read upload body: {0}")]
    BodyRead(#[from] std::io::Error),

    /// Error uploading a small object in a single request
    #[error("Failed to put object")]
    PutObject(#[from] SdkError<PutObjectError>),

    /// Error starting a multipart upload
    #[error("Failed to create multipart upload")]
    CreateMultipart(#[from] SdkError<CreateMultipartUploadError>),

    /// Error uploading a single part
    #[error("Failed to upload part {part_number}")]
    UploadPart {
        /// Number of the part that failed
        part_number: i32,
        /// Underlying SDK error
        #[source]
        source: SdkError<UploadPartError>,
    },

    /// Error completing a multipart upload
    #[error("Failed to complete multipart upload")]
    CompleteMultipart(#[from] SdkError<CompleteMultipartUploadError>),

    /// Error aborting a multipart upload
    #[error("Failed to abort multipart upload {upload_id}")]
    AbortMultipart {
        /// Id of the multipart upload that could not be aborted
        upload_id: String,
        /// Underlying SDK error
        #[source]
        source: SdkError<AbortMultipartUploadError>,
    },

    /// Backend accepted the multipart upload but returned no upload id
    #[error("Multipart upload response missing upload id")]
    MissingUploadId,

    /// Backend returned no `ETag` for an uploaded part
    #[error("No ETag returned for part {0}")]
    MissingETag(i32),

    /// Body requires more parts than the backend allows
    #[error("Upload exceeds the part limit; increase the part size")]
    TooManyParts,

    /// A part upload task failed to run to completion
    #[error("Part upload task failed")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// Upload exceeded the configured timeout
    #[error("Upload timed out after {0:?}")]
    Timeout(Duration),
}
