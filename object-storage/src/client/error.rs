//! Error types for storage operations

use std::time::Duration;

use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::delete_object::DeleteObjectError;
use thiserror::Error;

use crate::uploader::UploadError;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Error types for storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Client configuration rejected during construction
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    /// Error uploading an object
    #[error("Failed to upload object to S3")]
    Upload(#[from] UploadError),

    /// Error deleting an object from S3
    #[error("Failed to delete object from S3")]
    DeleteObject(#[from] SdkError<DeleteObjectError>),

    /// Operation exceeded the configured timeout
    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),
}

impl StorageError {
    /// Checks if this error represents an expired per-call timeout
    ///
    /// Timed-out operations left no partial object behind and are safe for
    /// the caller to retry.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Upload(UploadError::Timeout(_))
        )
    }

    /// Checks if this error represents an upstream (5xx) error
    #[must_use]
    pub fn is_upstream_error(&self) -> bool {
        match self {
            Self::DeleteObject(sdk_err) => Self::check_sdk_error_status(sdk_err),
            Self::Upload(UploadError::PutObject(sdk_err)) => Self::check_sdk_error_status(sdk_err),
            Self::Upload(UploadError::CreateMultipart(sdk_err)) => {
                Self::check_sdk_error_status(sdk_err)
            }
            Self::Upload(UploadError::UploadPart { source, .. }) => {
                Self::check_sdk_error_status(source)
            }
            Self::Upload(UploadError::CompleteMultipart(sdk_err)) => {
                Self::check_sdk_error_status(sdk_err)
            }
            _ => false,
        }
    }

    fn check_sdk_error_status<E>(sdk_err: &SdkError<E>) -> bool {
        if let SdkError::ServiceError(err) = sdk_err {
            let raw = err.raw();
            let status = raw.status();
            return status.as_u16() >= 500;
        }
        false
    }
}
