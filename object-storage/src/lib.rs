//! Client for uploading and deleting objects in S3-compatible stores
//!
//! This crate wraps `aws-sdk-s3` behind a small options-driven builder and
//! two operations: [`ObjectStorage::put`] streams an object into a bucket,
//! transparently switching to a concurrent multipart upload for bodies
//! larger than the configured part size, and [`ObjectStorage::delete`]
//! removes a single object. Path-style addressing is always used so the
//! client works against non-AWS S3-compatible backends.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

/// Client facade and builder
pub mod client;

/// Common types for the storage client
pub mod types;

/// Multipart upload orchestration
pub mod uploader;

pub use client::{
    ObjectStorage, ObjectStorageBuilder, StorageError, StorageResult, DEFAULT_CONCURRENCY,
    DEFAULT_PART_SIZE, DEFAULT_TIMEOUT,
};
pub use types::Environment;
pub use uploader::{UploadError, UploadResult, UploadedObject, Uploader};
