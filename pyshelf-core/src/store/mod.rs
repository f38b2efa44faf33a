//! PackageStore: blob storage behind the index.
//!
//! Objects live in a flat `{bucket}/{filename}` namespace. Buckets are
//! logical partitions inside one physical store; neither a bucket name nor a
//! filename may contain `/` (the upload gate rejects such filenames before
//! they reach here, and the helpers assert it as a contract check).
//!
//! All methods deal in raw bytes. No retries: transient storage errors
//! surface unchanged and the caller decides fallback behavior.

pub mod memory;
pub mod s3;

use async_trait::async_trait;

/// Errors from raw storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blob storage namespaced by bucket.
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// Check whether a file exists in the bucket.
    async fn exists(&self, bucket: &str, filename: &str) -> Result<bool, StoreError>;

    /// Write a file into the bucket, creating or overwriting.
    async fn write(&self, bucket: &str, filename: &str, data: Vec<u8>) -> Result<(), StoreError>;

    /// Read the full contents of a file.
    async fn read(&self, bucket: &str, filename: &str) -> Result<Vec<u8>, StoreError>;

    /// List all filenames in the bucket starting with `prefix`.
    ///
    /// Order is not guaranteed; callers sort. An empty or unknown bucket
    /// yields an empty list, never an error.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Object key for a file: `{bucket}/{filename}`.
pub(crate) fn object_key(bucket: &str, filename: &str) -> String {
    assert!(!bucket.contains('/'), "bucket must not contain '/'");
    assert!(!filename.contains('/'), "filename must not contain '/'");
    format!("{bucket}/{filename}")
}

/// Key prefix for listing a bucket: `{bucket}/{prefix}`.
pub(crate) fn key_prefix(bucket: &str, prefix: &str) -> String {
    // Same shape as object_key, but prefix may be empty.
    assert!(!bucket.contains('/'), "bucket must not contain '/'");
    assert!(!prefix.contains('/'), "prefix must not contain '/'");
    format!("{bucket}/{prefix}")
}
