//! Persistor abstraction trait
//!
//! This module defines the `Persistor` trait that all storage backends must
//! implement. One interface, two adapters (filesystem and S3-compatible
//! object store), selected once at startup by the factory.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::path::Path;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Persistor operation errors
#[derive(Debug, Error)]
pub enum PersistorError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for persistor operations
pub type PersistorResult<T> = Result<T, PersistorError>;

/// Outgoing object bytes, chunked.
pub type ObjectStream = Pin<Box<dyn Stream<Item = Result<Bytes, PersistorError>> + Send>>;

/// Incoming object bytes.
pub type ObjectSource = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Inclusive byte range for partial reads. `end` omitted means to EOF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

/// Storage backend contract
///
/// Keys are opaque strings scoped to a bucket. Every write is a whole-object
/// replace; there is no partial mutation. Both backends normalize their
/// native "missing object" signal (ENOENT / NoSuchKey) into
/// [`PersistorError::NotFound`], and `delete_file` is idempotent: deleting an
/// absent object succeeds.
#[async_trait]
pub trait Persistor: Send + Sync {
    /// Copy bytes from a local path into the backend, overwriting any
    /// existing object at the key.
    async fn send_file(&self, bucket: &str, key: &str, source: &Path) -> PersistorResult<()>;

    /// Same as [`send_file`](Self::send_file) but the source is a stream.
    async fn send_stream(
        &self,
        bucket: &str,
        key: &str,
        reader: ObjectSource,
    ) -> PersistorResult<()>;

    /// Open a read stream for the object, optionally restricted to an
    /// inclusive byte range.
    async fn get_file_stream(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> PersistorResult<ObjectStream>;

    /// Size in bytes of the object.
    async fn get_file_size(&self, bucket: &str, key: &str) -> PersistorResult<u64>;

    /// Server-side copy within the bucket, without a download round-trip.
    async fn copy_file(&self, bucket: &str, from_key: &str, to_key: &str) -> PersistorResult<()>;

    /// Remove one object. Succeeds if the object is already absent.
    async fn delete_file(&self, bucket: &str, key: &str) -> PersistorResult<()>;

    /// Remove every object whose key starts with `key_prefix`.
    async fn delete_directory(&self, bucket: &str, key_prefix: &str) -> PersistorResult<()>;

    /// True iff a metadata probe for the key succeeds. Not-found maps to
    /// `false`; any other backend failure propagates.
    async fn check_if_file_exists(&self, bucket: &str, key: &str) -> PersistorResult<bool>;

    /// Sum of sizes of all objects under the prefix.
    async fn directory_size(&self, bucket: &str, key_prefix: &str) -> PersistorResult<u64>;
}
