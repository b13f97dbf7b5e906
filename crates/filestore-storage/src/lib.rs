//! Filestore Storage Library
//!
//! Storage abstraction and backends for filestore: the `Persistor` trait,
//! a local filesystem implementation and an S3-compatible implementation,
//! plus key derivation and temp-file staging.
//!
//! # Key layout
//!
//! Keys are opaque strings inside a bucket (e.g. `{project_id}/{file_id}`).
//! Derived assets live under `{key}-converted-cache/` in the same bucket;
//! see the `keys` module for the exact sub-key format. On the filesystem
//! backend, key segments collapse into one filename (`/` becomes `_`); the
//! bucket boundary is the only real directory level.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod fs;
pub mod keys;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod staging;
pub mod traits;

// Re-export commonly used types
pub use factory::create_persistor;
pub use filestore_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use fs::FsPersistor;
#[cfg(feature = "storage-s3")]
pub use s3::S3Persistor;
pub use staging::LocalFileWriter;
pub use traits::{
    ByteRange, ObjectSource, ObjectStream, Persistor, PersistorError, PersistorResult,
};
