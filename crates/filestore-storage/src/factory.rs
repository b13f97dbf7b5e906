#[cfg(feature = "storage-local")]
use crate::FsPersistor;
#[cfg(feature = "storage-s3")]
use crate::S3Persistor;
use crate::{LocalFileWriter, Persistor, PersistorError, PersistorResult};
use filestore_core::{Config, StorageBackend};
use std::sync::Arc;

/// Create the storage backend selected by configuration.
///
/// Selection happens exactly once at startup; an unavailable or
/// unconfigured backend is a fatal `ConfigError`, never a per-request
/// fallback.
pub async fn create_persistor(config: &Config) -> PersistorResult<Arc<dyn Persistor>> {
    match config.storage_backend() {
        #[cfg(feature = "storage-local")]
        StorageBackend::Fs => {
            let root = config.local_storage_path().map(String::from).ok_or_else(|| {
                PersistorError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let writer =
                LocalFileWriter::new(config.staging_path().map(std::path::PathBuf::from)).await?;

            let persistor = FsPersistor::new(root, writer).await?;
            Ok(Arc::new(persistor))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Fs => Err(PersistorError::ConfigError(
            "Filesystem backend not available (storage-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let region = config
                .s3_region()
                .map(String::from)
                .or_else(|| config.aws_region().map(String::from))
                .ok_or_else(|| {
                    PersistorError::ConfigError(
                        "S3_REGION or AWS_REGION not configured".to_string(),
                    )
                })?;
            let endpoint = config.s3_endpoint().map(String::from);
            let writer =
                LocalFileWriter::new(config.staging_path().map(std::path::PathBuf::from)).await?;

            let persistor = S3Persistor::new(region, endpoint, writer).await?;
            Ok(Arc::new(persistor))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(PersistorError::ConfigError(
            "S3 backend not available (storage-s3 feature not enabled)".to_string(),
        )),
    }
}
