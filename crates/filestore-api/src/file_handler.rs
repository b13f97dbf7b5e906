//! Retrieval and storage orchestration.
//!
//! Plain retrievals pass straight through to the persistor. Conversion
//! requests go through the write-through cache: check for the derived
//! asset, otherwise stage the source locally, convert, optimise, cache the
//! result in the same bucket, and serve it. Temp files are removed on every
//! path.
//!
//! Concurrent cache misses for the same cache key are not serialized:
//! duplicate conversion work is accepted, the cache write is idempotent and
//! last-writer-wins.

use crate::error::FileError;
use filestore_core::{ConversionOptions, ConversionStyle};
use filestore_convert::{ConvertError, Converter, ImageOptimiser};
use filestore_storage::{
    keys, ByteRange, LocalFileWriter, ObjectSource, ObjectStream, Persistor,
};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::io::StreamReader;

pub struct FileHandler {
    persistor: Arc<dyn Persistor>,
    converter: Arc<dyn Converter>,
    optimiser: Arc<ImageOptimiser>,
    writer: LocalFileWriter,
}

impl FileHandler {
    pub fn new(
        persistor: Arc<dyn Persistor>,
        converter: Arc<dyn Converter>,
        optimiser: Arc<ImageOptimiser>,
        writer: LocalFileWriter,
    ) -> Self {
        FileHandler {
            persistor,
            converter,
            optimiser,
            writer,
        }
    }

    /// Retrieve an object, either as stored or as a derived representation.
    pub async fn get_file(
        &self,
        bucket: &str,
        key: &str,
        options: &ConversionOptions,
    ) -> Result<ObjectStream, FileError> {
        if !options.wants_conversion() {
            let range = options.start.map(|start| ByteRange {
                start,
                end: options.end,
            });
            return Ok(self.persistor.get_file_stream(bucket, key, range).await?);
        }

        let cache_key = keys::cache_key(key, options);

        if self
            .persistor
            .check_if_file_exists(bucket, &cache_key)
            .await?
        {
            tracing::debug!(bucket = %bucket, cache_key = %cache_key, "Converted cache hit");
            return Ok(self.persistor.get_file_stream(bucket, &cache_key, None).await?);
        }

        self.convert_and_cache(bucket, key, &cache_key, options).await
    }

    /// Cache-miss path: fetch the source to a temp file, derive, optimise,
    /// write through to the cache, and serve the derived bytes.
    async fn convert_and_cache(
        &self,
        bucket: &str,
        key: &str,
        cache_key: &str,
        options: &ConversionOptions,
    ) -> Result<ObjectStream, FileError> {
        let start = std::time::Instant::now();

        let source_stream = self.persistor.get_file_stream(bucket, key, None).await?;
        let reader: ObjectSource = Box::pin(StreamReader::new(
            source_stream.map(|result| result.map_err(std::io::Error::other)),
        ));
        let source_path = self.writer.write_stream(reader).await?;

        let result = self.derive(&source_path, options).await;

        let stream = match result {
            Ok(derived_path) => {
                let cached = self
                    .persistor
                    .send_file(bucket, cache_key, &derived_path)
                    .await;

                // Hold the stream open before unlinking so the bytes
                // survive until the response is fully served.
                let stream = match cached {
                    Ok(()) => LocalFileWriter::get_stream(&derived_path)
                        .await
                        .map_err(FileError::from),
                    Err(e) => Err(FileError::from(e)),
                };
                LocalFileWriter::delete_file(&derived_path).await;
                stream
            }
            Err(e) => {
                // A failed convert can still leave a partial output file
                if let Some(candidate) = Self::derived_path(&source_path, options) {
                    LocalFileWriter::delete_file(&candidate).await;
                }
                Err(e)
            }
        };

        LocalFileWriter::delete_file(&source_path).await;

        if stream.is_ok() {
            tracing::info!(
                bucket = %bucket,
                key = %key,
                cache_key = %cache_key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Converted and cached"
            );
        }

        stream
    }

    /// Dispatch on style, then format, and optimise raster output.
    async fn derive(
        &self,
        source_path: &Path,
        options: &ConversionOptions,
    ) -> Result<PathBuf, FileError> {
        let derived = match (&options.style, &options.format) {
            (Some(ConversionStyle::Thumbnail), _) => self.converter.thumbnail(source_path).await?,
            (Some(ConversionStyle::Preview), _) => self.converter.preview(source_path).await?,
            (None, Some(format)) => self.converter.convert(source_path, format).await?,
            (None, None) => {
                return Err(FileError::Convert(ConvertError::InvalidFormat(
                    "no format or style requested".to_string(),
                )))
            }
        };

        if derived.extension().is_some_and(|ext| ext == "png") {
            self.optimiser.compress_png(&derived).await?;
        }

        Ok(derived)
    }

    /// Where the converter will have written its output for these options.
    fn derived_path(source_path: &Path, options: &ConversionOptions) -> Option<PathBuf> {
        let extension = match (&options.style, &options.format) {
            (Some(_), _) => "png".to_string(),
            (None, Some(format)) => format.clone(),
            (None, None) => return None,
        };
        Some(PathBuf::from(format!(
            "{}.{}",
            source_path.display(),
            extension
        )))
    }

    /// Store a new primary object, then invalidate every cached derivation
    /// so stale assets are never served after an overwrite.
    pub async fn insert_file(
        &self,
        bucket: &str,
        key: &str,
        source: ObjectSource,
    ) -> Result<(), FileError> {
        self.persistor.send_stream(bucket, key, source).await?;
        self.persistor
            .delete_directory(bucket, &keys::converted_folder_key(key))
            .await?;
        Ok(())
    }

    /// Delete the primary object and its converted cache. Both deletes are
    /// attempted even if the first fails; the first error wins.
    pub async fn delete_file(&self, bucket: &str, key: &str) -> Result<(), FileError> {
        let primary = self.persistor.delete_file(bucket, key).await;
        let cache = self
            .persistor
            .delete_directory(bucket, &keys::converted_folder_key(key))
            .await;

        primary.and(cache)?;
        Ok(())
    }

    pub async fn get_file_size(&self, bucket: &str, key: &str) -> Result<u64, FileError> {
        Ok(self.persistor.get_file_size(bucket, key).await?)
    }

    pub async fn get_directory_size(
        &self,
        bucket: &str,
        key_prefix: &str,
    ) -> Result<u64, FileError> {
        Ok(self.persistor.directory_size(bucket, key_prefix).await?)
    }

    pub async fn copy_file(
        &self,
        bucket: &str,
        from_key: &str,
        to_key: &str,
    ) -> Result<(), FileError> {
        Ok(self.persistor.copy_file(bucket, from_key, to_key).await?)
    }
}
