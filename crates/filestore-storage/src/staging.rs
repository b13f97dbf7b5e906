//! Local temp-file staging.
//!
//! `LocalFileWriter` owns a staging directory and hands out uniquely named
//! temp files: incoming streams are written to disk and the caller gets the
//! path back, or a local path is streamed out again. Callers own the files
//! they are handed and delete them via [`LocalFileWriter::delete_file`],
//! which is best-effort: cleanup failures are logged, never propagated.

use crate::traits::{ObjectSource, ObjectStream, PersistorError, PersistorResult};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Clone)]
pub struct LocalFileWriter {
    staging_dir: PathBuf,
}

impl LocalFileWriter {
    /// Create a writer rooted at `staging_dir`, or the OS temp dir when
    /// none is configured. The directory is created if missing.
    pub async fn new(staging_dir: Option<PathBuf>) -> PersistorResult<Self> {
        let staging_dir =
            staging_dir.unwrap_or_else(|| std::env::temp_dir().join("filestore-staging"));

        fs::create_dir_all(&staging_dir).await.map_err(|e| {
            PersistorError::ConfigError(format!(
                "Failed to create staging directory {}: {}",
                staging_dir.display(),
                e
            ))
        })?;

        Ok(LocalFileWriter { staging_dir })
    }

    /// Write a stream to a uniquely named temp file and return its path.
    ///
    /// On any failure the partial file is removed before the error is
    /// returned, so no orphan is left behind.
    pub async fn write_stream(&self, mut reader: ObjectSource) -> PersistorResult<PathBuf> {
        let path = self.staging_dir.join(Uuid::new_v4().to_string());
        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await?;

        let result = async {
            let bytes_copied = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            Ok::<u64, std::io::Error>(bytes_copied)
        }
        .await;

        match result {
            Ok(bytes_copied) => {
                tracing::debug!(
                    path = %path.display(),
                    size_bytes = bytes_copied,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Staged stream to temp file"
                );
                Ok(path)
            }
            Err(e) => {
                drop(file);
                Self::delete_file(&path).await;
                Err(PersistorError::Io(e))
            }
        }
    }

    /// Open a chunked read stream over a local file.
    pub async fn get_stream(path: &Path) -> PersistorResult<ObjectStream> {
        let file = fs::File::open(path).await?;
        let stream = tokio_util::io::ReaderStream::new(file)
            .map(|result| result.map_err(PersistorError::Io));
        Ok(Box::pin(stream))
    }

    /// Best-effort unlink. Failures are logged so cleanup never supersedes
    /// the primary success or error path.
    pub async fn delete_file(path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "Failed to delete temp file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::pin::Pin;
    use tempfile::tempdir;

    fn reader_for(data: Vec<u8>) -> ObjectSource {
        Box::pin(std::io::Cursor::new(data)) as Pin<Box<dyn tokio::io::AsyncRead + Send + Unpin>>
    }

    #[tokio::test]
    async fn write_stream_round_trips() {
        let dir = tempdir().unwrap();
        let writer = LocalFileWriter::new(Some(dir.path().to_path_buf()))
            .await
            .unwrap();

        let data = b"staged bytes".to_vec();
        let path = writer.write_stream(reader_for(data.clone())).await.unwrap();

        let on_disk = tokio::fs::read(&path).await.unwrap();
        assert_eq!(data, on_disk);

        let mut stream = LocalFileWriter::get_stream(&path).await.unwrap();
        let mut streamed = Vec::new();
        while let Some(chunk) = stream.next().await {
            streamed.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(data, streamed);
    }

    #[tokio::test]
    async fn write_stream_generates_unique_paths() {
        let dir = tempdir().unwrap();
        let writer = LocalFileWriter::new(Some(dir.path().to_path_buf()))
            .await
            .unwrap();

        let a = writer.write_stream(reader_for(b"a".to_vec())).await.unwrap();
        let b = writer.write_stream(reader_for(b"b".to_vec())).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn delete_file_is_best_effort() {
        let dir = tempdir().unwrap();
        let writer = LocalFileWriter::new(Some(dir.path().to_path_buf()))
            .await
            .unwrap();

        let path = writer.write_stream(reader_for(b"x".to_vec())).await.unwrap();
        LocalFileWriter::delete_file(&path).await;
        assert!(!path.exists());

        // Deleting again must not panic or error
        LocalFileWriter::delete_file(&path).await;
    }
}
