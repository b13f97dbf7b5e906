use crate::keys::fs_object_name;
use crate::staging::LocalFileWriter;
use crate::traits::{
    ByteRange, ObjectSource, ObjectStream, Persistor, PersistorError, PersistorResult,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Local filesystem persistor
///
/// Buckets map to subdirectories of `root`; keys are flattened into single
/// filenames via [`fs_object_name`], so a "directory" of keys is a filename
/// prefix within the bucket directory.
#[derive(Clone)]
pub struct FsPersistor {
    root: PathBuf,
    writer: LocalFileWriter,
}

impl FsPersistor {
    /// Create a persistor rooted at `root`, creating it if missing.
    pub async fn new(root: impl Into<PathBuf>, writer: LocalFileWriter) -> PersistorResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            PersistorError::ConfigError(format!(
                "Failed to create storage root {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(FsPersistor { root, writer })
    }

    /// Validate a bucket or key component. Keys collapse to flat filenames,
    /// so the only ways out of the root are whole `..` segments or absolute
    /// paths; `..` inside a segment (`a..b`) is a legal opaque key.
    fn validate_component(value: &str) -> PersistorResult<()> {
        if value.is_empty()
            || value.starts_with('/')
            || value.split('/').any(|segment| segment == "..")
        {
            return Err(PersistorError::InvalidKey(value.to_string()));
        }
        Ok(())
    }

    fn bucket_dir(&self, bucket: &str) -> PersistorResult<PathBuf> {
        Self::validate_component(bucket)?;
        if bucket.contains('/') {
            return Err(PersistorError::InvalidKey(bucket.to_string()));
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> PersistorResult<PathBuf> {
        Self::validate_component(key)?;
        Ok(self.bucket_dir(bucket)?.join(fs_object_name(key)))
    }

    fn map_missing(key: &str, e: std::io::Error) -> PersistorError {
        if e.kind() == std::io::ErrorKind::NotFound {
            PersistorError::NotFound(key.to_string())
        } else {
            PersistorError::Io(e)
        }
    }

    /// Directory entries in `bucket` whose object name starts with the
    /// flattened `key_prefix`. Missing bucket directory means no entries.
    /// The flattening keeps a trailing `/` as `_`, so `"a/"` cannot match
    /// a sibling key like `"ab"`; raw prefixes behave as they do on S3.
    async fn entries_with_prefix(
        &self,
        bucket: &str,
        key_prefix: &str,
    ) -> PersistorResult<Vec<PathBuf>> {
        Self::validate_component(key_prefix)?;
        let dir = self.bucket_dir(bucket)?;
        let name_prefix = fs_object_name(key_prefix);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistorError::Io(e)),
        };

        let mut matched = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with(&name_prefix) {
                matched.push(entry.path());
            }
        }
        Ok(matched)
    }
}

#[async_trait]
impl Persistor for FsPersistor {
    async fn send_file(&self, bucket: &str, key: &str, source: &Path) -> PersistorResult<()> {
        let path = self.object_path(bucket, key)?;
        let start = std::time::Instant::now();

        fs::create_dir_all(self.bucket_dir(bucket)?).await?;

        let size = fs::copy(source, &path)
            .await
            .map_err(|e| Self::map_missing(&source.display().to_string(), e))?;

        tracing::debug!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Stored file"
        );

        Ok(())
    }

    async fn send_stream(
        &self,
        bucket: &str,
        key: &str,
        reader: ObjectSource,
    ) -> PersistorResult<()> {
        // Stage through a temp file so a broken input stream never leaves a
        // partial object at the destination.
        let staged = self.writer.write_stream(reader).await?;
        let path = self.object_path(bucket, key)?;

        let result = async {
            fs::create_dir_all(self.bucket_dir(bucket)?).await?;
            match fs::rename(&staged, &path).await {
                Ok(()) => Ok(()),
                // Staging dir may be on a different filesystem
                Err(_) => {
                    fs::copy(&staged, &path).await?;
                    Ok(())
                }
            }
        }
        .await;

        LocalFileWriter::delete_file(&staged).await;
        result
    }

    async fn get_file_stream(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> PersistorResult<ObjectStream> {
        let path = self.object_path(bucket, key)?;

        let mut file = fs::File::open(&path)
            .await
            .map_err(|e| Self::map_missing(key, e))?;

        let stream: ObjectStream = match range {
            Some(ByteRange { start, end }) => {
                file.seek(SeekFrom::Start(start)).await?;
                match end {
                    // Inclusive range: end - start + 1 bytes
                    Some(end) => {
                        let len = end.saturating_sub(start).saturating_add(1);
                        let reader = tokio_util::io::ReaderStream::new(file.take(len));
                        Box::pin(reader.map(|r| r.map_err(PersistorError::Io)))
                    }
                    None => {
                        let reader = tokio_util::io::ReaderStream::new(file);
                        Box::pin(reader.map(|r| r.map_err(PersistorError::Io)))
                    }
                }
            }
            None => {
                let reader = tokio_util::io::ReaderStream::new(file);
                Box::pin(reader.map(|r| r.map_err(PersistorError::Io)))
            }
        };

        Ok(stream)
    }

    async fn get_file_size(&self, bucket: &str, key: &str) -> PersistorResult<u64> {
        let path = self.object_path(bucket, key)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| Self::map_missing(key, e))?;
        Ok(meta.len())
    }

    async fn copy_file(&self, bucket: &str, from_key: &str, to_key: &str) -> PersistorResult<()> {
        let from_path = self.object_path(bucket, from_key)?;
        let to_path = self.object_path(bucket, to_key)?;

        fs::create_dir_all(self.bucket_dir(bucket)?).await?;

        fs::copy(&from_path, &to_path)
            .await
            .map_err(|e| Self::map_missing(from_key, e))?;

        tracing::debug!(bucket = %bucket, from_key = %from_key, to_key = %to_key, "Copied object");

        Ok(())
    }

    async fn delete_file(&self, bucket: &str, key: &str) -> PersistorResult<()> {
        let path = self.object_path(bucket, key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistorError::Io(e)),
        }
    }

    async fn delete_directory(&self, bucket: &str, key_prefix: &str) -> PersistorResult<()> {
        let paths = self.entries_with_prefix(bucket, key_prefix).await?;
        let count = paths.len();

        for path in paths {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(PersistorError::Io(e)),
            }
        }

        tracing::debug!(bucket = %bucket, key_prefix = %key_prefix, deleted = count, "Deleted prefix");

        Ok(())
    }

    async fn check_if_file_exists(&self, bucket: &str, key: &str) -> PersistorResult<bool> {
        let path = self.object_path(bucket, key)?;
        match fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PersistorError::Io(e)),
        }
    }

    async fn directory_size(&self, bucket: &str, key_prefix: &str) -> PersistorResult<u64> {
        let mut total = 0u64;
        for path in self.entries_with_prefix(bucket, key_prefix).await? {
            match fs::metadata(&path).await {
                Ok(meta) => total += meta.len(),
                // Concurrent delete between listing and stat
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(PersistorError::Io(e)),
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::pin::Pin;
    use tempfile::tempdir;

    async fn test_persistor(root: &Path) -> FsPersistor {
        let writer = LocalFileWriter::new(Some(root.join(".staging"))).await.unwrap();
        FsPersistor::new(root.join("store"), writer).await.unwrap()
    }

    fn reader_for(data: Vec<u8>) -> ObjectSource {
        Box::pin(std::io::Cursor::new(data)) as Pin<Box<dyn tokio::io::AsyncRead + Send + Unpin>>
    }

    async fn collect(mut stream: ObjectStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn stream_round_trip() {
        let dir = tempdir().unwrap();
        let persistor = test_persistor(dir.path()).await;

        let data = b"round trip payload".to_vec();
        persistor
            .send_stream("user_files", "p1/f1", reader_for(data.clone()))
            .await
            .unwrap();

        let stream = persistor
            .get_file_stream("user_files", "p1/f1", None)
            .await
            .unwrap();
        assert_eq!(collect(stream).await, data);

        assert_eq!(
            persistor.get_file_size("user_files", "p1/f1").await.unwrap(),
            data.len() as u64
        );
    }

    #[tokio::test]
    async fn key_segments_collapse_to_one_filename() {
        let dir = tempdir().unwrap();
        let persistor = test_persistor(dir.path()).await;

        persistor
            .send_stream("b", "p1/f1", reader_for(b"x".to_vec()))
            .await
            .unwrap();

        assert!(dir.path().join("store/b/p1_f1").exists());
    }

    #[tokio::test]
    async fn range_read_is_inclusive() {
        let dir = tempdir().unwrap();
        let persistor = test_persistor(dir.path()).await;

        persistor
            .send_stream("b", "k", reader_for(b"0123456789".to_vec()))
            .await
            .unwrap();

        let stream = persistor
            .get_file_stream("b", "k", Some(ByteRange { start: 2, end: Some(5) }))
            .await
            .unwrap();
        assert_eq!(collect(stream).await, b"2345");

        let stream = persistor
            .get_file_stream("b", "k", Some(ByteRange { start: 7, end: None }))
            .await
            .unwrap();
        assert_eq!(collect(stream).await, b"789");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let dir = tempdir().unwrap();
        let persistor = test_persistor(dir.path()).await;

        let result = persistor.get_file_stream("b", "missing", None).await;
        assert!(matches!(result, Err(PersistorError::NotFound(_))));

        let result = persistor.get_file_size("b", "missing").await;
        assert!(matches!(result, Err(PersistorError::NotFound(_))));

        assert!(!persistor.check_if_file_exists("b", "missing").await.unwrap());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let persistor = test_persistor(dir.path()).await;

        persistor
            .send_stream("b", "k", reader_for(b"x".to_vec()))
            .await
            .unwrap();

        persistor.delete_file("b", "k").await.unwrap();
        // Second delete of an absent object still succeeds
        persistor.delete_file("b", "k").await.unwrap();
        assert!(!persistor.check_if_file_exists("b", "k").await.unwrap());
    }

    #[tokio::test]
    async fn copy_duplicates_content() {
        let dir = tempdir().unwrap();
        let persistor = test_persistor(dir.path()).await;

        let data = b"copy me".to_vec();
        persistor
            .send_stream("b", "src", reader_for(data.clone()))
            .await
            .unwrap();
        persistor.copy_file("b", "src", "dst").await.unwrap();

        let stream = persistor.get_file_stream("b", "dst", None).await.unwrap();
        assert_eq!(collect(stream).await, data);

        let result = persistor.copy_file("b", "missing", "dst2").await;
        assert!(matches!(result, Err(PersistorError::NotFound(_))));
    }

    #[tokio::test]
    async fn directory_aggregation_and_delete() {
        let dir = tempdir().unwrap();
        let persistor = test_persistor(dir.path()).await;

        persistor
            .send_stream("b", "k-converted-cache/format-png", reader_for(vec![0u8; 100]))
            .await
            .unwrap();
        persistor
            .send_stream("b", "k-converted-cache/style-thumbnail", reader_for(vec![0u8; 50]))
            .await
            .unwrap();
        persistor
            .send_stream("b", "k", reader_for(vec![0u8; 7]))
            .await
            .unwrap();

        assert_eq!(
            persistor.directory_size("b", "k-converted-cache/").await.unwrap(),
            150
        );

        persistor.delete_directory("b", "k-converted-cache/").await.unwrap();
        assert_eq!(
            persistor.directory_size("b", "k-converted-cache/").await.unwrap(),
            0
        );
        // Parent object untouched
        assert!(persistor.check_if_file_exists("b", "k").await.unwrap());
    }

    #[tokio::test]
    async fn prefix_with_trailing_slash_respects_segment_boundary() {
        let dir = tempdir().unwrap();
        let persistor = test_persistor(dir.path()).await;

        persistor
            .send_stream("b", "a/x", reader_for(vec![0u8; 10]))
            .await
            .unwrap();
        persistor
            .send_stream("b", "ab", reader_for(vec![0u8; 3]))
            .await
            .unwrap();

        // "a/" must not match the sibling key "ab"
        assert_eq!(persistor.directory_size("b", "a/").await.unwrap(), 10);

        persistor.delete_directory("b", "a/").await.unwrap();
        assert!(persistor.check_if_file_exists("b", "ab").await.unwrap());
        assert!(!persistor.check_if_file_exists("b", "a/x").await.unwrap());
    }

    #[tokio::test]
    async fn path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let persistor = test_persistor(dir.path()).await;

        let result = persistor.get_file_size("b", "../../etc/passwd").await;
        assert!(matches!(result, Err(PersistorError::InvalidKey(_))));

        let result = persistor.get_file_size("../b", "k").await;
        assert!(matches!(result, Err(PersistorError::InvalidKey(_))));

        let result = persistor.get_file_size("b", "/etc/passwd").await;
        assert!(matches!(result, Err(PersistorError::InvalidKey(_))));

        let result = persistor.get_file_size("b", "..").await;
        assert!(matches!(result, Err(PersistorError::InvalidKey(_))));

        let result = persistor.get_file_size("b", "k/../x").await;
        assert!(matches!(result, Err(PersistorError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn dots_inside_a_segment_are_legal() {
        let dir = tempdir().unwrap();
        let persistor = test_persistor(dir.path()).await;

        persistor
            .send_stream("b", "a..b/c", reader_for(b"dots".to_vec()))
            .await
            .unwrap();

        let stream = persistor.get_file_stream("b", "a..b/c", None).await.unwrap();
        assert_eq!(collect(stream).await, b"dots");
        assert!(dir.path().join("store/b/a..b_c").exists());
    }

    #[tokio::test]
    async fn send_file_from_local_path() {
        let dir = tempdir().unwrap();
        let persistor = test_persistor(dir.path()).await;

        let source = dir.path().join("local.bin");
        tokio::fs::write(&source, b"from disk").await.unwrap();

        persistor.send_file("b", "k", &source).await.unwrap();

        let stream = persistor.get_file_stream("b", "k", None).await.unwrap();
        assert_eq!(collect(stream).await, b"from disk");
    }
}
