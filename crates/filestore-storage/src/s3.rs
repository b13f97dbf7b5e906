use crate::staging::LocalFileWriter;
use crate::traits::{
    ByteRange, ObjectSource, ObjectStream, Persistor, PersistorError, PersistorResult,
};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use futures::StreamExt;
use std::path::Path;
use tokio_util::io::ReaderStream;

/// S3-compatible object store persistor
///
/// One client, buckets addressed per call. Works against AWS S3 and
/// path-style S3-compatible providers (MinIO, Ceph RGW) via a custom
/// endpoint. Incoming streams are staged to disk first so upload memory
/// stays bounded regardless of object size.
#[derive(Clone)]
pub struct S3Persistor {
    client: Client,
    writer: LocalFileWriter,
}

impl S3Persistor {
    /// Create a new S3Persistor
    ///
    /// # Arguments
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `writer` - staging area for stream uploads
    pub async fn new(
        region: String,
        endpoint_url: Option<String>,
        writer: LocalFileWriter,
    ) -> PersistorResult<Self> {
        let region_provider = RegionProviderChain::first_try(aws_config::Region::new(region));

        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config.clone())
            .load()
            .await;

        let client = if let Some(ref endpoint) = endpoint_url {
            let mut s3_config_builder = aws_sdk_s3::Config::builder()
                .endpoint_url(endpoint)
                .region(config.region().cloned())
                .retry_config(retry_config);
            if let Some(provider) = config.credentials_provider().into_iter().next() {
                s3_config_builder = s3_config_builder.credentials_provider(provider);
            }
            // Path-style addressing is required for most S3-compatible providers
            s3_config_builder = s3_config_builder.force_path_style(true);

            Client::from_conf(s3_config_builder.build())
        } else {
            Client::new(&config)
        };

        Ok(S3Persistor { client, writer })
    }

    /// HTTP Range header value for an inclusive byte range; the upper bound
    /// is omitted when `end` is unset.
    fn range_header(range: ByteRange) -> String {
        match range.end {
            Some(end) => format!("bytes={}-{}", range.start, end),
            None => format!("bytes={}-", range.start),
        }
    }

    /// One page of keys and sizes under a prefix.
    async fn list_page(
        &self,
        bucket: &str,
        key_prefix: &str,
        continuation_token: Option<String>,
    ) -> PersistorResult<(Vec<(String, u64)>, Option<String>)> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(key_prefix);
        if let Some(token) = continuation_token {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PersistorError::BackendError(e.to_string()))?;

        let entries = response
            .contents()
            .iter()
            .filter_map(|object| {
                object
                    .key()
                    .map(|key| (key.to_string(), object.size().unwrap_or(0).max(0) as u64))
            })
            .collect();

        let next = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(String::from)
        } else {
            None
        };

        Ok((entries, next))
    }
}

#[async_trait]
impl Persistor for S3Persistor {
    async fn send_file(&self, bucket: &str, key: &str, source: &Path) -> PersistorResult<()> {
        let start = std::time::Instant::now();

        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| PersistorError::Io(std::io::Error::other(e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 put failed"
                );
                PersistorError::BackendError(e.to_string())
            })?;

        tracing::debug!(
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 put successful"
        );

        Ok(())
    }

    async fn send_stream(
        &self,
        bucket: &str,
        key: &str,
        reader: ObjectSource,
    ) -> PersistorResult<()> {
        // Stage to disk so memory use is independent of object size
        let staged = self.writer.write_stream(reader).await?;
        let result = self.send_file(bucket, key, &staged).await;
        LocalFileWriter::delete_file(&staged).await;
        result
    }

    async fn get_file_stream(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> PersistorResult<ObjectStream> {
        let mut request = self.client.get_object().bucket(bucket).key(key);
        if let Some(range) = range {
            request = request.range(Self::range_header(range));
        }

        let response = request.send().await.map_err(|e| match &e {
            SdkError::ServiceError(service_err) => match service_err.err() {
                GetObjectError::NoSuchKey(_) => PersistorError::NotFound(key.to_string()),
                _ => PersistorError::BackendError(e.to_string()),
            },
            _ => PersistorError::BackendError(e.to_string()),
        })?;

        let async_read = response.body.into_async_read();
        let stream = ReaderStream::new(async_read)
            .map(|result| result.map_err(|e| PersistorError::BackendError(e.to_string())));

        Ok(Box::pin(stream))
    }

    async fn get_file_size(&self, bucket: &str, key: &str) -> PersistorResult<u64> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err) => match service_err.err() {
                    HeadObjectError::NotFound(_) => PersistorError::NotFound(key.to_string()),
                    _ => PersistorError::BackendError(e.to_string()),
                },
                _ => PersistorError::BackendError(e.to_string()),
            })?;

        Ok(response.content_length().unwrap_or(0).max(0) as u64)
    }

    async fn copy_file(&self, bucket: &str, from_key: &str, to_key: &str) -> PersistorResult<()> {
        let start = std::time::Instant::now();

        // URL-encode the copy source per the S3 API
        let encoded_key = urlencoding::encode(from_key);
        let copy_source = format!("{}/{}", bucket, encoded_key);

        self.client
            .copy_object()
            .bucket(bucket)
            .copy_source(&copy_source)
            .key(to_key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err) if service_err.raw().status().as_u16() == 404 => {
                    PersistorError::NotFound(from_key.to_string())
                }
                _ => PersistorError::BackendError(e.to_string()),
            })?;

        tracing::debug!(
            bucket = %bucket,
            from_key = %from_key,
            to_key = %to_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 copy successful"
        );

        Ok(())
    }

    async fn delete_file(&self, bucket: &str, key: &str) -> PersistorResult<()> {
        // DeleteObject succeeds whether or not the key exists
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| PersistorError::BackendError(e.to_string()))?;

        tracing::debug!(bucket = %bucket, key = %key, "S3 delete successful");

        Ok(())
    }

    async fn delete_directory(&self, bucket: &str, key_prefix: &str) -> PersistorResult<()> {
        let mut continuation_token = None;
        let mut deleted = 0usize;

        loop {
            let (entries, next) = self
                .list_page(bucket, key_prefix, continuation_token)
                .await?;

            if !entries.is_empty() {
                let identifiers = entries
                    .iter()
                    .map(|(key, _)| {
                        ObjectIdentifier::builder()
                            .key(key)
                            .build()
                            .map_err(|e| PersistorError::BackendError(e.to_string()))
                    })
                    .collect::<PersistorResult<Vec<_>>>()?;
                deleted += identifiers.len();

                let delete = Delete::builder()
                    .set_objects(Some(identifiers))
                    .quiet(true)
                    .build()
                    .map_err(|e| PersistorError::BackendError(e.to_string()))?;

                self.client
                    .delete_objects()
                    .bucket(bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|e| PersistorError::BackendError(e.to_string()))?;
            }

            match next {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        tracing::debug!(bucket = %bucket, key_prefix = %key_prefix, deleted, "S3 prefix delete successful");

        Ok(())
    }

    async fn check_if_file_exists(&self, bucket: &str, key: &str) -> PersistorResult<bool> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match &e {
                SdkError::ServiceError(service_err) => match service_err.err() {
                    HeadObjectError::NotFound(_) => Ok(false),
                    _ => Err(PersistorError::BackendError(e.to_string())),
                },
                _ => Err(PersistorError::BackendError(e.to_string())),
            },
        }
    }

    async fn directory_size(&self, bucket: &str, key_prefix: &str) -> PersistorResult<u64> {
        let mut continuation_token = None;
        let mut total = 0u64;

        loop {
            let (entries, next) = self
                .list_page(bucket, key_prefix, continuation_token)
                .await?;
            total += entries.iter().map(|(_, size)| size).sum::<u64>();

            match next {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::Credentials;
    use std::pin::Pin;
    use tempfile::tempdir;

    /// Client pointed at a closed local port, retries off: requests fail
    /// fast without touching the network beyond one refused connect.
    fn unreachable_client() -> Client {
        let conf = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new("us-east-1"))
            .endpoint_url("http://127.0.0.1:1")
            .credentials_provider(Credentials::new("test", "test", None, None, "test"))
            .retry_config(RetryConfig::disabled())
            .force_path_style(true)
            .build();
        Client::from_conf(conf)
    }

    #[tokio::test]
    async fn stream_upload_stages_to_disk_and_cleans_up() {
        let dir = tempdir().unwrap();
        let writer = LocalFileWriter::new(Some(dir.path().to_path_buf()))
            .await
            .unwrap();
        let persistor = S3Persistor {
            client: unreachable_client(),
            writer,
        };

        let reader: ObjectSource = Box::pin(std::io::Cursor::new(vec![1u8; 4096]))
            as Pin<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
        let result = persistor.send_stream("b", "k", reader).await;
        assert!(matches!(result, Err(PersistorError::BackendError(_))));

        // Staged temp file is removed even when the put fails
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[test]
    fn range_header_inclusive_bounds() {
        assert_eq!(
            S3Persistor::range_header(ByteRange { start: 0, end: Some(1023) }),
            "bytes=0-1023"
        );
        assert_eq!(
            S3Persistor::range_header(ByteRange { start: 512, end: None }),
            "bytes=512-"
        );
    }
}
