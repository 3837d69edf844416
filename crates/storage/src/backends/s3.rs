//! S3-compatible storage backend for the external provider.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, ObjectMeta, ObjectStore, SignedUrlOptions, UrlMethod};
use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream as AwsByteStream;
use bytes::Bytes;
use tracing::instrument;

/// Object store backed by an S3-compatible bucket.
///
/// Addressed by a driver URL of the form `s3://bucket[/prefix]`;
/// credentials and endpoint come from the ambient AWS configuration.
pub struct S3Backend {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Backend {
    /// Open a backend from a driver URL.
    pub async fn from_driver_url(driver_url: &str) -> StorageResult<Self> {
        let rest = driver_url.strip_prefix("s3://").ok_or_else(|| {
            StorageError::Internal(format!("unsupported storage driver URL: {driver_url}"))
        })?;
        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) if !prefix.is_empty() => {
                (bucket.to_string(), Some(prefix.trim_end_matches('/').to_string()))
            }
            Some((bucket, _)) => (bucket.to_string(), None),
            None => (rest.to_string(), None),
        };
        if bucket.is_empty() {
            return Err(StorageError::Internal(
                "storage driver URL is missing a bucket".to_string(),
            ));
        }

        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = aws_sdk_s3::Client::new(&config);
        Ok(Self {
            client,
            bucket,
            prefix,
        })
    }

    fn object_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        let resp = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map_err(|e| map_sdk_error(key, e))?;

        Ok(ObjectMeta {
            size: resp.content_length().unwrap_or(0).max(0) as u64,
            content_type: resp.content_type().map(str::to_string),
            md5: resp.e_tag().and_then(etag_md5),
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map_err(|e| map_sdk_error(key, e))?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;
        Ok(data.into_bytes())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map_err(|e| map_sdk_error(key, e))?;

        let mut body = resp.body;
        let stream = async_stream::try_stream! {
            while let Some(chunk) = body
                .try_next()
                .await
                .map_err(|e| StorageError::S3(e.to_string()))?
            {
                yield chunk;
            }
        };
        Ok(Box::pin(stream))
    }

    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> StorageResult<()> {
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .body(AwsByteStream::from(data));
        if let Some(ct) = content_type {
            req = req.content_type(ct);
        }
        req.send().await.map_err(|e| map_sdk_error(key, e))?;
        Ok(())
    }

    async fn signed_url(&self, key: &str, opts: &SignedUrlOptions) -> StorageResult<String> {
        let presigning = PresigningConfig::expires_in(opts.expiry)
            .map_err(|e| StorageError::S3(e.to_string()))?;

        let uri = match opts.method {
            UrlMethod::Get => self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(self.object_key(key))
                .presigned(presigning)
                .await
                .map_err(|e| map_sdk_error(key, e))?
                .uri()
                .to_string(),
            UrlMethod::Put => {
                let mut req = self
                    .client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(self.object_key(key));
                if let Some(ct) = &opts.content_type {
                    req = req.content_type(ct);
                }
                req.presigned(presigning)
                    .await
                    .map_err(|e| map_sdk_error(key, e))?
                    .uri()
                    .to_string()
            }
        };
        Ok(uri)
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn health_check(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

/// Recover an MD5 from a simple-upload ETag. Multipart ETags carry a
/// part-count suffix and are not content hashes.
fn etag_md5(etag: &str) -> Option<Vec<u8>> {
    let trimmed = etag.trim_matches('"');
    if trimmed.len() != 32 || trimmed.contains('-') {
        return None;
    }
    trimmed
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let hex = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(hex, 16).ok()
        })
        .collect()
}

fn map_sdk_error<E, R>(key: &str, err: aws_sdk_s3::error::SdkError<E, R>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err {
        let detail = service_err.err().to_string();
        if detail.contains("NoSuchKey") || detail.contains("NotFound") {
            return StorageError::NotFound(key.to_string());
        }
    }
    StorageError::S3(err.to_string())
}
