//! S3-compatible object storage (`media-s3` feature).

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use domains::{ObjectStorage, StorageError};

pub struct S3MediaStore {
    client: Client,
    bucket: String,
    /// Prefix prepended to object keys to form retrieval URLs.
    public_base_url: String,
}

impl S3MediaStore {
    pub fn new(client: Client, bucket: impl Into<String>, public_base_url: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Builds a client from the ambient AWS environment, overriding the region when given.
    pub async fn from_env(
        bucket: impl Into<String>,
        region: Option<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let shared = loader.load().await;
        Self::new(Client::new(&shared), bucket, public_base_url)
    }
}

#[async_trait]
impl ObjectStorage for S3MediaStore {
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<String, StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError {
                path: path.to_string(),
                reason: aws_sdk_s3::error::DisplayErrorContext(&e).to_string(),
            })?;
        tracing::debug!(bucket = %self.bucket, key = path, "object uploaded to s3");
        Ok(format!("{}/{path}", self.public_base_url))
    }
}
