use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::debug;

use super::FileStore;
use crate::errors::AppError;

/// Public disk backed by an S3-compatible bucket (AWS or MinIO).
#[derive(Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    url_base: String,
}

impl S3Store {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, url_base: String) -> Self {
        Self {
            client,
            bucket,
            url_base,
        }
    }

    /// Constructs a client configured for MinIO (local) or AWS (production).
    pub async fn connect(
        endpoint: &str,
        access_key_id: &str,
        secret_access_key: &str,
        bucket: String,
        url_base: String,
    ) -> Self {
        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "profile-builder-static",
        );

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .load()
            .await;

        Self::new(aws_sdk_s3::Client::new(&s3_config), bucket, url_base)
    }
}

#[async_trait]
impl FileStore for S3Store {
    async fn put(&self, path: &str, contents: Bytes, content_type: &str) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(contents))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 upload failed: {e}")))?;

        debug!("Uploaded s3://{}/{}", self.bucket, path);
        Ok(())
    }

    fn url_base(&self) -> &str {
        &self.url_base
    }
}
