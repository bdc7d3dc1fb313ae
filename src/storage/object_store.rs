use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use crate::storage::signer::{SignedMethod, UrlSigner};
use crate::storage::StorageError;

/// Lifetime of the URL used for a single upload.
const UPLOAD_URL_TTL: Duration = Duration::from_secs(900);

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError>;
}

/// Uploads through a presigned PUT URL.
pub struct S3ObjectStore {
    http: reqwest::Client,
    signer: Arc<dyn UrlSigner>,
}

impl S3ObjectStore {
    pub fn new(signer: Arc<dyn UrlSigner>, timeout: Duration) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, signer })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        let url = self
            .signer
            .presign(SignedMethod::Put, bucket, key, UPLOAD_URL_TTL)?;
        let size = bytes.len();

        let resp = self
            .http
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(StorageError::Status { status, message });
        }

        tracing::debug!(bucket, key, size, "Object stored");
        Ok(())
    }
}
