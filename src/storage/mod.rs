//! Object-store references.
//!
//! Two forms exist for every stored object: the unsigned virtual-hosted URL
//! persisted on the conversation, and a time-limited signed URL derived from it
//! whenever something is shown to a browser. Only the unsigned form is stored.

pub mod key;
pub mod reference;
pub mod signer;
pub mod object_store;

pub use key::{mint_key, safe_filename, upload_prefix};
pub use object_store::{ObjectStore, S3ObjectStore};
pub use signer::{SigV4Signer, SignedMethod, UrlSigner};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage credentials are not configured")]
    MissingCredentials,

    #[error("presign expiry must be between 1 and 604800 seconds, got {0}")]
    InvalidExpiry(u64),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("object store returned {status}: {message}")]
    Status { status: u16, message: String },
}

pub struct StorageKeyCodec {
    config: StorageConfig,
    signer: Arc<dyn UrlSigner>,
}

impl StorageKeyCodec {
    pub fn new(config: StorageConfig, signer: Arc<dyn UrlSigner>) -> Self {
        Self { config, signer }
    }

    pub fn with_sigv4(config: StorageConfig) -> Self {
        let signer = Arc::new(SigV4Signer::new(config.clone()));
        Self::new(config, signer)
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    pub fn mint_key(&self, original_name: &str, namespace_prefix: &str) -> String {
        mint_key(original_name, namespace_prefix)
    }

    /// Canonical unsigned URL for `key` in the configured bucket.
    pub fn to_unsigned_reference(&self, key: &str) -> String {
        reference::virtual_hosted_url(&self.config.bucket, &self.config.endpoint_host, key)
    }

    /// Signed, time-limited URL for a stored reference.
    ///
    /// Already-signed input comes back unchanged. Any failure to locate the
    /// object or to sign also returns the input unchanged.
    pub fn presign(&self, reference: &str, ttl: Duration) -> String {
        if reference.is_empty() || reference::is_presigned(reference) {
            return reference.to_string();
        }

        let Some(key) = reference::extract_key(reference, &self.config.bucket) else {
            tracing::debug!(reference, "Reference does not point into the configured bucket");
            return reference.to_string();
        };

        match self
            .signer
            .presign(SignedMethod::Get, &self.config.bucket, &key, ttl)
        {
            Ok(signed) => signed,
            Err(e) => {
                tracing::warn!("Presigning failed, returning unsigned reference: {}", e);
                reference.to_string()
            }
        }
    }

    /// `presign` with the configured display lifetime.
    pub fn presign_for_display(&self, reference: &str) -> String {
        self.presign(reference, Duration::from_secs(self.config.presign_ttl_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSigner;

    impl UrlSigner for FailingSigner {
        fn presign(
            &self,
            _method: SignedMethod,
            _bucket: &str,
            _key: &str,
            _ttl: Duration,
        ) -> Result<String, StorageError> {
            Err(StorageError::Signing("offline".to_string()))
        }
    }

    fn codec() -> StorageKeyCodec {
        StorageKeyCodec::with_sigv4(
            StorageConfig::new("chat-uploads", "ap-northeast-2")
                .with_credentials("AKIDEXAMPLE", "secret"),
        )
    }

    #[test]
    fn presign_is_idempotent_on_signed_urls() {
        let codec = codec();
        let reference = codec.to_unsigned_reference("uploads/u1/c1/abc-report.pdf");
        let signed = codec.presign(&reference, Duration::from_secs(3600));
        assert_ne!(signed, reference);
        assert!(reference::is_presigned(&signed));

        let again = codec.presign(&signed, Duration::from_secs(60));
        assert_eq!(again, signed);
    }

    #[test]
    fn signed_url_addresses_the_same_object() {
        let codec = codec();
        let key = "uploads/u1/c1/abc-분기 보고서.pdf";
        let reference = codec.to_unsigned_reference(key);
        let signed = codec.presign(&reference, Duration::from_secs(3600));

        assert_eq!(reference::extract_key(&signed, "chat-uploads").as_deref(), Some(key));
    }

    #[test]
    fn failures_fall_back_to_input() {
        let codec = codec();
        let foreign = "https://other-bucket.s3.ap-northeast-2.amazonaws.com/file.pdf";
        assert_eq!(codec.presign(foreign, Duration::from_secs(60)), foreign);
        assert_eq!(codec.presign("not a url", Duration::from_secs(60)), "not a url");
        assert_eq!(codec.presign("", Duration::from_secs(60)), "");

        let failing = StorageKeyCodec::new(
            StorageConfig::new("chat-uploads", "ap-northeast-2"),
            Arc::new(FailingSigner),
        );
        let reference = failing.to_unsigned_reference("k.pdf");
        assert_eq!(failing.presign(&reference, Duration::from_secs(60)), reference);
    }

    #[test]
    fn missing_credentials_leave_reference_unsigned() {
        let codec = StorageKeyCodec::with_sigv4(StorageConfig::new("chat-uploads", "us-east-1"));
        let reference = codec.to_unsigned_reference("k.pdf");
        assert_eq!(codec.presign_for_display(&reference), reference);
    }
}
