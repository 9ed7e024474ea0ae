//! Scoped object-storage transfer.
//!
//! Uploads and downloads go through S3 clients built from the short-lived
//! credentials the service hands out per job/image. Errors are returned to
//! the orchestrator — never swallowed — so the batch layer can collect them
//! into an inspectable report while keeping best-effort semantics.

use std::path::Path;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use tessera_core::error::{Result, TesseraError};

use crate::models::ScopedCredentials;
use crate::progress::ByteProgress;

/// Object-storage operations used by the orchestrators. Trait seam so
/// protocol tests can count and fail transfers deterministically.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload one local file to `bucket`/`key`, reporting transferred bytes
    /// to `progress`.
    async fn upload(
        &self,
        local: &Path,
        bucket: &str,
        key: &str,
        credentials: &ScopedCredentials,
        progress: &ByteProgress,
    ) -> Result<()>;

    /// Download one object.
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        credentials: &ScopedCredentials,
    ) -> Result<Vec<u8>>;
}

/// S3-backed implementation.
pub struct S3ObjectStore {
    region: String,
}

impl S3ObjectStore {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    /// Build a client scoped to the given temporary credentials. Credentials
    /// are never refreshed mid-operation; one set covers one job/image.
    fn client(&self, credentials: &ScopedCredentials) -> aws_sdk_s3::Client {
        let provider = Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            Some(credentials.session_token.clone()),
            None,
            "tessera-scoped",
        );
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .credentials_provider(provider)
            .build();
        aws_sdk_s3::Client::from_conf(config)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(
        &self,
        local: &Path,
        bucket: &str,
        key: &str,
        credentials: &ScopedCredentials,
        progress: &ByteProgress,
    ) -> Result<()> {
        tracing::info!(file = %local.display(), key, "Uploading file");

        let size = tokio::fs::metadata(local).await?.len();
        let body = ByteStream::from_path(local)
            .await
            .map_err(|e| TesseraError::Storage {
                key: key.to_string(),
                message: format!("cannot read {}: {}", local.display(), e),
            })?;

        self.client(credentials)
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| TesseraError::Storage {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        progress.add(size);
        Ok(())
    }

    async fn download(
        &self,
        bucket: &str,
        key: &str,
        credentials: &ScopedCredentials,
    ) -> Result<Vec<u8>> {
        let response = self
            .client(credentials)
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| TesseraError::Storage {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| TesseraError::Storage {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(data.into_bytes().to_vec())
    }
}
