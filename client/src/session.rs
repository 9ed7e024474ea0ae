//! Authenticated HTTP session against the image service.
//!
//! JSON over HTTPS with a bearer credential header. No automatic retry at
//! this layer — retry policy belongs to callers, and only for operations
//! they know to be idempotent.

use async_trait::async_trait;
use serde_json::Value;
use tessera_core::error::{Result, TesseraError};

use crate::auth::BearerToken;
use crate::models::{
    CredentialsEnvelope, DataEnvelope, Fileset, ImageDimensions, ImageRecord, ImportRecord,
    IncompleteImports, IncompleteImportsEnvelope, ListEnvelope, RawStoragePolicy, Repository,
    RepositoryListEnvelope, RepositoryListing, StorageCredentials, StorageTarget,
};
use crate::service::ImageService;

/// Authenticated session. The underlying reqwest client is connection
/// pooled and safe to share across concurrent requests.
pub struct Session {
    http: reqwest::Client,
    endpoint: String,
    token: BearerToken,
}

impl Session {
    /// Create a session against `endpoint` using an already-acquired token.
    ///
    /// The token is opaque here and lives for one CLI invocation.
    pub fn new(endpoint: impl Into<String>, token: BearerToken) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Raw JSON request. Status >= 400 fails with `RemoteService`;
    /// connectivity failures fail with `Transport`.
    pub async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
        query: Option<&[(&str, &str)]>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.endpoint, path);
        let mut builder = self
            .http
            .request(method, &url)
            .header("Authorization", self.token.header_value())
            .header("Content-Type", "application/json");

        if let Some(body) = body {
            builder = builder.json(&body);
        }
        if let Some(query) = query {
            builder = builder.query(query);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TesseraError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TesseraError::Transport(e.to_string()))?;

        if status.as_u16() >= 400 {
            tracing::error!(status = status.as_u16(), path, "Image service error: {}", text);
            return Err(TesseraError::RemoteService {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| TesseraError::MalformedResponse {
            endpoint: path.to_string(),
            message: format!("response is not JSON: {}", e),
        })
    }

    /// Decode a raw response value into a typed envelope.
    fn decode<T: serde::de::DeserializeOwned>(&self, path: &str, value: Value) -> Result<T> {
        serde_json::from_value(value).map_err(|e| TesseraError::MalformedResponse {
            endpoint: path.to_string(),
            message: e.to_string(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.request(reqwest::Method::GET, path, None, None).await?;
        self.decode(path, value)
    }

    /// Parse the credentials envelope's storage URL into bucket/prefix.
    fn lift_credentials(envelope: CredentialsEnvelope) -> Result<StorageCredentials> {
        let target = StorageTarget::parse(&envelope.data.url)?;
        Ok(StorageCredentials {
            target,
            credentials: envelope.data.credentials,
        })
    }
}

#[async_trait]
impl ImageService for Session {
    async fn list_repositories(&self) -> Result<RepositoryListing> {
        let envelope: RepositoryListEnvelope = self.get("/repository").await?;
        Ok(RepositoryListing {
            repositories: envelope.included.repositories,
            grants: envelope.data,
        })
    }

    async fn create_repository(
        &self,
        name: &str,
        raw_storage: RawStoragePolicy,
    ) -> Result<Repository> {
        let body = serde_json::json!({
            "name": name,
            "raw_storage": raw_storage.as_str(),
        });
        let value = self
            .request(reqwest::Method::POST, "/repository", Some(body), None)
            .await?;
        let envelope: DataEnvelope<Repository> = self.decode("/repository", value)?;
        Ok(envelope.data)
    }

    async fn create_import(&self, name: &str, repository_uuid: &str) -> Result<ImportRecord> {
        let body = serde_json::json!({
            "name": name,
            "repository_uuid": repository_uuid,
        });
        let value = self
            .request(reqwest::Method::POST, "/import", Some(body), None)
            .await?;
        let envelope: DataEnvelope<ImportRecord> = self.decode("/import", value)?;
        Ok(envelope.data)
    }

    async fn get_import_credentials(&self, import_uuid: &str) -> Result<StorageCredentials> {
        let path = format!("/import/{}/credentials", import_uuid);
        let envelope: CredentialsEnvelope = self.get(&path).await?;
        Self::lift_credentials(envelope)
    }

    async fn mark_import_complete(&self, import_uuid: &str) -> Result<()> {
        let body = serde_json::json!({ "complete": true });
        let path = format!("/import/{}", import_uuid);
        self.request(reqwest::Method::PUT, &path, Some(body), None)
            .await?;
        Ok(())
    }

    async fn list_filesets_in_import(&self, import_uuid: &str) -> Result<Vec<Fileset>> {
        let path = format!("/import/{}/filesets", import_uuid);
        let envelope: ListEnvelope<Fileset> = self.get(&path).await?;
        Ok(envelope.data)
    }

    async fn list_images_in_fileset(&self, fileset_uuid: &str) -> Result<Vec<ImageRecord>> {
        let path = format!("/fileset/{}/images", fileset_uuid);
        let envelope: ListEnvelope<ImageRecord> = self.get(&path).await?;
        Ok(envelope.data)
    }

    async fn list_images_in_repository(&self, repository_uuid: &str) -> Result<Vec<ImageRecord>> {
        let path = format!("/repository/{}/images", repository_uuid);
        let envelope: ListEnvelope<ImageRecord> = self.get(&path).await?;
        Ok(envelope.data)
    }

    async fn list_incomplete_imports(&self) -> Result<IncompleteImports> {
        let envelope: IncompleteImportsEnvelope = self.get("/import/incomplete").await?;
        Ok(IncompleteImports {
            imports: envelope.data,
            filesets: envelope.included.filesets,
        })
    }

    async fn create_image(
        &self,
        name: &str,
        repository_uuid: &str,
        pyramid_levels: u32,
    ) -> Result<ImageRecord> {
        let body = serde_json::json!({
            "name": name,
            "repository_uuid": repository_uuid,
            "pyramid_levels": pyramid_levels,
            "format": "tiff",
        });
        let value = self
            .request(reqwest::Method::POST, "/image", Some(body), None)
            .await?;
        let envelope: DataEnvelope<ImageRecord> = self.decode("/image", value)?;
        Ok(envelope.data)
    }

    async fn get_image_credentials(&self, image_uuid: &str) -> Result<StorageCredentials> {
        let path = format!("/image/{}/credentials", image_uuid);
        let envelope: CredentialsEnvelope = self.get(&path).await?;
        Self::lift_credentials(envelope)
    }

    async fn get_image_dimensions(&self, image_uuid: &str) -> Result<ImageDimensions> {
        let path = format!("/image/{}/dimensions", image_uuid);
        let value = self.request(reqwest::Method::GET, &path, None, None).await?;
        let envelope: DataEnvelope<ImageDimensions> = self.decode(&path, value)?;
        Ok(envelope.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_is_trimmed() {
        let token = BearerToken::new("Bearer", "abc");
        let session = Session::new("https://api.example.org/v1/", token);
        assert_eq!(session.endpoint, "https://api.example.org/v1");
    }

    #[test]
    fn test_lift_credentials_parses_url() {
        let envelope: CredentialsEnvelope = serde_json::from_value(serde_json::json!({
            "data": {
                "url": "s3://raw-bucket/abc123/",
                "credentials": {
                    "AccessKeyId": "AKIAFAKE",
                    "SecretAccessKey": "secret",
                    "SessionToken": "token",
                    "Expiration": "2020-02-11T20:06:04+00:00"
                }
            }
        }))
        .unwrap();

        let creds = Session::lift_credentials(envelope).unwrap();
        assert_eq!(creds.target.bucket, "raw-bucket");
        assert_eq!(creds.target.prefix, "abc123/");
        assert_eq!(creds.credentials.access_key_id, "AKIAFAKE");
    }

    #[test]
    fn test_lift_credentials_rejects_bad_url() {
        let envelope: CredentialsEnvelope = serde_json::from_value(serde_json::json!({
            "data": {
                "url": "https://raw-bucket/abc123/",
                "credentials": {
                    "AccessKeyId": "AKIAFAKE",
                    "SecretAccessKey": "secret",
                    "SessionToken": "token"
                }
            }
        }))
        .unwrap();

        assert!(matches!(
            Session::lift_credentials(envelope),
            Err(TesseraError::MalformedCredentials(_))
        ));
    }
}
