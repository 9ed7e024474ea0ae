//! Typed wire models for the image service API.
//!
//! Every endpoint responds with a `{"data": ..., "included": ...}` envelope.
//! Responses are decoded into the per-endpoint structs here; a shape
//! mismatch surfaces as `TesseraError::MalformedResponse` instead of a
//! runtime type error.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tessera_core::error::{Result, TesseraError};

/// Retention policy for the raw uploaded files of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawStoragePolicy {
    /// Raw files are destroyed after tiling
    Destroy,
    /// Raw files are archived to cold storage
    Archive,
}

impl RawStoragePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RawStoragePolicy::Destroy => "Destroy",
            RawStoragePolicy::Archive => "Archive",
        }
    }
}

impl std::fmt::Display for RawStoragePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical named container for imported image data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub raw_storage: Option<String>,
}

/// Access grant linking a subject to a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryGrant {
    pub repository_uuid: String,
    #[serde(default)]
    pub permission: Option<String>,
}

/// Repositories visible to the caller, with their grants.
#[derive(Debug, Clone)]
pub struct RepositoryListing {
    pub repositories: Vec<Repository>,
    pub grants: Vec<RepositoryGrant>,
}

impl RepositoryListing {
    /// Find a repository by exact name.
    pub fn find_by_name(&self, name: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.name == name)
    }

    /// Permission string granted on the given repository, if any.
    pub fn permission_for(&self, repository_uuid: &str) -> Option<&str> {
        self.grants
            .iter()
            .find(|g| g.repository_uuid == repository_uuid)
            .and_then(|g| g.permission.as_deref())
    }
}

/// One batch-upload job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRecord {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub repository_uuid: Option<String>,
    #[serde(default)]
    pub complete: Option<bool>,
}

/// Server-derived grouping of uploaded objects, tracked to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fileset {
    pub uuid: String,
    pub name: String,
    pub complete: bool,
    /// 0-100; the service reports null until processing starts
    #[serde(default)]
    pub progress: Option<u8>,
}

impl Fileset {
    /// Progress for display; null is rendered as 0.
    pub fn progress_percent(&self) -> u8 {
        self.progress.unwrap_or(0)
    }
}

/// A stored image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pyramid_levels: Option<u32>,
}

/// Temporary storage credentials scoped to one bucket/prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopedCredentials {
    #[serde(rename = "AccessKeyId")]
    pub access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    pub secret_access_key: String,
    #[serde(rename = "SessionToken")]
    pub session_token: String,
    #[serde(rename = "Expiration", default)]
    pub expiration: Option<chrono::DateTime<chrono::Utc>>,
}

/// Parsed `s3://<bucket>/<prefix>/` storage location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageTarget {
    pub bucket: String,
    pub prefix: String,
}

impl StorageTarget {
    /// Parse a storage URL of the form `s3://<bucket>/<prefix>/`.
    ///
    /// The trailing slash on the prefix is part of the contract; anything
    /// else fails with `MalformedCredentials`.
    pub fn parse(url: &str) -> Result<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"^s3://([A-Za-z0-9\-]+)/([A-Za-z0-9\-]+/)$").expect("valid regex")
        });

        let captures = re
            .captures(url)
            .ok_or_else(|| TesseraError::MalformedCredentials(format!("bad storage URL: {}", url)))?;

        Ok(StorageTarget {
            bucket: captures[1].to_string(),
            prefix: captures[2].to_string(),
        })
    }
}

/// Storage location plus the credentials to use against it.
#[derive(Debug, Clone)]
pub struct StorageCredentials {
    pub target: StorageTarget,
    pub credentials: ScopedCredentials,
}

/// Pyramid geometry of one stored image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
    pub pyramid_levels: u32,
    pub tile_size: u32,
    #[serde(default = "default_dim")]
    pub channels: u32,
    #[serde(default = "default_dim")]
    pub timepoints: u32,
    #[serde(default = "default_dim")]
    pub z_levels: u32,
}

fn default_dim() -> u32 {
    1
}

/// Incomplete imports with their in-flight filesets.
#[derive(Debug, Clone)]
pub struct IncompleteImports {
    pub imports: Vec<ImportRecord>,
    pub filesets: Vec<Fileset>,
}

// --- Raw response envelopes, decoded then lifted into the public types ---

#[derive(Debug, Deserialize)]
pub(crate) struct RepositoryListEnvelope {
    #[serde(default)]
    pub data: Vec<RepositoryGrant>,
    pub included: RepositoryIncluded,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RepositoryIncluded {
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CredentialsEnvelope {
    pub data: CredentialsData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CredentialsData {
    pub url: String,
    pub credentials: ScopedCredentials,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IncompleteImportsEnvelope {
    #[serde(default)]
    pub data: Vec<ImportRecord>,
    #[serde(default)]
    pub included: FilesetIncluded,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FilesetIncluded {
    #[serde(default)]
    pub filesets: Vec<Fileset>,
}
