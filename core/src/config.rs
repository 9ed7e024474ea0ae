//! Resolved client settings.
//!
//! Settings come from three layers, lowest to highest precedence: the JSON
//! config file (`~/.tessera.json`, written by `tessera configure`),
//! `TESSERA_*` environment variables, and command-line flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};

/// On-disk config file shape. All keys optional; completeness is checked
/// only after env vars and flags have been layered on top.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Values supplied on the command line, layered over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub client_id: Option<String>,
}

/// Fully resolved settings for one CLI invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: String,
    pub region: String,
    pub client_id: String,
    pub username: String,
    pub password: String,
}

impl Settings {
    /// Default config file location (`~/.tessera.json`).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tessera.json")
    }

    /// Resolve settings from the config file, environment, and overrides.
    ///
    /// A missing config file is not an error — env vars and flags may carry
    /// everything. Missing required values are reported together by name.
    pub fn resolve(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        let file = SettingsFile::load(&path)?;

        let endpoint = overrides
            .endpoint
            .clone()
            .or_else(|| std::env::var("TESSERA_ENDPOINT").ok())
            .or(file.endpoint);
        let region = overrides
            .region
            .clone()
            .or_else(|| std::env::var("TESSERA_REGION").ok())
            .or(file.region);
        let client_id = overrides
            .client_id
            .clone()
            .or_else(|| std::env::var("TESSERA_CLIENT_ID").ok())
            .or(file.client_id);
        let username = std::env::var("TESSERA_USERNAME").ok().or(file.username);
        let password = std::env::var("TESSERA_PASSWORD").ok().or(file.password);

        let mut missing = Vec::new();
        if endpoint.is_none() {
            missing.push("TESSERA_ENDPOINT");
        }
        if region.is_none() {
            missing.push("TESSERA_REGION");
        }
        if client_id.is_none() {
            missing.push("TESSERA_CLIENT_ID");
        }
        if username.is_none() {
            missing.push("TESSERA_USERNAME");
        }
        if password.is_none() {
            missing.push("TESSERA_PASSWORD");
        }
        if !missing.is_empty() {
            return Err(TesseraError::MissingArgument(missing.join(", ")));
        }

        Ok(Settings {
            endpoint: endpoint.unwrap_or_default(),
            region: region.unwrap_or_default(),
            client_id: client_id.unwrap_or_default(),
            username: username.unwrap_or_default(),
            password: password.unwrap_or_default(),
        })
    }
}

impl SettingsFile {
    /// Load the config file. Returns defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(SettingsFile::default());
        }
        let data = std::fs::read_to_string(path).map_err(|e| {
            TesseraError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&data).map_err(|e| {
            TesseraError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Write the config file with owner-only permissions.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TesseraError::Config(format!(
                    "Failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data).map_err(|e| {
            TesseraError::Config(format!("Failed to write {}: {}", path.display(), e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(path, perms).map_err(|e| {
                TesseraError::Config(format!(
                    "Failed to set permissions on {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }

        Ok(())
    }
}
