use std::fs;
use std::path::{Path, PathBuf};

use crate::credentials::Credentials;
use crate::error::AuthError;

/// File-backed storage for OAuth credentials.
/// Credentials are stored as JSON, by default in the user's config directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<config dir>/gcal/credentials.json`
    pub fn default_location() -> Result<Self, AuthError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AuthError::Storage("Failed to get config directory".to_string()))?;
        Ok(Self::new(config_dir.join("gcal").join("credentials.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store credentials, creating the parent directory if needed
    pub fn save(&self, credentials: &Credentials) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AuthError::Storage(format!("Failed to create credentials directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(credentials)
            .map_err(|e| AuthError::Storage(format!("Failed to serialize credentials: {}", e)))?;

        fs::write(&self.path, json)
            .map_err(|e| AuthError::Storage(format!("Failed to write credentials file: {}", e)))?;

        tracing::info!("Stored credentials at {:?}", self.path);
        Ok(())
    }

    /// Retrieve credentials from the store
    pub fn load(&self) -> Result<Credentials, AuthError> {
        let json = fs::read_to_string(&self.path)
            .map_err(|e| AuthError::Storage(format!("Failed to read credentials file: {}", e)))?;

        let credentials: Credentials = serde_json::from_str(&json)
            .map_err(|e| AuthError::Storage(format!("Failed to parse credentials: {}", e)))?;

        tracing::debug!("Loaded credentials from {:?}", self.path);
        Ok(credentials)
    }

    /// Delete stored credentials. A missing file is not an error.
    pub fn delete(&self) -> Result<(), AuthError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                AuthError::Storage(format!("Failed to delete credentials file: {}", e))
            })?;
            tracing::info!("Deleted credentials at {:?}", self.path);
        }

        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}
