use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
pub const DEFAULT_CALENDAR_ID: &str = "primary";
pub const DEFAULT_API_VERSION: &str = "v3";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the OAuth credentials JSON lives. Defaults to
    /// `<config dir>/gcal/credentials.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,

    /// Google OAuth client used for refreshing access tokens
    #[serde(default)]
    pub google: GoogleConfig,

    /// Which calendar to talk to and how
    #[serde(default)]
    pub calendar: CalendarConfig,
}

/// Google OAuth client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// OAuth client ID from the Google Cloud console
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl GoogleConfig {
    /// Check if credentials are configured (not placeholders)
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty()
            && !self.client_secret.is_empty()
            && !self.client_id.starts_with("YOUR_")
            && !self.client_secret.starts_with("YOUR_")
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: "YOUR_GOOGLE_CLIENT_ID".to_string(),
            client_secret: "YOUR_GOOGLE_CLIENT_SECRET".to_string(),
            token_uri: default_token_uri(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,

    /// IANA time zone name sent with list/get requests, e.g. `Europe/London`
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// API version segment of the URL. Changing it is not recommended.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_calendar_id() -> String {
    DEFAULT_CALENDAR_ID.to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: default_calendar_id(),
            timezone: default_timezone(),
            api_version: default_api_version(),
            base_url: default_base_url(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_or_create(&config_path)
    }

    /// Load configuration from `path`, writing a default file there first if missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No config at {:?}, writing defaults", path);
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        Self::load_from(path)
    }

    /// Load configuration from an existing file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated(path: &Path) -> Result<(Self, ValidationResult)> {
        let config = Self::load_or_create(path)?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_url(&self.google.token_uri, "google.token_uri", &mut result);
        Self::validate_url(&self.calendar.base_url, "calendar.base_url", &mut result);

        if self.calendar.calendar_id.trim().is_empty() {
            result.add_error("calendar.calendar_id", "Calendar ID must not be empty");
        }

        if self.calendar.timezone.trim().is_empty() {
            result.add_error("calendar.timezone", "Time zone must not be empty");
        }

        if self.calendar.api_version != DEFAULT_API_VERSION {
            result.add_warning(
                "calendar.api_version",
                format!(
                    "Using API version {} instead of {}",
                    self.calendar.api_version, DEFAULT_API_VERSION
                ),
            );
        }

        if !self.google.is_configured() {
            result.add_warning(
                "google",
                "Google OAuth client not configured - expired tokens cannot be refreshed",
            );
        }

        result
    }

    /// The Google section, or an error if it still holds placeholders
    pub fn require_google(&self) -> Result<&GoogleConfig, ConfigError> {
        if self.google.is_configured() {
            Ok(&self.google)
        } else {
            Err(ConfigError::MissingSetting("google.client_id".to_string()))
        }
    }

    fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Resolved location of the credentials file
    pub fn credentials_path(&self) -> Result<PathBuf> {
        match &self.credentials_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("credentials.json")),
        }
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    fn config_dir() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("Failed to get config directory")?
            .join("gcal"))
    }
}
