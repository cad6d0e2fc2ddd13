use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::AuthError;

pub use gcal_core::config::DEFAULT_TOKEN_URI;

/// A token is treated as stale this many seconds before it actually expires,
/// so it cannot run out while a request is in flight.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Fallback lifetime when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN: u64 = 3600;

/// Credentials shared between every caller of one calendar client.
///
/// The lock makes "check freshness, refresh if needed, read the token"
/// a single step.
pub type SharedCredentials = Arc<Mutex<Credentials>>;

/// OAuth2 credentials for Google APIs.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token sent with every API request
    pub access_token: String,

    /// Long-lived token used to mint new access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// When `access_token` stops being accepted
    pub expires_at: DateTime<Utc>,

    pub client_id: String,
    pub client_secret: String,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    #[serde(default)]
    pub scopes: Vec<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Google token endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_expires_in() -> u64 {
    DEFAULT_EXPIRES_IN
}

impl Credentials {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_uri: default_token_uri(),
            scopes: Vec::new(),
        }
    }

    /// Build credentials from a fresh token endpoint response.
    pub fn from_token_response(
        token: TokenResponse,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_uri: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let mut creds = Self::new(
            String::new(),
            None,
            Utc::now(),
            client_id,
            client_secret,
        )
        .with_token_uri(token_uri);
        creds.apply(token)?;
        Ok(creds)
    }

    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    /// Wrap in the lock shared by calendar clients.
    pub fn into_shared(self) -> SharedCredentials {
        Arc::new(Mutex::new(self))
    }

    /// Check if the access token can still be used (with a small expiry buffer)
    pub fn is_fresh(&self) -> bool {
        !self.access_token.is_empty()
            && self
                .expires_at
                .checked_sub_signed(Duration::seconds(EXPIRY_SKEW_SECS))
                .is_some_and(|stale_at| Utc::now() < stale_at)
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Value of the `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Exchange the refresh token for a new access token.
    #[tracing::instrument(skip(self, client), fields(token_uri = %self.token_uri), level = "info")]
    pub async fn refresh(&mut self, client: &reqwest::Client) -> Result<(), AuthError> {
        let refresh_token = self
            .refresh_token
            .as_deref()
            .ok_or(AuthError::MissingRefreshToken)?;

        let response = client
            .post(&self.token_uri)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Token refresh rejected with {}", status);
            return Err(AuthError::RefreshFailed {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidTokenResponse(e.to_string()))?;

        self.apply(token)?;
        tracing::info!("Access token refreshed, valid until {}", self.expires_at);
        Ok(())
    }

    /// Take over a token response. Nothing is changed if `expires_in` does
    /// not fit in a timestamp.
    fn apply(&mut self, token: TokenResponse) -> Result<(), AuthError> {
        let expires_at = i64::try_from(token.expires_in)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::InvalidTokenResponse(format!(
                    "expires_in out of range: {}",
                    token.expires_in
                ))
            })?;

        self.access_token = token.access_token;
        self.expires_at = expires_at;

        // Google only sends a refresh token on the first exchange
        if let Some(refresh_token) = token.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        if let Some(scope) = token.scope.filter(|s| !s.trim().is_empty()) {
            self.scopes = scope.split_whitespace().map(str::to_string).collect();
        }
        Ok(())
    }
}
