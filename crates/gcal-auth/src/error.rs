//! Authentication error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No refresh token available")]
    MissingRefreshToken,

    #[error("Token refresh failed ({status}): {body}")]
    RefreshFailed { status: u16, body: String },

    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AuthError {
    /// User-friendly error message for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingRefreshToken => "Your session has expired. Please sign in again.",
            Self::RefreshFailed { status, .. } if *status == 400 || *status == 401 => {
                "Your sign-in was revoked. Please sign in again."
            }
            Self::RefreshFailed { .. } => "Could not renew your session. Please try again.",
            Self::InvalidTokenResponse(_) => "Received an unexpected sign-in response.",
            Self::Storage(_) => "Failed to read or save credentials.",
            Self::Network(_) => "Network error. Check your connection.",
        }
    }

    /// Whether signing in again is the only way out.
    pub fn requires_reauth(&self) -> bool {
        match self {
            Self::MissingRefreshToken => true,
            Self::RefreshFailed { status, .. } => *status == 400 || *status == 401,
            _ => false,
        }
    }
}
