//! Calendar-specific error types.

use gcal_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Token expired")]
    TokenExpired,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: event was modified")]
    Conflict,

    /// The sync token is no longer valid; a full list is required.
    #[error("Gone: {0}")]
    Gone(String),

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Event has no id")]
    MissingEventId,

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl CalendarError {
    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(e) => e.user_message().to_string(),
            Self::TokenExpired => "Your session has expired. Please sign in again.".to_string(),
            Self::Forbidden(_) => "You don't have access to this calendar.".to_string(),
            Self::NotFound(_) => "Event not found".to_string(),
            Self::Conflict => "The event was modified elsewhere. Please refresh.".to_string(),
            Self::Gone(_) => "Calendar changes expired. Please reload.".to_string(),
            Self::RateLimited(secs) => format!("Too many requests. Please wait {} seconds.", secs),
            Self::MissingEventId => "Invalid event: missing id".to_string(),
            Self::Api { status, .. } => format!("Calendar error ({})", status),
            Self::Decode(_) => "Received an unexpected response from the calendar.".to_string(),
            Self::Network(_) => "Network error. Check your connection.".to_string(),
        }
    }

    /// Whether this error should trigger a token refresh.
    pub fn should_refresh_token(&self) -> bool {
        matches!(self, Self::TokenExpired)
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Network(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status of the failed response, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::TokenExpired => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::Conflict => Some(409),
            Self::Gone(_) => Some(410),
            Self::RateLimited(_) => Some(429),
            Self::Api { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
