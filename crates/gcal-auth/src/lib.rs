//! OAuth credentials for the Google Calendar client.
//!
//! Holds the access/refresh token pair, knows when the access token is
//! stale, and exchanges the refresh token for a new one.

pub mod credentials;
pub mod error;
pub mod store;

pub use credentials::{Credentials, SharedCredentials, TokenResponse, DEFAULT_TOKEN_URI};
pub use error::AuthError;
pub use store::CredentialStore;
