//! Error taxonomy for the OAuth session manager
//!
//! Every failure the token lifecycle can produce is an [`AuthError`]. The
//! variants map onto how the manager reacts:
//!
//! | Variant | Reaction |
//! |---------|----------|
//! | `UserCanceled` | Normal flow, "Login canceled." |
//! | `CallbackInvalid` / `StateMismatch` / `ProviderError` | Login attempt fails, back to signed out |
//! | `TokenExchangeFailed` | Login attempt fails with the provider's body text |
//! | `AuthenticationRequired` | Session unusable, a full re-login is needed |
//! | `ResponseUndecodable` / `Transport` | Surfaced, session kept when signed in |
//! | `Storage` | Surfaced, in-memory state is not rolled back |
//!
//! None of these are fatal to the process. Retrying `login()` recovers from
//! all of them.

use thiserror::Error;

/// Result alias used across the auth module
pub type AuthResult<T> = Result<T, AuthError>;

/// Failure reported by a [`TokenStore`](crate::auth::TokenStore)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Persisted bytes exist but cannot be decoded into a token record
    #[error("stored session could not be decoded: {0}")]
    Decode(String),

    /// The backing secure store rejected the operation
    #[error("secure storage unavailable: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Error type for every token lifecycle operation
#[derive(Debug, Error)]
pub enum AuthError {
    /// The user dismissed the external authorization UI
    #[error("login canceled by user")]
    UserCanceled,

    /// Callback URL was missing or carried no query
    #[error("invalid callback: {0}")]
    CallbackInvalid(String),

    /// Callback state did not match the pending request, or `code` was missing
    #[error("state mismatch or missing code")]
    StateMismatch,

    /// Provider redirected back with `error=<value>`
    #[error("provider returned error: {0}")]
    ProviderError(String),

    /// Token endpoint answered with a non-2xx status
    #[error("{body} (status {status})")]
    TokenExchangeFailed {
        /// HTTP status code returned by the token endpoint
        status: u16,
        /// Response body text, or "Unknown" when it was not UTF-8
        body: String,
    },

    /// No usable session: no token, no refresh token, or refresh rejected
    #[error("authentication required")]
    AuthenticationRequired,

    /// Response could not be decoded or had an unexpected status
    #[error("response could not be decoded: {0}")]
    ResponseUndecodable(String),

    /// Persisting or loading the token record failed
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// The HTTP executor failed before a response was received
    #[error("transport error: {0}")]
    Transport(String),

    /// External authorization UI failed for a reason other than cancellation
    #[error("{0}")]
    AuthorizationUi(String),

    /// Operation is not allowed from the current session phase
    #[error("{operation} is not allowed while {phase}")]
    InvalidTransition {
        /// Operation that was attempted
        operation: &'static str,
        /// Phase the manager was in
        phase: String,
    },

    /// Invalid configuration (endpoints, redirect URI, scopes)
    #[error("configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Build a token endpoint failure from a raw status and body.
    ///
    /// Bodies that are not valid UTF-8 are reported as "Unknown".
    #[must_use]
    pub fn token_exchange(status: u16, body: &[u8]) -> Self {
        let body = String::from_utf8(body.to_vec()).unwrap_or_else(|_| "Unknown".to_string());
        Self::TokenExchangeFailed { status, body }
    }

    /// Whether this failure means the stored session can no longer be used
    #[must_use]
    pub fn is_authentication_required(&self) -> bool {
        matches!(self, Self::AuthenticationRequired)
    }

    /// Message shown to the user when this error ends a login attempt
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::UserCanceled => "Login canceled.".to_string(),
            Self::CallbackInvalid(_) => "Invalid callback.".to_string(),
            Self::StateMismatch => "State mismatch or missing code.".to_string(),
            Self::ProviderError(value) => format!("Auth error: {value}"),
            Self::AuthorizationUi(description) => description.clone(),
            Self::Storage(err) => format!("Storage error: {err}"),
            other => format!("Auth failed: {other}"),
        }
    }
}
