//! Traits for the capabilities the token lifecycle depends on
//!
//! These traits enable dependency injection and testing by abstracting
//! external dependencies (secure storage, HTTP transport, the external
//! authorization UI and the wall clock).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

use super::http::{HttpRequest, HttpResponse};
use super::types::{AuthorizationRequest, TokenRecord};
use crate::error::{AuthResult, StoreError};

/// Persistent storage for the single token record
///
/// Backed by the OS secure store in production and by memory in tests.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the stored record
    ///
    /// # Returns
    /// `None` when nothing has been stored yet
    ///
    /// # Errors
    /// Returns `StoreError::Decode` if stored bytes cannot be decoded, or
    /// `StoreError::Backend` if the store is unavailable
    async fn load(&self) -> Result<Option<TokenRecord>, StoreError>;

    /// Replace the stored record
    ///
    /// # Arguments
    /// * `record` - Record to store; `None` deletes any stored record
    ///
    /// # Errors
    /// Returns `StoreError::Backend` if the write or delete fails
    async fn save(&self, record: Option<&TokenRecord>) -> Result<(), StoreError>;
}

/// Sends one HTTP request and returns status, headers and body
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    /// Send a request
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    ///
    /// # Errors
    /// Returns `AuthError::Transport` if no response was received
    async fn send(&self, request: HttpRequest) -> AuthResult<HttpResponse>;
}

/// Why the external authorization UI did not produce a callback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationUiError {
    /// The user dismissed the UI
    #[error("authorization canceled")]
    Canceled,

    /// Anything else, with a user-presentable description
    #[error("{0}")]
    Failed(String),
}

/// External user-facing authorization step (system browser, web view)
#[async_trait]
pub trait AuthorizationUi: Send + Sync {
    /// Present `request.url` and wait for the redirect back
    ///
    /// # Returns
    /// The full callback URL the provider redirected to
    ///
    /// # Errors
    /// `Canceled` when the user dismissed the UI, `Failed` otherwise
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<Url, AuthorizationUiError>;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
