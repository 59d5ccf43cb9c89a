//! Platform-independent core of the authflow OAuth 2.0 session manager.
//!
//! # Safety and Quality
//!
//! The core never touches the network, the keychain or a browser directly.
//! Those capabilities are injected through the traits in [`auth::traits`] so
//! the whole token lifecycle can be driven from tests.
//!
//! # Feature Tiers
//!
//! - default: PKCE, token lifecycle manager, error taxonomy, test doubles
//! - `platform`: keyring-backed [`security::KeychainProvider`]
//! - `test-utils`: in-memory doubles in [`testing`] (enabled by default)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod error;
pub mod security;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use auth::{
    AuthorizationRequest, AuthorizationUi, AuthorizationUiError, HttpExecutor, LoginOutcome,
    OAuthConfig, SessionPhase, SessionSnapshot, TokenLifecycleManager, TokenRecord, TokenStatus,
    TokenStore, UserProfile,
};
pub use error::{AuthError, AuthResult, StoreError};
#[cfg(feature = "platform")]
pub use security::KeychainProvider;
pub use security::{KeychainError, SecretStore};
