//! OAuth 2.0 Authorization Code + PKCE session management
//!
//! This module drives a single sign-in session for a native application:
//! it builds the authorization request, validates the redirect, exchanges
//! the code, keeps the access token fresh and fetches the user profile.
//!
//! # Features
//!
//! - **PKCE Flow**: RFC 7636 S256 challenge with a 64-character verifier
//! - **CSRF Protection**: single-use 24-character state nonce per attempt
//! - **Token Lifecycle**: refresh 60 s before expiry, persisted before return
//! - **Retry on 401**: one forced refresh and one retry of the userinfo call
//! - **Observable State**: [`SessionSnapshot`] published via `tokio::sync::watch`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │  TokenLifecycleManager   │  Session state machine
//! └────────────┬─────────────┘
//!              │
//!              ├──► OAuthClient          (authorization URL, token endpoint)
//!              │         │
//!              │         └──► HttpExecutor   (injected transport)
//!              ├──► userinfo             (profile fetch)
//!              ├──► TokenStore           (injected persistence)
//!              │         │
//!              │         └──► KeychainTokenStore ──► SecretStore
//!              ├──► AuthorizationUi      (injected browser / web view)
//!              └──► PKCE utilities       (challenge generation)
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use authflow_common::auth::{OAuthConfig, TokenLifecycleManager};
//! use authflow_common::testing::{InMemoryTokenStore, MockAuthorizationUi, MockHttpExecutor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OAuthConfig::google("your_client_id", "com.example.app:/oauth2redirect")?;
//!     let manager = TokenLifecycleManager::new(
//!         config,
//!         Arc::new(InMemoryTokenStore::new()),
//!         Arc::new(MockHttpExecutor::new()),
//!     );
//!
//!     // Pick up a previous session, if any
//!     if !manager.restore_session().await {
//!         let ui = MockAuthorizationUi::approving("com.example.app:/oauth2redirect", "code");
//!         manager.login(&ui).await?;
//!     }
//!
//!     let token = manager.access_token().await?;
//!     println!("Bearer {token}");
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod keychain;
pub mod pkce;
pub mod session;
pub mod token_manager;
pub mod traits;
pub mod types;
pub mod userinfo;

pub use client::OAuthClient;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use keychain::KeychainTokenStore;
pub use pkce::{pkce_challenge, random_url_safe_string, validate_state, PKCEChallenge};
pub use session::{SessionPhase, SessionSnapshot};
pub use token_manager::{LoginOutcome, TokenLifecycleManager, TokenStatus};
pub use traits::{
    AuthorizationUi, AuthorizationUiError, Clock, HttpExecutor, SystemClock, TokenStore,
};
pub use types::{
    AuthorizationRequest, OAuthConfig, PendingAuthorization, TokenRecord, TokenResponse,
    UserInfoResponse, UserProfile, DEFAULT_REFRESH_LEEWAY_SECONDS, DEFAULT_STORAGE_ACCOUNT,
};
pub use userinfo::{fetch_user_info, UserInfoOutcome};
