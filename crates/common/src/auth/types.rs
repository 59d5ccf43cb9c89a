//! OAuth 2.0 types and structures
//!
//! Token record, provider responses, user profile and provider
//! configuration.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AuthError, AuthResult};

/// Default storage account under which the token record is persisted
pub const DEFAULT_STORAGE_ACCOUNT: &str = "google.oauth.state";

/// Tokens are refreshed once they are within this many seconds of expiry
pub const DEFAULT_REFRESH_LEEWAY_SECONDS: i64 = 60;

/// Persisted OAuth session
///
/// Replaced wholesale on every exchange or refresh. `expires_at` is an
/// absolute instant, never a duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Bearer token for API calls, never empty
    pub access_token: String,

    /// Absolute expiration timestamp (UTC)
    pub expires_at: DateTime<Utc>,

    /// Refresh token, absent when the provider did not issue one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenRecord {
    /// Create a record expiring `expires_in` seconds after `now`
    ///
    /// # Errors
    /// Returns `AuthError::ResponseUndecodable` if the expiry instant is out
    /// of range
    pub fn new(
        access_token: String,
        expires_in: i64,
        refresh_token: Option<String>,
        now: DateTime<Utc>,
    ) -> AuthResult<Self> {
        let expires_at = chrono::Duration::try_seconds(expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::ResponseUndecodable("token response: expires_in out of range".to_string())
            })?;
        Ok(Self { access_token, expires_at, refresh_token })
    }

    /// Whether the token is still valid beyond `leeway_seconds` from `now`
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        chrono::Duration::try_seconds(leeway_seconds)
            .and_then(|leeway| now.checked_add_signed(leeway))
            .is_some_and(|threshold| self.expires_at > threshold)
    }

    /// Seconds between `now` and expiry (negative once expired)
    #[must_use]
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }

    /// Mark the access token as expired so the next validity check refreshes
    pub fn force_expire(&mut self) {
        self.expires_at = DateTime::<Utc>::MIN_UTC;
    }
}

/// OAuth token response from authorization server
///
/// Standard OAuth 2.0 token response format (RFC 6749 §5.1).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer access token
    pub access_token: String,
    /// Lifetime in seconds from the moment of issue
    pub expires_in: i64,
    /// Usually "Bearer"
    pub token_type: String,
    /// Granted scopes, space separated
    #[serde(default)]
    pub scope: Option<String>,
    /// Present on the first exchange, often omitted on refresh
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// OpenID Connect ID token (not validated)
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Authenticated user as shown by the UI
///
/// Derived from the userinfo endpoint, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// Full name as reported by the provider
    pub display_name: String,
    /// Primary email address
    pub email: String,
    /// Profile picture, when the provider sent a valid URL
    pub avatar_url: Option<Url>,
}

/// OpenID Connect userinfo response
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfoResponse {
    /// `name` claim
    pub name: String,
    /// `email` claim
    pub email: String,
    /// `picture` claim, raw
    #[serde(default)]
    pub picture: Option<String>,
}

impl From<UserInfoResponse> for UserProfile {
    fn from(response: UserInfoResponse) -> Self {
        // An unparsable picture is dropped, not treated as a failure
        let avatar_url = response.picture.as_deref().and_then(|raw| Url::parse(raw).ok());
        Self { display_name: response.name, email: response.email, avatar_url }
    }
}

/// In-flight authorization attempt, held in memory only
///
/// Losing it (process restart mid-flow) makes any returning callback fail
/// state validation.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    /// CSRF value the callback must echo back
    pub state: String,
    /// PKCE verifier sent with the code exchange
    pub code_verifier: String,
}

/// What the external authorization UI needs to present one login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// Authorization URL with every query parameter filled in
    pub url: Url,

    /// Scheme of the redirect URI the UI must intercept
    pub callback_scheme: String,

    /// Always `false`: existing provider cookies are reused
    pub ephemeral_session: bool,
}

/// OAuth configuration for one authorization server
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Authorization endpoint opened in the external UI
    pub authorization_endpoint: Url,

    /// Token endpoint for code exchange and refresh
    pub token_endpoint: Url,

    /// OpenID Connect userinfo endpoint
    pub userinfo_endpoint: Url,

    /// OAuth client ID (public client, no secret)
    pub client_id: String,

    /// Redirect URI; its scheme is what the external UI intercepts
    pub redirect_uri: String,

    /// Scopes to request
    pub scopes: Vec<String>,

    /// Account key of the single persisted token record
    pub storage_account: String,

    /// Seconds before expiry at which a token is treated as expired
    pub refresh_leeway_seconds: i64,

    /// Upper bound for a single token endpoint call
    pub token_timeout: Duration,
}

impl OAuthConfig {
    /// Create a configuration with explicit endpoints and default tuning
    #[must_use]
    pub fn new(
        authorization_endpoint: Url,
        token_endpoint: Url,
        userinfo_endpoint: Url,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            authorization_endpoint,
            token_endpoint,
            userinfo_endpoint,
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes,
            storage_account: DEFAULT_STORAGE_ACCOUNT.to_string(),
            refresh_leeway_seconds: DEFAULT_REFRESH_LEEWAY_SECONDS,
            token_timeout: Duration::from_secs(30),
        }
    }

    /// Google sign-in with the `openid email profile` scopes
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the built-in endpoints fail to parse
    pub fn google(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> AuthResult<Self> {
        Ok(Self::new(
            parse_endpoint("https://accounts.google.com/o/oauth2/v2/auth")?,
            parse_endpoint("https://oauth2.googleapis.com/token")?,
            parse_endpoint("https://openidconnect.googleapis.com/v1/userinfo")?,
            client_id,
            redirect_uri,
            vec!["openid".to_string(), "email".to_string(), "profile".to_string()],
        ))
    }

    /// Override the storage account key
    #[must_use]
    pub fn with_storage_account(mut self, account: impl Into<String>) -> Self {
        self.storage_account = account.into();
        self
    }

    /// Override the token endpoint timeout
    #[must_use]
    pub fn with_token_timeout(mut self, timeout: Duration) -> Self {
        self.token_timeout = timeout;
        self
    }

    /// Get scopes as space-separated string
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    /// Scheme of the redirect URI, as handed to the external UI
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the redirect URI does not parse
    pub fn callback_scheme(&self) -> AuthResult<String> {
        Url::parse(&self.redirect_uri)
            .map(|url| url.scheme().to_string())
            .map_err(|e| AuthError::Config(format!("invalid redirect URI: {e}")))
    }

    /// Reject configurations that cannot complete a login
    ///
    /// # Errors
    /// Returns `AuthError::Config` describing the first problem found
    pub fn validate(&self) -> AuthResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::Config("client_id is empty".to_string()));
        }
        if self.scopes.is_empty() {
            return Err(AuthError::Config("at least one scope is required".to_string()));
        }
        if self.storage_account.is_empty() {
            return Err(AuthError::Config("storage account is empty".to_string()));
        }
        self.callback_scheme().map(|_| ())
    }
}

fn parse_endpoint(raw: &str) -> AuthResult<Url> {
    Url::parse(raw).map_err(|e| AuthError::Config(format!("invalid endpoint {raw}: {e}")))
}
