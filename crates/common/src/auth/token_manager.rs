//! Token lifecycle manager
//!
//! Drives one OAuth session end to end:
//! - Login: PKCE + state generation, authorization URL, callback validation
//! - Code exchange and refresh, persisted before the mutating call returns
//! - Expiry-aware gating of every authenticated call
//! - Userinfo fetch with one forced refresh and retry on 401
//! - Observable [`SessionSnapshot`] published after each transition
//!
//! Public operations are expected to run serially from one controlling task.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use super::client::OAuthClient;
use super::pkce::{validate_state, PKCEChallenge};
use super::session::{SessionPhase, SessionSnapshot, SessionState};
use super::traits::{
    AuthorizationUi, AuthorizationUiError, Clock, HttpExecutor, SystemClock, TokenStore,
};
use super::types::{
    AuthorizationRequest, OAuthConfig, PendingAuthorization, TokenRecord, UserProfile,
};
use super::userinfo::{fetch_user_info, UserInfoOutcome};
use crate::error::{AuthError, AuthResult, StoreError};

/// Userinfo is tried at most twice: once, then once more after a forced
/// refresh
const USERINFO_ATTEMPTS: usize = 2;

/// Result of a validity check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// No token record exists at all
    NoSession,
    /// The current access token is valid beyond the refresh leeway
    Valid,
    /// The access token was refreshed and persisted
    Refreshed,
}

/// How a login attempt ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Tokens were exchanged and the profile loaded
    SignedIn,
    /// The user dismissed the authorization UI
    Canceled,
}

/// OAuth 2.0 + PKCE session manager
///
/// Owns the single [`TokenRecord`], the in-flight
/// [`PendingAuthorization`] and the observable session state. Storage and
/// transport are injected.
pub struct TokenLifecycleManager<S: TokenStore, H: HttpExecutor> {
    client: OAuthClient<H>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    token: RwLock<Option<TokenRecord>>,
    pending: Mutex<Option<PendingAuthorization>>,
    state: SessionState,
}

impl<S: TokenStore, H: HttpExecutor> TokenLifecycleManager<S, H> {
    /// Create a signed-out manager
    ///
    /// # Arguments
    /// * `config` - Provider endpoints, client id, redirect URI and scopes
    /// * `store` - Persistent store for the token record
    /// * `http` - Executor for token and userinfo requests
    pub fn new(config: OAuthConfig, store: Arc<S>, http: Arc<H>) -> Self {
        Self {
            client: OAuthClient::new(config, http),
            store,
            clock: Arc::new(SystemClock),
            token: RwLock::new(None),
            pending: Mutex::new(None),
            state: SessionState::new(),
        }
    }

    /// Replace the wall clock (tests)
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Provider configuration in use
    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        self.client.config()
    }

    /// Subscribe to session snapshots
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Current session snapshot
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    // ------------------------------------------------------------------
    // Login
    // ------------------------------------------------------------------

    /// Start a login attempt without presenting any UI
    ///
    /// Generates a 64-character verifier, its S256 challenge and a
    /// 24-character state nonce, and builds the authorization URL. Any
    /// previously pending attempt is discarded; its state can never match
    /// again.
    ///
    /// # Errors
    /// - `InvalidTransition` unless signed out or already authorizing
    /// - `Config` if the redirect URI has no usable scheme
    pub fn begin_login(&self) -> AuthResult<AuthorizationRequest> {
        let phase = self.state.phase();
        if !matches!(
            phase,
            SessionPhase::SignedOut | SessionPhase::AuthorizingPending | SessionPhase::Error(_)
        ) {
            return Err(AuthError::InvalidTransition { operation: "login", phase: phase.to_string() });
        }

        let callback_scheme = self.config().callback_scheme()?;
        let challenge = PKCEChallenge::generate();
        let url = self.client.authorization_url(&challenge);

        let pending = PendingAuthorization {
            state: challenge.state,
            code_verifier: challenge.code_verifier,
        };
        let superseded = self.replace_pending(Some(pending)).is_some();

        self.state.update(|s| {
            s.phase = SessionPhase::AuthorizingPending;
            s.loading = true;
            s.error_message = None;
        });
        info!(superseded, "Login started");

        Ok(AuthorizationRequest { url, callback_scheme, ephemeral_session: false })
    }

    /// Run a full login through the external authorization UI
    ///
    /// Cancellation by the user is a normal outcome, reported as
    /// `Ok(LoginOutcome::Canceled)` with "Login canceled." in the snapshot.
    ///
    /// # Errors
    /// - `InvalidTransition` if a session is active or being exchanged
    /// - Any callback, exchange or profile failure; its user message is
    ///   already published and the manager is back to signed out
    pub async fn login<U>(&self, ui: &U) -> AuthResult<LoginOutcome>
    where
        U: AuthorizationUi + ?Sized,
    {
        let request = self.begin_login()?;
        match ui.authorize(&request).await {
            Ok(callback) => self.handle_callback(Some(&callback), None).await,
            Err(err) => self.handle_callback(None, Some(err)).await,
        }
    }

    /// Abandon the pending login attempt
    pub fn cancel_login(&self) {
        if self.state.phase() != SessionPhase::AuthorizingPending {
            return;
        }
        self.replace_pending(None);
        self.state.fail(AuthError::UserCanceled.user_message(), SessionPhase::SignedOut);
        self.state.update(|s| s.loading = false);
        info!("Login canceled");
    }

    /// Complete a login attempt from what the authorization UI returned
    ///
    /// The pending request is consumed whatever the outcome. The loading
    /// flag is cleared on every exit path.
    ///
    /// # Errors
    /// - `InvalidTransition` if a session is already active
    /// - `CallbackInvalid`, `ProviderError`, `StateMismatch`,
    ///   `AuthorizationUi` for rejected callbacks
    /// - `TokenExchangeFailed`, `ResponseUndecodable`, `Transport`,
    ///   `AuthenticationRequired` from the exchange or profile fetch
    pub async fn handle_callback(
        &self,
        callback: Option<&Url>,
        error: Option<AuthorizationUiError>,
    ) -> AuthResult<LoginOutcome> {
        let phase = self.state.phase();
        if matches!(
            phase,
            SessionPhase::SignedIn | SessionPhase::Exchanging | SessionPhase::Refreshing
        ) {
            return Err(AuthError::InvalidTransition {
                operation: "handle_callback",
                phase: phase.to_string(),
            });
        }

        let _loading = self.state.begin_loading();
        let pending = self.replace_pending(None);

        match self.complete_callback(pending, callback, error).await {
            Ok(profile) => {
                self.state.update(|s| {
                    s.phase = SessionPhase::SignedIn;
                    s.user = Some(profile);
                });
                info!("Login completed");
                Ok(LoginOutcome::SignedIn)
            }
            Err(AuthError::UserCanceled) => {
                self.state.fail(AuthError::UserCanceled.user_message(), SessionPhase::SignedOut);
                info!("Login canceled by user");
                Ok(LoginOutcome::Canceled)
            }
            Err(err) => {
                warn!(error = %err, "Login failed");
                self.state.fail(err.user_message(), SessionPhase::SignedOut);
                Err(err)
            }
        }
    }

    async fn complete_callback(
        &self,
        pending: Option<PendingAuthorization>,
        callback: Option<&Url>,
        error: Option<AuthorizationUiError>,
    ) -> AuthResult<UserProfile> {
        match error {
            Some(AuthorizationUiError::Canceled) => return Err(AuthError::UserCanceled),
            Some(AuthorizationUiError::Failed(description)) => {
                return Err(AuthError::AuthorizationUi(description))
            }
            None => {}
        }

        let url = callback.ok_or_else(|| AuthError::CallbackInvalid("no callback URL".into()))?;
        if url.query().is_none() {
            return Err(AuthError::CallbackInvalid("callback URL has no query".into()));
        }
        let param = |name: &str| {
            url.query_pairs().find(|(key, _)| key == name).map(|(_, value)| value.into_owned())
        };

        if let Some(provider_error) = param("error") {
            return Err(AuthError::ProviderError(provider_error));
        }

        let pending = pending.ok_or(AuthError::StateMismatch)?;
        let code = match (param("state"), param("code")) {
            (Some(state), Some(code)) if validate_state(&pending.state, &state) => code,
            _ => return Err(AuthError::StateMismatch),
        };

        self.state.set_phase(SessionPhase::Exchanging);
        self.exchange_code(&code, &pending.code_verifier).await?;

        match self.load_profile().await {
            Ok(profile) => Ok(profile),
            Err(err) => {
                // Signed out must not leave a token behind
                self.drop_session().await;
                Err(err)
            }
        }
    }

    /// Exchange an authorization code for tokens and persist them
    ///
    /// A persistence failure is published as "Storage error: …" and does not
    /// undo the in-memory record.
    ///
    /// # Errors
    /// - `TokenExchangeFailed` carrying the status and body text
    /// - `ResponseUndecodable` for a malformed 2xx body
    /// - `Transport` on executor failure or timeout
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> AuthResult<()> {
        let token = self.client.exchange_code(code, code_verifier).await?;
        let record = TokenRecord::new(
            token.access_token,
            token.expires_in,
            token.refresh_token,
            self.clock.now(),
        )?;
        debug!(expires_at = %record.expires_at, has_refresh = record.refresh_token.is_some(), "Code exchanged");
        self.persist_or_report(Some(record)).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Token validity
    // ------------------------------------------------------------------

    /// Make sure the access token is usable, refreshing it if needed
    ///
    /// A token is valid while it expires more than the refresh leeway from
    /// now; no network call is made in that case.
    ///
    /// # Errors
    /// - `AuthenticationRequired` if expired without a refresh token, or the
    ///   refresh was rejected. When signed in, the session is cleared.
    /// - `ResponseUndecodable` / `Transport` from the refresh call
    pub async fn ensure_valid_token(&self) -> AuthResult<TokenStatus> {
        let result = self.ensure_valid_token_inner().await;
        if let Err(err) = &result {
            self.report_signed_in_failure(err).await;
        }
        result
    }

    async fn ensure_valid_token_inner(&self) -> AuthResult<TokenStatus> {
        let Some(record) = self.token.read().await.clone() else {
            return Ok(TokenStatus::NoSession);
        };
        if record.is_valid_at(self.clock.now(), self.config().refresh_leeway_seconds) {
            return Ok(TokenStatus::Valid);
        }
        let Some(refresh_token) = record.refresh_token.clone() else {
            debug!("Access token expired and no refresh token is available");
            return Err(AuthError::AuthenticationRequired);
        };

        let previous = self.state.phase();
        self.state.set_phase(SessionPhase::Refreshing);
        let result = self.client.refresh(&refresh_token).await;
        self.state.set_phase(previous);

        let token = result?;
        let refreshed = TokenRecord::new(
            token.access_token,
            token.expires_in,
            record.refresh_token.or(token.refresh_token),
            self.clock.now(),
        )?;
        info!(expires_at = %refreshed.expires_at, "Access token refreshed");
        self.persist_or_report(Some(refreshed)).await;
        Ok(TokenStatus::Refreshed)
    }

    /// Currently valid access token, refreshing first if needed
    ///
    /// # Errors
    /// `AuthenticationRequired` when there is no session, plus anything
    /// [`ensure_valid_token`](Self::ensure_valid_token) returns
    pub async fn access_token(&self) -> AuthResult<String> {
        self.ensure_valid_token().await?;
        self.token
            .read()
            .await
            .as_ref()
            .map(|record| record.access_token.clone())
            .ok_or(AuthError::AuthenticationRequired)
    }

    // ------------------------------------------------------------------
    // Profile
    // ------------------------------------------------------------------

    /// Fetch the user profile and publish it
    ///
    /// On a 401 the in-memory token is force-expired (never persisted),
    /// refreshed, and the request retried exactly once.
    ///
    /// # Errors
    /// - `AuthenticationRequired` without an access token, or on a second
    ///   401. When signed in, the session is cleared.
    /// - `ResponseUndecodable` for other statuses or a malformed body
    pub async fn fetch_profile(&self) -> AuthResult<UserProfile> {
        match self.load_profile().await {
            Ok(profile) => {
                if self.state.phase() == SessionPhase::SignedIn {
                    let published = profile.clone();
                    self.state.update(|s| s.user = Some(published));
                }
                Ok(profile)
            }
            Err(err) => {
                self.report_signed_in_failure(&err).await;
                Err(err)
            }
        }
    }

    async fn load_profile(&self) -> AuthResult<UserProfile> {
        let endpoint = &self.config().userinfo_endpoint;
        for attempt in 1..=USERINFO_ATTEMPTS {
            self.ensure_valid_token_inner().await?;
            let access_token = self
                .token
                .read()
                .await
                .as_ref()
                .map(|record| record.access_token.clone())
                .ok_or(AuthError::AuthenticationRequired)?;

            match fetch_user_info(self.client.http().as_ref(), endpoint, &access_token).await? {
                UserInfoOutcome::Profile(profile) => return Ok(profile),
                UserInfoOutcome::Unauthorized if attempt < USERINFO_ATTEMPTS => {
                    debug!(attempt, "Userinfo rejected the access token; forcing refresh");
                    if let Some(record) = self.token.write().await.as_mut() {
                        record.force_expire();
                    }
                }
                UserInfoOutcome::Unauthorized => {}
            }
        }
        Err(AuthError::AuthenticationRequired)
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Restore the persisted session on startup
    ///
    /// An absent or undecodable record leaves the manager signed out with no
    /// message (an undecodable record is also deleted). Any failure while
    /// validating or fetching the profile clears the session silently.
    ///
    /// # Returns
    /// `true` if a session was restored and the user is signed in
    pub async fn restore_session(&self) -> bool {
        if self.state.phase() != SessionPhase::SignedOut {
            debug!(phase = %self.state.phase(), "Restore skipped; session already active");
            return self.is_authenticated().await;
        }

        let _loading = self.state.begin_loading();
        let record = match self.store.load().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("No persisted session");
                return false;
            }
            Err(StoreError::Decode(reason)) => {
                warn!(%reason, "Persisted session undecodable; deleting");
                self.delete_persisted().await;
                return false;
            }
            Err(err) => {
                warn!(error = %err, "Persisted session could not be loaded");
                return false;
            }
        };

        *self.token.write().await = Some(record);
        match self.load_profile().await {
            Ok(profile) => {
                self.state.update(|s| {
                    s.phase = SessionPhase::SignedIn;
                    s.user = Some(profile);
                    s.error_message = None;
                });
                info!("Session restored");
                true
            }
            Err(err) => {
                warn!(error = %err, "Restored session unusable; clearing");
                self.drop_session().await;
                false
            }
        }
    }

    /// Sign out locally
    ///
    /// Deletes the persisted record and clears the token, user and any
    /// pending login. Storage failures are logged and otherwise ignored.
    pub async fn logout(&self) {
        self.replace_pending(None);
        self.drop_session().await;
        self.state.update(|s| {
            s.phase = SessionPhase::SignedOut;
            s.loading = false;
            s.error_message = None;
        });
        info!("Logged out");
    }

    /// Replace the token record and persist it before returning
    ///
    /// `None` deletes the persisted record. Readers of the token wait until
    /// the store has answered. Memory is updated even when the store fails.
    ///
    /// # Errors
    /// `Storage` if the store rejected the write or delete
    pub async fn set_and_persist(&self, record: Option<TokenRecord>) -> AuthResult<()> {
        let mut current = self.token.write().await;
        let result = self.store.save(record.as_ref()).await;
        *current = record;
        result.map_err(|err| {
            warn!(error = %err, "Failed to persist token record");
            AuthError::Storage(err)
        })
    }

    // ------------------------------------------------------------------
    // Read-only helpers
    // ------------------------------------------------------------------

    /// Whether the user is signed in with a token record in memory
    pub async fn is_authenticated(&self) -> bool {
        self.state.phase() == SessionPhase::SignedIn && self.token.read().await.is_some()
    }

    /// Profile of the signed-in user
    #[must_use]
    pub fn current_user(&self) -> Option<UserProfile> {
        self.state.snapshot().user
    }

    /// Seconds until the access token expires, if there is one
    pub async fn seconds_until_expiry(&self) -> Option<i64> {
        let now = self.clock.now();
        self.token.read().await.as_ref().map(|record| record.seconds_until_expiry(now))
    }

    /// Copy of the in-memory token record
    pub async fn token_record(&self) -> Option<TokenRecord> {
        self.token.read().await.clone()
    }

    /// Whether a login attempt is waiting for its callback
    #[must_use]
    pub fn has_pending_login(&self) -> bool {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn replace_pending(&self, next: Option<PendingAuthorization>) -> Option<PendingAuthorization> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *pending, next)
    }

    async fn persist_or_report(&self, record: Option<TokenRecord>) {
        if let Err(err) = self.set_and_persist(record).await {
            let message = err.user_message();
            self.state.update(|s| s.error_message = Some(message));
        }
    }

    async fn delete_persisted(&self) {
        if let Err(err) = self.store.save(None).await {
            warn!(error = %err, "Failed to delete persisted session");
        }
    }

    /// Clear token (memory and store) and user, back to signed out
    async fn drop_session(&self) {
        if self.set_and_persist(None).await.is_err() {
            debug!("Session cleared in memory only");
        }
        self.state.update(|s| {
            s.phase = SessionPhase::SignedOut;
            s.user = None;
        });
    }

    /// Failures from a signed-in context are surfaced; only
    /// `AuthenticationRequired` ends the session.
    async fn report_signed_in_failure(&self, err: &AuthError) {
        if self.state.phase() != SessionPhase::SignedIn {
            return;
        }
        if err.is_authentication_required() {
            warn!("Session no longer valid; signing out");
            self.drop_session().await;
            self.state.fail(err.user_message(), SessionPhase::SignedOut);
        } else {
            self.state.fail(err.user_message(), SessionPhase::SignedIn);
        }
    }
}
