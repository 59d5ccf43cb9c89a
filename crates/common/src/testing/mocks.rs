//! Mock implementations of the injected capabilities
//!
//! In-memory token store, scripted HTTP executor, scripted authorization UI
//! and an in-memory secret store.

// Allow missing error docs for test mocks - errors are clearly indicated by
// their return types
#![allow(clippy::missing_errors_doc)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::auth::http::{HttpRequest, HttpResponse};
use crate::auth::{
    AuthorizationRequest, AuthorizationUi, AuthorizationUiError, HttpExecutor, TokenRecord,
    TokenStore,
};
use crate::error::{AuthError, AuthResult, StoreError};
use crate::security::{KeychainError, SecretStore};

// Type aliases to reduce complexity
type ScriptedResponse = Result<HttpResponse, String>;
type ResponseMap = Arc<Mutex<HashMap<String, ScriptedResponse>>>;
type ResponseSequenceMap = Arc<Mutex<HashMap<String, VecDeque<ScriptedResponse>>>>;
type RequestLog = Arc<Mutex<Vec<HttpRequest>>>;

/// Endpoint key: the URL without query or fragment
fn endpoint_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.to_string()
}

fn normalize(raw: &str) -> String {
    Url::parse(raw).map(|url| endpoint_key(&url)).unwrap_or_else(|_| raw.to_string())
}

// ----------------------------------------------------------------------------
// HTTP
// ----------------------------------------------------------------------------

/// Scripted [`HttpExecutor`]
///
/// Responses are looked up by endpoint (URL without query): first the
/// endpoint's sequence, then its fixed response, then the unrouted FIFO
/// queue fed by [`push_json`](Self::push_json). Every request is logged.
///
/// # Examples
///
/// ```
/// use authflow_common::testing::MockHttpExecutor;
///
/// let http = MockHttpExecutor::new();
/// http.add_response_sequence(
///     "https://openidconnect.googleapis.com/v1/userinfo",
///     vec![(401, ""), (200, r#"{"name":"Ann","email":"ann@x.com"}"#)],
/// );
/// assert_eq!(http.request_count("https://openidconnect.googleapis.com/v1/userinfo"), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockHttpExecutor {
    responses: ResponseMap,
    response_sequences: ResponseSequenceMap,
    unrouted: Arc<Mutex<VecDeque<ScriptedResponse>>>,
    requests: RequestLog,
    delay: Option<Duration>,
}

impl MockHttpExecutor {
    /// Create a mock with no scripted responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before answering each request
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fixed response for an endpoint, returned once its sequence is empty
    pub fn add_response(&self, url: &str, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize(url), Ok(HttpResponse::new(status, body)));
    }

    /// Responses returned in order for an endpoint
    pub fn add_response_sequence(&self, url: &str, responses: Vec<(u16, &str)>) {
        let mut sequences = self.response_sequences.lock().unwrap_or_else(PoisonError::into_inner);
        let sequence = sequences.entry(normalize(url)).or_default();
        sequence.extend(
            responses.into_iter().map(|(status, body)| Ok(HttpResponse::new(status, body))),
        );
    }

    /// Make the next request to an endpoint fail at the transport level
    pub fn add_transport_error(&self, url: &str, message: &str) {
        let mut sequences = self.response_sequences.lock().unwrap_or_else(PoisonError::into_inner);
        sequences.entry(normalize(url)).or_default().push_back(Err(message.to_string()));
    }

    /// Queue a response for whichever request comes next without a route
    pub fn push_json(&self, status: u16, body: &str) {
        self.unrouted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(HttpResponse::new(status, body)));
    }

    /// Get all requests that were made
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Requests made to an endpoint (query ignored)
    #[must_use]
    pub fn requests_to(&self, url: &str) -> Vec<HttpRequest> {
        let key = normalize(url);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|request| endpoint_key(&request.url) == key)
            .cloned()
            .collect()
    }

    /// Get the number of requests made to an endpoint
    #[must_use]
    pub fn request_count(&self, url: &str) -> usize {
        self.requests_to(url).len()
    }

    /// Get the last request made
    #[must_use]
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }

    /// Clear all recorded requests
    pub fn clear_requests(&self) {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn next_response(&self, key: &str) -> Option<ScriptedResponse> {
        let queued = self
            .response_sequences
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(key)
            .and_then(VecDeque::pop_front);
        if queued.is_some() {
            return queued;
        }
        let fixed = self.responses.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned();
        if fixed.is_some() {
            return fixed;
        }
        self.unrouted.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
    }
}

#[async_trait]
impl HttpExecutor for MockHttpExecutor {
    async fn send(&self, request: HttpRequest) -> AuthResult<HttpResponse> {
        let key = endpoint_key(&request.url);
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_response(&key) {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(AuthError::Transport(message)),
            None => Err(AuthError::Transport(format!("no response configured for {key}"))),
        }
    }
}

// ----------------------------------------------------------------------------
// Token store
// ----------------------------------------------------------------------------

/// In-memory [`TokenStore`] holding the JSON-encoded record
///
/// # Examples
///
/// ```
/// use authflow_common::testing::InMemoryTokenStore;
///
/// let store = InMemoryTokenStore::with_raw("{not json");
/// assert!(store.stored_record().is_none());
/// assert!(store.raw().is_some());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    raw: Mutex<Option<String>>,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
    saves: AtomicUsize,
    deletes: AtomicUsize,
}

impl InMemoryTokenStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a record
    pub fn with_record(record: &TokenRecord) -> Self {
        let store = Self::new();
        let serialized = serde_json::to_string(record).ok();
        *store.raw.lock().unwrap_or_else(PoisonError::into_inner) = serialized;
        store
    }

    /// Store pre-seeded with arbitrary bytes (e.g. undecodable)
    pub fn with_raw(raw: impl Into<String>) -> Self {
        let store = Self::new();
        *store.raw.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw.into());
        store
    }

    /// Make every save and delete fail with a backend error
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every load fail with a backend error
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Decoded stored record, `None` if absent or undecodable
    #[must_use]
    pub fn stored_record(&self) -> Option<TokenRecord> {
        self.raw
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    /// Serialized record exactly as saved
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.raw.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of successful writes of a record
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Number of successful deletes
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn load(&self) -> Result<Option<TokenRecord>, StoreError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("load failure injected".to_string()));
        }
        match self.raw.lock().unwrap_or_else(PoisonError::into_inner).as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, record: Option<&TokenRecord>) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("save failure injected".to_string()));
        }
        let mut raw = self.raw.lock().unwrap_or_else(PoisonError::into_inner);
        match record {
            Some(record) => {
                *raw = Some(
                    serde_json::to_string(record).map_err(|e| StoreError::Backend(e.to_string()))?,
                );
                self.saves.fetch_add(1, Ordering::SeqCst);
            }
            None => {
                *raw = None;
                self.deletes.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Authorization UI
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum UiBehavior {
    /// Redirect back with the request's own state and this code
    Approve { redirect_uri: String, code: String },
    /// Redirect back to this exact URL
    Callback(Url),
    Cancel,
    Fail(String),
}

/// Scripted [`AuthorizationUi`]
#[derive(Debug, Clone)]
pub struct MockAuthorizationUi {
    behavior: UiBehavior,
    presented: Arc<Mutex<Vec<AuthorizationRequest>>>,
}

impl MockAuthorizationUi {
    fn with_behavior(behavior: UiBehavior) -> Self {
        Self { behavior, presented: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Approve: redirect to `redirect_uri?state=<request state>&code=<code>`
    pub fn approving(redirect_uri: impl Into<String>, code: impl Into<String>) -> Self {
        Self::with_behavior(UiBehavior::Approve {
            redirect_uri: redirect_uri.into(),
            code: code.into(),
        })
    }

    /// Redirect to a fixed callback URL regardless of the request
    pub fn with_callback(callback: Url) -> Self {
        Self::with_behavior(UiBehavior::Callback(callback))
    }

    /// The user dismisses the UI
    pub fn canceling() -> Self {
        Self::with_behavior(UiBehavior::Cancel)
    }

    /// The UI fails with a description
    pub fn failing(description: impl Into<String>) -> Self {
        Self::with_behavior(UiBehavior::Fail(description.into()))
    }

    /// Requests the UI was asked to present
    #[must_use]
    pub fn presented(&self) -> Vec<AuthorizationRequest> {
        self.presented.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// `state` query parameter of an authorization URL
#[must_use]
pub fn state_param(url: &Url) -> Option<String> {
    url.query_pairs().find(|(key, _)| key == "state").map(|(_, value)| value.into_owned())
}

#[async_trait]
impl AuthorizationUi for MockAuthorizationUi {
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<Url, AuthorizationUiError> {
        self.presented.lock().unwrap_or_else(PoisonError::into_inner).push(request.clone());
        match &self.behavior {
            UiBehavior::Approve { redirect_uri, code } => {
                let mut callback = Url::parse(redirect_uri)
                    .map_err(|e| AuthorizationUiError::Failed(e.to_string()))?;
                let state = state_param(&request.url).unwrap_or_default();
                callback.query_pairs_mut().append_pair("state", &state).append_pair("code", code);
                Ok(callback)
            }
            UiBehavior::Callback(url) => Ok(url.clone()),
            UiBehavior::Cancel => Err(AuthorizationUiError::Canceled),
            UiBehavior::Fail(description) => Err(AuthorizationUiError::Failed(description.clone())),
        }
    }
}

// ----------------------------------------------------------------------------
// Secret store
// ----------------------------------------------------------------------------

/// In-memory [`SecretStore`] standing in for the platform keychain
#[derive(Debug, Clone, Default)]
pub struct MockKeychainProvider {
    service_name: String,
    storage: Arc<Mutex<HashMap<String, String>>>,
    undecodable: Arc<Mutex<HashSet<String>>>,
    fail_access: Arc<AtomicBool>,
}

impl MockKeychainProvider {
    /// Empty keychain for one service
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into(), ..Self::default() }
    }

    /// Service the mock was created for
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Make every operation fail as if the keychain were locked
    pub fn fail_access(&self, fail: bool) {
        self.fail_access.store(fail, Ordering::SeqCst);
    }

    /// Replace a secret with bytes that are not valid UTF-8
    pub fn corrupt(&self, key: &str) {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
        self.undecodable.lock().unwrap_or_else(PoisonError::into_inner).insert(key.to_string());
    }

    /// Drop every stored secret
    pub fn clear_all(&self) {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.undecodable.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn forget_corruption(&self, key: &str) {
        self.undecodable.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
    }

    fn check_access(&self) -> Result<(), KeychainError> {
        if self.fail_access.load(Ordering::SeqCst) {
            return Err(KeychainError::AccessFailed("keychain locked".to_string()));
        }
        Ok(())
    }
}

impl SecretStore for MockKeychainProvider {
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        self.check_access()?;
        self.forget_corruption(key);
        self.storage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        self.check_access()?;
        if self.undecodable.lock().unwrap_or_else(PoisonError::into_inner).contains(key) {
            return Err(KeychainError::Undecodable(key.to_string()));
        }
        self.storage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or(KeychainError::NotFound)
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        self.check_access()?;
        self.forget_corruption(key);
        self.storage.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
        Ok(())
    }
}
