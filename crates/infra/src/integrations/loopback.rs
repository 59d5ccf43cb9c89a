//! Loopback-redirect authorization UI
//!
//! Implements [`AuthorizationUi`] for desktop clients registered with an
//! `http://127.0.0.1:<port>/<path>` redirect URI. A short-lived axum server
//! listens on that address, the authorization URL is handed to an opener
//! (normally the system browser) and the first request on the redirect path
//! that carries a query string is returned as the callback URL.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use authflow_common::auth::{AuthorizationRequest, AuthorizationUi, AuthorizationUiError};
use axum::extract::RawQuery;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::errors::{InfraError, InfraResult};

/// Default time to wait for the provider redirect
pub const DEFAULT_AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(300);

const LOOPBACK_HOSTS: [&str; 3] = ["127.0.0.1", "localhost", "[::1]"];

type Opener = Arc<dyn Fn(&Url) -> Result<(), String> + Send + Sync>;
type CallbackSlot = Arc<StdMutex<Option<oneshot::Sender<Url>>>>;

/// Receives the provider redirect on a loopback listener.
pub struct LoopbackAuthorizationUi {
    redirect: Url,
    opener: Opener,
    timeout: Duration,
    cancel: CancellationToken,
}

impl std::fmt::Debug for LoopbackAuthorizationUi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackAuthorizationUi")
            .field("redirect", &self.redirect.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl LoopbackAuthorizationUi {
    /// Create a UI for a loopback redirect URI.
    ///
    /// The default opener only logs the authorization URL.
    ///
    /// # Errors
    /// Returns `InfraError::Config` unless the URI is `http` on a loopback
    /// host with an explicit port.
    pub fn new(redirect_uri: &str) -> InfraResult<Self> {
        let redirect = Url::parse(redirect_uri)
            .map_err(|e| InfraError::Config(format!("invalid redirect URI: {e}")))?;

        if redirect.scheme() != "http" {
            return Err(InfraError::Config(format!(
                "loopback redirect must use http, got {}",
                redirect.scheme()
            )));
        }
        let host = redirect.host_str().unwrap_or_default();
        if !LOOPBACK_HOSTS.contains(&host) {
            return Err(InfraError::Config(format!("{host} is not a loopback host")));
        }
        if redirect.port().is_none() {
            return Err(InfraError::Config("loopback redirect needs an explicit port".into()));
        }

        Ok(Self {
            redirect,
            opener: Arc::new(|url: &Url| {
                info!(url = %url, "Open this URL in a browser to sign in");
                Ok(())
            }),
            timeout: DEFAULT_AUTHORIZATION_TIMEOUT,
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the opener that presents the authorization URL.
    #[must_use]
    pub fn with_opener<F>(mut self, opener: F) -> Self
    where
        F: Fn(&Url) -> Result<(), String> + Send + Sync + 'static,
    {
        self.opener = Arc::new(opener);
        self
    }

    /// How long to wait for the browser to return
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Token that aborts a running [`authorize`](AuthorizationUi::authorize)
    /// with `Canceled`.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Redirect URI the listener answers on
    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect
    }

    fn listen_addr(&self) -> String {
        let host = self.redirect.host_str().unwrap_or("127.0.0.1");
        let port = self.redirect.port().unwrap_or_default();
        format!("{host}:{port}")
    }
}

#[async_trait]
impl AuthorizationUi for LoopbackAuthorizationUi {
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<Url, AuthorizationUiError> {
        let addr = self.listen_addr();
        let listener = bind_listener(&addr)
            .await
            .map_err(|e| AuthorizationUiError::Failed(e.to_string()))?;

        let (callback_tx, callback_rx) = oneshot::channel();
        let slot: CallbackSlot = Arc::new(StdMutex::new(Some(callback_tx)));
        let base = self.redirect.clone();

        let app = Router::new().route(
            self.redirect.path(),
            get(move |RawQuery(query): RawQuery| {
                handle_redirect(query, base.clone(), slot.clone())
            }),
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!("loopback redirect server error: {}", err);
            }
        });

        debug!(%addr, "waiting for authorization redirect");

        let outcome = match (self.opener)(&request.url) {
            Err(reason) => Err(AuthorizationUiError::Failed(reason)),
            Ok(()) => tokio::select! {
                () = self.cancel.cancelled() => Err(AuthorizationUiError::Canceled),
                received = tokio::time::timeout(self.timeout, callback_rx) => match received {
                    Ok(Ok(url)) => Ok(url),
                    Ok(Err(_)) => Err(AuthorizationUiError::Failed(
                        "loopback server stopped before the redirect arrived".into(),
                    )),
                    Err(_) => Err(AuthorizationUiError::Failed("authorization timed out".into())),
                },
            },
        };

        let _ = shutdown_tx.send(());
        if let Err(err) = server.await {
            if err.is_panic() {
                warn!("loopback redirect server panicked: {err}");
            }
        }

        outcome
    }
}

async fn bind_listener(addr: &str) -> InfraResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| InfraError::Bind { addr: addr.to_string(), source })
}

async fn handle_redirect(
    query: Option<String>,
    base: Url,
    slot: CallbackSlot,
) -> (StatusCode, Html<&'static str>) {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return (StatusCode::BAD_REQUEST, Html(FAILED_PAGE));
    };

    let mut callback = base;
    callback.set_query(Some(&query));
    let failed = callback.query_pairs().any(|(key, _)| key == "error");

    let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    match sender {
        Some(tx) => {
            let _ = tx.send(callback);
            if failed {
                (StatusCode::OK, Html(FAILED_PAGE))
            } else {
                (StatusCode::OK, Html(COMPLETE_PAGE))
            }
        }
        None => (StatusCode::GONE, Html(FAILED_PAGE)),
    }
}

const COMPLETE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Complete</title></head>
<body><h1>Authorization Complete</h1><p>You can close this window and return to the app.</p></body>
</html>"#;

const FAILED_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body><h1>Authorization Failed</h1><p>Return to the app to try again.</p></body>
</html>"#;

#[cfg(test)]
mod tests {
    use std::net::TcpListener as StdTcpListener;

    use super::*;

    fn free_redirect_uri() -> String {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}/callback")
    }

    fn request() -> AuthorizationRequest {
        AuthorizationRequest {
            url: Url::parse("https://accounts.example.com/auth?state=xyz").unwrap(),
            callback_scheme: "http".to_string(),
            ephemeral_session: false,
        }
    }

    #[test]
    fn rejects_non_loopback_redirects() {
        assert!(LoopbackAuthorizationUi::new("com.example.app:/oauth2redirect").is_err());
        assert!(LoopbackAuthorizationUi::new("http://example.com:8080/cb").is_err());
        assert!(LoopbackAuthorizationUi::new("http://127.0.0.1/cb").is_err());
        assert!(LoopbackAuthorizationUi::new("http://localhost:8080/cb").is_ok());
    }

    #[tokio::test]
    async fn returns_the_redirect_url() {
        let redirect = free_redirect_uri();
        let target = format!("{redirect}?code=abc&state=xyz");
        let ui = LoopbackAuthorizationUi::new(&redirect).unwrap().with_opener(move |_url: &Url| {
            let target = target.clone();
            tokio::spawn(async move {
                let client = reqwest::Client::builder().no_proxy().build().unwrap();
                let _ = client.get(target).send().await;
            });
            Ok(())
        });

        let callback = ui.authorize(&request()).await.expect("callback url");

        assert_eq!(callback.path(), "/callback");
        let pairs: Vec<(String, String)> = callback.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("code".to_string(), "abc".to_string())));
        assert!(pairs.contains(&("state".to_string(), "xyz".to_string())));
    }

    #[tokio::test]
    async fn times_out_without_redirect() {
        let ui = LoopbackAuthorizationUi::new(&free_redirect_uri())
            .unwrap()
            .with_timeout(Duration::from_millis(50));

        match ui.authorize(&request()).await {
            Err(AuthorizationUiError::Failed(msg)) => assert_eq!(msg, "authorization timed out"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_reports_canceled() {
        let ui = LoopbackAuthorizationUi::new(&free_redirect_uri()).unwrap();
        ui.cancellation_token().cancel();

        assert!(matches!(ui.authorize(&request()).await, Err(AuthorizationUiError::Canceled)));
    }

    #[tokio::test]
    async fn opener_failure_is_reported() {
        let ui = LoopbackAuthorizationUi::new(&free_redirect_uri())
            .unwrap()
            .with_opener(|_url: &Url| Err("no browser available".to_string()));

        match ui.authorize(&request()).await {
            Err(AuthorizationUiError::Failed(msg)) => assert_eq!(msg, "no browser available"),
            other => panic!("expected opener failure, got {other:?}"),
        }
    }
}
