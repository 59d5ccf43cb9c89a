//! OAuth 2.0 client with PKCE support
//!
//! Builds authorization URLs and talks to the token endpoint:
//! - Authorization URL building
//! - Authorization code exchange
//! - Token refresh
//!
//! All network access goes through the injected [`HttpExecutor`]. Every
//! token endpoint call is bounded by [`OAuthConfig::token_timeout`].

use std::future::Future;
use std::sync::Arc;

use tracing::debug;
use url::Url;

use super::http::{HttpRequest, HttpResponse};
use super::pkce::PKCEChallenge;
use super::traits::HttpExecutor;
use super::types::{OAuthConfig, TokenResponse};
use crate::error::{AuthError, AuthResult};

/// Provider-specific authorization parameters (offline access, forced consent)
const EXTRA_AUTHORIZE_PARAMS: [(&str, &str); 2] = [("access_type", "offline"), ("prompt", "consent")];

/// OAuth 2.0 client (RFC 6749 + RFC 7636)
pub struct OAuthClient<H: HttpExecutor> {
    config: OAuthConfig,
    http: Arc<H>,
}

impl<H: HttpExecutor> OAuthClient<H> {
    /// Create a client for one provider configuration
    #[must_use]
    pub fn new(config: OAuthConfig, http: Arc<H>) -> Self {
        Self { config, http }
    }

    /// Provider configuration this client was built with
    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Shared HTTP executor
    #[must_use]
    pub fn http(&self) -> &Arc<H> {
        &self.http
    }

    /// Build the authorization URL for one PKCE challenge
    ///
    /// Query parameters, in order: `response_type`, `client_id`,
    /// `redirect_uri`, `scope`, `code_challenge`, `code_challenge_method`,
    /// `state`, `access_type`, `prompt`.
    #[must_use]
    pub fn authorization_url(&self, challenge: &PKCEChallenge) -> Url {
        let scope = self.config.scope_string();
        let mut url = self.config.authorization_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", &self.config.redirect_uri)
                .append_pair("scope", &scope)
                .append_pair("code_challenge", &challenge.code_challenge)
                .append_pair("code_challenge_method", challenge.challenge_method())
                .append_pair("state", &challenge.state);
            query.extend_pairs(EXTRA_AUTHORIZE_PARAMS);
        }
        url
    }

    /// Exchange an authorization code for tokens
    ///
    /// # Arguments
    /// * `code` - Authorization code from the callback
    /// * `code_verifier` - Verifier of the pending PKCE challenge
    ///
    /// # Errors
    /// - `TokenExchangeFailed` on a non-2xx status, with the body text
    /// - `ResponseUndecodable` if the 2xx body is not a token response
    /// - `Transport` on executor failure or timeout
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> AuthResult<TokenResponse> {
        let request = HttpRequest::form_post(
            self.config.token_endpoint.clone(),
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", &self.config.client_id),
                ("redirect_uri", &self.config.redirect_uri),
                ("code_verifier", code_verifier),
            ],
        );

        debug!(endpoint = %self.config.token_endpoint, "Exchanging authorization code");
        let response = self.send_token_request(request).await?;
        if !response.is_success() {
            return Err(AuthError::token_exchange(response.status, &response.body));
        }
        decode_token_response(&response)
    }

    /// Refresh the access token
    ///
    /// # Errors
    /// - `AuthenticationRequired` on any non-2xx status
    /// - `ResponseUndecodable` if the 2xx body is not a token response
    /// - `Transport` on executor failure or timeout
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenResponse> {
        let request = HttpRequest::form_post(
            self.config.token_endpoint.clone(),
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.config.client_id),
            ],
        );

        debug!(endpoint = %self.config.token_endpoint, "Refreshing access token");
        let response = self.send_token_request(request).await?;
        if !response.is_success() {
            debug!(status = response.status, "Refresh rejected by token endpoint");
            return Err(AuthError::AuthenticationRequired);
        }
        decode_token_response(&response)
    }

    async fn send_token_request(&self, request: HttpRequest) -> AuthResult<HttpResponse> {
        with_timeout(self.config.token_timeout, self.http.send(request)).await
    }
}

async fn with_timeout<F>(limit: std::time::Duration, call: F) -> AuthResult<HttpResponse>
where
    F: Future<Output = AuthResult<HttpResponse>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| AuthError::Transport("token endpoint timed out".to_string()))?
}

fn decode_token_response(response: &HttpResponse) -> AuthResult<TokenResponse> {
    let token: TokenResponse = serde_json::from_slice(&response.body)
        .map_err(|e| AuthError::ResponseUndecodable(format!("token response: {e}")))?;
    if token.access_token.is_empty() {
        return Err(AuthError::ResponseUndecodable("token response: empty access_token".to_string()));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::client.
    use std::time::Duration;

    use super::*;
    use crate::testing::MockHttpExecutor;

    fn test_config() -> OAuthConfig {
        OAuthConfig::google("client123", "com.example.app:/oauth2redirect").unwrap()
    }

    /// Validates `OAuthClient::authorization_url` behavior for the fixed
    /// parameter set scenario.
    ///
    /// Assertions:
    /// - Confirms all nine query parameters are present with their values.
    /// - Ensures the redirect URI is percent-encoded.
    #[test]
    fn test_authorization_url_params() {
        let client = OAuthClient::new(test_config(), Arc::new(MockHttpExecutor::new()));
        let challenge = PKCEChallenge::generate();
        let url = client.authorization_url(&challenge);

        assert!(url.as_str().starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.as_str().contains("redirect_uri=com.example.app%3A%2Foauth2redirect"));

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            [
                "response_type",
                "client_id",
                "redirect_uri",
                "scope",
                "code_challenge",
                "code_challenge_method",
                "state",
                "access_type",
                "prompt"
            ]
        );

        let get = |name: &str| pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone());
        assert_eq!(get("response_type").as_deref(), Some("code"));
        assert_eq!(get("scope").as_deref(), Some("openid email profile"));
        assert_eq!(get("code_challenge").as_deref(), Some(challenge.code_challenge.as_str()));
        assert_eq!(get("code_challenge_method").as_deref(), Some("S256"));
        assert_eq!(get("state").as_deref(), Some(challenge.state.as_str()));
        assert_eq!(get("access_type").as_deref(), Some("offline"));
        assert_eq!(get("prompt").as_deref(), Some("consent"));
    }

    /// Validates `OAuthClient::exchange_code` form body and decoding.
    ///
    /// Assertions:
    /// - Confirms the five form fields are posted.
    /// - Confirms the token response is decoded.
    #[tokio::test]
    async fn test_exchange_code_success() {
        let http = Arc::new(MockHttpExecutor::new());
        http.push_json(200, r#"{"access_token":"T","expires_in":3600,"token_type":"Bearer","refresh_token":"R"}"#);
        let client = OAuthClient::new(test_config(), Arc::clone(&http));

        let token = client.exchange_code("abc", "verifier").await.unwrap();
        assert_eq!(token.access_token, "T");
        assert_eq!(token.refresh_token.as_deref(), Some("R"));

        let requests = http.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.form_param("grant_type").as_deref(), Some("authorization_code"));
        assert_eq!(request.form_param("code").as_deref(), Some("abc"));
        assert_eq!(request.form_param("client_id").as_deref(), Some("client123"));
        assert_eq!(request.form_param("redirect_uri").as_deref(), Some("com.example.app:/oauth2redirect"));
        assert_eq!(request.form_param("code_verifier").as_deref(), Some("verifier"));
    }

    /// Validates `OAuthClient::exchange_code` behavior for a non-2xx status.
    ///
    /// Assertions:
    /// - Confirms the status and body text are carried in the error.
    #[tokio::test]
    async fn test_exchange_code_failure_carries_body() {
        let http = Arc::new(MockHttpExecutor::new());
        http.push_json(400, r#"{"error":"invalid_grant"}"#);
        let client = OAuthClient::new(test_config(), http);

        let err = client.exchange_code("abc", "verifier").await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::TokenExchangeFailed { status: 400, ref body } if body.contains("invalid_grant")
        ));
    }

    /// Validates `OAuthClient::refresh` behavior for a rejected refresh.
    ///
    /// Assertions:
    /// - Ensures a 400 maps to `AuthenticationRequired`.
    /// - Confirms the refresh form fields.
    #[tokio::test]
    async fn test_refresh_rejected() {
        let http = Arc::new(MockHttpExecutor::new());
        http.push_json(400, r#"{"error":"invalid_grant"}"#);
        let client = OAuthClient::new(test_config(), Arc::clone(&http));

        let err = client.refresh("R").await.unwrap_err();
        assert!(err.is_authentication_required());

        let request = &http.requests()[0];
        assert_eq!(request.form_param("grant_type").as_deref(), Some("refresh_token"));
        assert_eq!(request.form_param("refresh_token").as_deref(), Some("R"));
        assert!(request.form_param("redirect_uri").is_none());
    }

    #[tokio::test]
    async fn test_undecodable_token_response() {
        let http = Arc::new(MockHttpExecutor::new());
        http.push_json(200, "not json");
        let client = OAuthClient::new(test_config(), http);

        let err = client.exchange_code("abc", "v").await.unwrap_err();
        assert!(matches!(err, AuthError::ResponseUndecodable(_)));
    }

    /// Validates the token endpoint timeout.
    ///
    /// Assertions:
    /// - Ensures a stalled executor yields `Transport("token endpoint timed
    ///   out")`.
    #[tokio::test(start_paused = true)]
    async fn test_token_timeout() {
        let http = Arc::new(MockHttpExecutor::new().with_delay(Duration::from_secs(120)));
        http.push_json(200, "{}");
        let config = test_config().with_token_timeout(Duration::from_secs(5));
        let client = OAuthClient::new(config, http);

        let err = client.refresh("R").await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(ref m) if m == "token endpoint timed out"));
    }
}
