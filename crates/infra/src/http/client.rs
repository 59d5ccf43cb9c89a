use std::time::Duration;

use async_trait::async_trait;
use authflow_common::auth::{HttpExecutor, HttpMethod, HttpRequest, HttpResponse};
use authflow_common::{AuthError, AuthResult};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder};
use tracing::debug;

use crate::errors::InfraResult;

/// [`HttpExecutor`] backed by reqwest, with a client-level timeout and
/// retries for connection failures.
///
/// Only failures where the request never reached the server are retried;
/// any HTTP status, including 5xx, is returned to the caller as-is.
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    client: ReqwestClient,
    max_attempts: usize,
    base_backoff: Duration,
}

impl ReqwestExecutor {
    /// Start building a new executor.
    #[must_use]
    pub fn builder() -> ReqwestExecutorBuilder {
        ReqwestExecutorBuilder::default()
    }

    /// Convenience constructor with default configuration.
    ///
    /// # Errors
    /// Returns `InfraError::HttpClient` if the TLS backend fails to initialize.
    pub fn new() -> InfraResult<Self> {
        Self::builder().build()
    }

    fn prepare(&self, request: &HttpRequest) -> RequestBuilder {
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };
        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        builder
    }

    fn backoff_delay(&self, retry_number: usize) -> Duration {
        let shift = u32::try_from(retry_number.saturating_sub(1).min(8)).unwrap_or(8);
        self.base_backoff.saturating_mul(1u32 << shift)
    }

    async fn sleep_with_backoff(&self, retry_number: usize) {
        let delay = self.backoff_delay(retry_number);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn send(&self, request: HttpRequest) -> AuthResult<HttpResponse> {
        let attempts = self.max_attempts.max(1);
        let method = request.method;
        let url = request.url.clone();

        for attempt in 0..attempts {
            debug!(attempt = attempt + 1, %method, %url, "sending HTTP request");

            match self.prepare(&request).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    debug!(attempt = attempt + 1, %method, %url, status, "received HTTP response");

                    let headers = response
                        .headers()
                        .iter()
                        .filter_map(|(name, value)| {
                            value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
                        })
                        .collect();
                    let body = response.bytes().await.map_err(|err| {
                        AuthError::Transport(format!("failed to read response body: {err}"))
                    })?;

                    return Ok(HttpResponse { status, headers, body: body.to_vec() });
                }
                Err(err) => {
                    debug!(attempt = attempt + 1, %method, %url, error = %err, "HTTP request failed");

                    if attempt + 1 < attempts && should_retry_error(&err) {
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }

                    return Err(AuthError::Transport(format!("{method} {url}: {err}")));
                }
            }
        }

        Err(AuthError::Transport("http executor exhausted retries without producing a result".into()))
    }
}

/// Builder for [`ReqwestExecutor`].
#[derive(Debug)]
pub struct ReqwestExecutorBuilder {
    timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
    user_agent: Option<String>,
}

impl Default for ReqwestExecutorBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            user_agent: None,
        }
    }
}

impl ReqwestExecutorBuilder {
    /// Per-request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries).
    #[must_use]
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Delay before the first retry, doubled on each further attempt
    #[must_use]
    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    /// Override the `User-Agent` header
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// # Errors
    /// Returns `InfraError::HttpClient` if reqwest rejects the configuration.
    pub fn build(self) -> InfraResult<ReqwestExecutor> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        Ok(ReqwestExecutor {
            client: builder.build()?,
            max_attempts: self.max_attempts.max(1),
            base_backoff: self.base_backoff,
        })
    }
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    err.is_connect()
}
