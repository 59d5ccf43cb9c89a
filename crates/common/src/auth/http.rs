//! Transport-neutral HTTP request/response values
//!
//! The manager describes requests with these types and hands them to an
//! injected [`HttpExecutor`](super::traits::HttpExecutor), so the core never
//! depends on a concrete HTTP client.

use std::fmt;

use url::form_urlencoded;
use url::Url;

/// HTTP method subset used by the OAuth flows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// Outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method
    pub method: HttpMethod,
    /// Absolute target URL
    pub url: Url,
    /// Header pairs in insertion order
    pub headers: Vec<(String, String)>,
    /// Raw body, `None` for GET
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// GET request with no headers
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self { method: HttpMethod::Get, url, headers: Vec::new(), body: None }
    }

    /// POST with an `application/x-www-form-urlencoded` body
    #[must_use]
    pub fn form_post(url: Url, params: &[(&str, &str)]) -> Self {
        let body = form_urlencoded::Serializer::new(String::new()).extend_pairs(params).finish();
        Self {
            method: HttpMethod::Post,
            url,
            headers: vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: Some(body.into_bytes()),
        }
    }

    /// Append a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach `Authorization: Bearer <token>`
    #[must_use]
    pub fn bearer(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {token}"))
    }

    /// Look up a header value (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Decode a form-encoded body back into pairs
    #[must_use]
    pub fn form_params(&self) -> Vec<(String, String)> {
        self.body
            .as_deref()
            .map(|body| form_urlencoded::parse(body).into_owned().collect())
            .unwrap_or_default()
    }

    /// Value of one form field, if present
    #[must_use]
    pub fn form_param(&self, name: &str) -> Option<String> {
        self.form_params().into_iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

/// Response as returned by the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response header pairs
    pub headers: Vec<(String, String)>,
    /// Raw response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Response with no headers
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    /// Whether the status is in the 2xx range
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a header value (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
}
