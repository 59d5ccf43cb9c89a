//! OpenID Connect userinfo fetch
//!
//! A single attempt only. The refresh-and-retry-once policy on 401 lives in
//! the token manager because it needs to mutate the session.

use tracing::debug;
use url::Url;

use super::http::HttpRequest;
use super::traits::HttpExecutor;
use super::types::{UserInfoResponse, UserProfile};
use crate::error::{AuthError, AuthResult};

/// Outcome of one userinfo request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInfoOutcome {
    /// The endpoint returned a decodable profile
    Profile(UserProfile),
    /// The endpoint answered 401 for this access token
    Unauthorized,
}

/// GET the userinfo endpoint with a bearer token
///
/// # Errors
/// - `ResponseUndecodable` on any non-2xx status other than 401, or a body
///   that is not a userinfo document
/// - `Transport` on executor failure
pub async fn fetch_user_info<H: HttpExecutor + ?Sized>(
    http: &H,
    endpoint: &Url,
    access_token: &str,
) -> AuthResult<UserInfoOutcome> {
    let request = HttpRequest::get(endpoint.clone()).bearer(access_token);
    let response = http.send(request).await?;
    debug!(status = response.status, "Userinfo response received");

    if response.status == 401 {
        return Ok(UserInfoOutcome::Unauthorized);
    }
    if !response.is_success() {
        return Err(AuthError::ResponseUndecodable(format!(
            "userinfo returned status {}",
            response.status
        )));
    }

    let info: UserInfoResponse = serde_json::from_slice(&response.body)
        .map_err(|e| AuthError::ResponseUndecodable(format!("userinfo response: {e}")))?;
    Ok(UserInfoOutcome::Profile(info.into()))
}
