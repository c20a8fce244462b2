//! Password-grant token exchange
//!
//! KubeSphere ships a built-in OAuth client `kubesphere`/`kubesphere`; the
//! operator's username and password are exchanged once per run for a bearer
//! token that is never refreshed.

use std::fmt;

use tracing::{debug, error, info};

use crate::error::AuthError;
use crate::http::{join_url, HttpClient, HttpRequest};
use crate::kubesphere::types::TokenResponse;

pub const TOKEN_PATH: &str = "oauth/token";
pub const CLIENT_ID: &str = "kubesphere";
pub const CLIENT_SECRET: &str = "kubesphere";
pub const GRANT_TYPE: &str = "password";

/// Operator login
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Form body of the token request
    fn form_body(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("username", &self.username)
            .append_pair("password", &self.password)
            .append_pair("client_id", CLIENT_ID)
            .append_pair("client_secret", CLIENT_SECRET)
            .append_pair("grant_type", GRANT_TYPE)
            .finish()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `Authorization` header value, `"Bearer <access_token>"`
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn from_access_token(access_token: &str) -> Self {
        Self(format!("Bearer {}", access_token))
    }

    pub fn header_value(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Exchange credentials for a bearer token
///
/// # Errors
///
/// - [`AuthError::Transport`] if the request could not be sent
/// - [`AuthError::BadStatus`] if the endpoint did not answer 200
/// - [`AuthError::MalformedResponse`] if the body is not a token response
pub async fn authenticate(
    http: &HttpClient,
    base_url: &str,
    credentials: &Credentials,
) -> Result<BearerToken, AuthError> {
    let url = join_url(base_url, TOKEN_PATH);
    debug!(%url, username = %credentials.username, "requesting access token");

    let request = HttpRequest::post(url.as_str())
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(credentials.form_body());

    let response = http.send(request).await.map_err(|e| {
        error!(%url, error = %e, "token request failed");
        AuthError::Transport(e)
    })?;

    if !response.is_ok() {
        error!(%url, status = response.status, "token endpoint rejected credentials");
        return Err(AuthError::BadStatus(response.status));
    }

    let token: TokenResponse = serde_json::from_slice(&response.body).map_err(|e| {
        error!(%url, error = %e, "token response could not be decoded");
        AuthError::MalformedResponse(e)
    })?;

    info!(username = %credentials.username, token_type = %token.token_type, "authenticated");
    Ok(BearerToken::from_access_token(&token.access_token))
}
