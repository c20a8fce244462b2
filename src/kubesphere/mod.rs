//! KubeSphere Control Plane Client
//!
//! Calls made by the synchronizer against a KubeSphere host:
//!
//! 1. **auth**: password grant on `/oauth/token`
//! 2. **workspaces**: workspace templates and their cluster placements
//! 3. **quota**: one workspace resource quota on one member cluster
//!
//! A [`Session`] can only be obtained through a successful authentication,
//! so every listing or quota call is made with a token.

use std::fmt;

use crate::http::HttpClient;

pub mod auth;
pub mod quota;
pub mod types;
pub mod workspaces;

pub use auth::{authenticate, BearerToken, Credentials};
pub use quota::fetch_quota;
pub use workspaces::{list_workspaces, WorkspacePlacement};

/// Authenticated access to one control plane for the length of a run
pub struct Session {
    base_url: String,
    token: BearerToken,
}

impl Session {
    /// Authenticate and open a session
    pub async fn establish(
        http: &HttpClient,
        base_url: &str,
        credentials: &Credentials,
    ) -> Result<Self, crate::error::AuthError> {
        let token = authenticate(http, base_url, credentials).await?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> &BearerToken {
        &self.token
    }

    #[cfg(test)]
    pub(crate) fn for_tests(base_url: &str, token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: BearerToken::from_access_token(token),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("token", &self.token)
            .finish()
    }
}
