//! Bearer token acquisition for the service identity.
//!
//! Tokens are scoped to one audience. A token minted for the Fabric API is
//! rejected by the directory and vice versa, so every caller asks for the
//! scope it needs and receives an explicit [`Token`] value to thread through
//! its requests. Nothing is cached between calls.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::client::read_body;
use crate::config::Credentials;
use crate::error::{DeployError, Result};

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
pub const FABRIC_SCOPE: &str = "https://api.fabric.microsoft.com/.default";
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// An opaque bearer credential for one scope.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    access_token: String,
    scope: String,
    expires_in: Option<u64>,
}

impl Token {
    pub fn new(access_token: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            scope: scope.into(),
            expires_in: None,
        }
    }

    pub fn bearer(&self) -> &str {
        &self.access_token
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Lifetime in seconds reported by the authority, if any.
    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"***")
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Acquire a fresh token for `scope`. Failures are always [`DeployError::Auth`].
    async fn acquire(&self, scope: &str) -> Result<Token>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// OAuth 2.0 client-credentials grant against a Microsoft Entra tenant.
pub struct ClientSecretCredential {
    http: reqwest::Client,
    authority: String,
    credentials: Credentials,
}

impl ClientSecretCredential {
    pub fn new(authority: &str, credentials: Credentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            authority: authority.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority, self.credentials.tenant_id
        )
    }
}

#[async_trait]
impl TokenProvider for ClientSecretCredential {
    async fn acquire(&self, scope: &str) -> Result<Token> {
        debug!(scope, tenant_id = %self.credentials.tenant_id, "requesting token");
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("client_secret", &self.credentials.client_secret)
            .append_pair("scope", scope)
            .finish();

        let resp = self
            .http
            .post(self.token_url())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| DeployError::auth(format!("token endpoint unreachable: {e}")))?;

        let status = resp.status();
        let text = read_body(resp, "token request").await;
        if !status.is_success() {
            let detail = serde_json::from_str::<TokenErrorResponse>(&text)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or(text);
            return Err(DeployError::auth(format!(
                "token request for {scope} failed (HTTP {status}): {detail}"
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| DeployError::auth(format!("malformed token response: {e}")))?;
        info!(scope, "access token acquired");
        Ok(Token {
            access_token: parsed.access_token,
            scope: scope.to_string(),
            expires_in: parsed.expires_in,
        })
    }
}
