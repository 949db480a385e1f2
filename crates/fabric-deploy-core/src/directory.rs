//! E-mail to object-id resolution against Microsoft Graph.

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::client::read_body;
use crate::error::{DeployError, Result};
use crate::token::Token;

pub const DEFAULT_GRAPH_API: &str = "https://graph.microsoft.com/v1.0";

#[derive(Debug, Deserialize)]
struct DirectoryUser {
    id: String,
}

pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: String,
}

impl DirectoryClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn user_url(&self, email: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| DeployError::config(format!("invalid graph_api url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| DeployError::config("graph_api url cannot be a base"))?
            .pop_if_empty()
            .push("users")
            .push(email);
        Ok(url)
    }

    /// Look up a user's object id. `Ok(None)` when the directory has no such user.
    ///
    /// `token` must be minted for the Graph scope, not the Fabric scope.
    pub async fn resolve_user(&self, token: &Token, email: &str) -> Result<Option<String>> {
        let url = self.user_url(email)?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(token.bearer())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| DeployError::transport("directory lookup: failed to connect", e))?;

        let status = resp.status();
        let body = read_body(resp, "directory lookup").await;
        match status.as_u16() {
            200 => {
                let user: DirectoryUser = serde_json::from_str(&body).map_err(|e| {
                    DeployError::resource(format!("malformed directory response: {e}"))
                })?;
                debug!(email, object_id = %user.id, "resolved principal");
                Ok(Some(user.id))
            }
            404 => {
                warn!(email, "user not found in directory");
                Ok(None)
            }
            401 | 403 => Err(DeployError::permission(format!(
                "directory lookup for {email} denied (HTTP {status}); the service identity needs User.Read.All"
            ))),
            _ => Err(DeployError::resource(format!(
                "directory lookup for {email} failed (HTTP {status}): {body}"
            ))),
        }
    }
}
