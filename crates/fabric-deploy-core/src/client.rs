//! Thin REST client for the Fabric API and the legacy Power BI groups surface.
//!
//! Every call takes the [`Token`] explicitly. Expected HTTP failures come back
//! as data ([`ApiResponse`] / [`Listing::Rejected`]) so the resolver,
//! reconciler and deployer can branch on status codes; only transport
//! failures are errors.

use std::collections::HashSet;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{DeployError, Result};
use crate::model::{
    Binding, CreateItemRequest, GroupUser, ListResponse, RemoteItem, RoleAssignment, Workspace,
};
use crate::token::Token;

pub const DEFAULT_FABRIC_API: &str = "https://api.fabric.microsoft.com/v1";
pub const DEFAULT_POWERBI_API: &str = "https://api.powerbi.com/v1.0/myorg";

/// Raw status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }

    /// Best-effort extraction of the Fabric error message from the body.
    pub fn error_message(&self) -> String {
        if let Ok(json) = serde_json::from_str::<Value>(&self.body) {
            let code = json.get("errorCode").and_then(|v| v.as_str());
            let message = json
                .get("message")
                .and_then(|v| v.as_str())
                .or_else(|| {
                    json.get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(|v| v.as_str())
                });
            match (code, message) {
                (Some(c), Some(m)) => return format!("{c}: {m}"),
                (None, Some(m)) => return m.to_string(),
                _ => {}
            }
        }
        self.body.clone()
    }
}

/// Read a response body as text. A body that cannot be read is logged and
/// replaced by a placeholder naming the read error.
pub(crate) async fn read_body(resp: reqwest::Response, what: &str) -> String {
    match resp.text().await {
        Ok(body) => body,
        Err(e) => {
            debug!(what, error = %e, "failed to read response body");
            format!("<unreadable response body: {e}>")
        }
    }
}

/// Outcome of a list call: either every page succeeded, or the first
/// non-2xx response.
#[derive(Debug)]
pub enum Listing<T> {
    Items(Vec<T>),
    Rejected(ApiResponse),
}

pub struct FabricClient {
    http: reqwest::Client,
    base_url: String,
    powerbi_url: String,
}

impl FabricClient {
    pub fn new(base_url: &str, powerbi_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            powerbi_url: powerbi_url.trim_end_matches('/').to_string(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, url: &str, token: &Token) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(token.bearer())
            .header("Accept", "application/json")
    }

    async fn send(&self, req: reqwest::RequestBuilder, what: &str) -> Result<ApiResponse> {
        let resp = req
            .send()
            .await
            .map_err(|e| DeployError::transport(format!("{what}: failed to connect"), e))?;
        let status = resp.status().as_u16();
        let body = read_body(resp, what).await;
        debug!(status, what, "response received");
        Ok(ApiResponse { status, body })
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        token: &Token,
        body: &B,
        what: &str,
    ) -> Result<ApiResponse> {
        let req = self
            .request(reqwest::Method::POST, url, token)
            .header("Content-Type", "application/json")
            .json(body);
        self.send(req, what).await
    }

    /// GET a list endpoint and follow `continuationUri` until exhausted. A
    /// continuation pointing at an already fetched page is an error.
    async fn get_list<T: DeserializeOwned>(
        &self,
        url: String,
        token: &Token,
        what: &str,
    ) -> Result<Listing<T>> {
        let mut items = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(url);
        while let Some(url) = next.take() {
            if !seen.insert(url.clone()) {
                return Err(DeployError::resource(format!(
                    "{what}: continuation {url} was already fetched"
                )));
            }
            let resp = self
                .send(self.request(reqwest::Method::GET, &url, token), what)
                .await?;
            if !resp.is_success() {
                return Ok(Listing::Rejected(resp));
            }
            let page: ListResponse<T> = resp
                .json()
                .map_err(|e| DeployError::resource(format!("malformed {what} response: {e}")))?;
            items.extend(page.value);
            next = page.continuation_uri.filter(|u| !u.is_empty());
        }
        Ok(Listing::Items(items))
    }

    pub async fn list_workspaces(&self, token: &Token) -> Result<Listing<Workspace>> {
        self.get_list(self.api_url("workspaces"), token, "list workspaces")
            .await
    }

    pub async fn get_workspace(&self, token: &Token, workspace_id: &str) -> Result<ApiResponse> {
        let url = self.api_url(&format!("workspaces/{workspace_id}"));
        self.send(
            self.request(reqwest::Method::GET, &url, token),
            "get workspace",
        )
        .await
    }

    pub async fn create_workspace(
        &self,
        token: &Token,
        display_name: &str,
        capacity_id: Option<&str>,
    ) -> Result<ApiResponse> {
        let mut body = json!({ "displayName": display_name });
        if let Some(capacity_id) = capacity_id {
            body["capacityId"] = json!(capacity_id);
        }
        self.post_json(&self.api_url("workspaces"), token, &body, "create workspace")
            .await
    }

    pub async fn list_role_assignments(
        &self,
        token: &Token,
        workspace_id: &str,
    ) -> Result<Listing<RoleAssignment>> {
        let url = self.api_url(&format!("workspaces/{workspace_id}/roleAssignments"));
        self.get_list(url, token, "list role assignments").await
    }

    pub async fn create_role_assignment(
        &self,
        token: &Token,
        workspace_id: &str,
        binding: &Binding,
    ) -> Result<ApiResponse> {
        let url = self.api_url(&format!("workspaces/{workspace_id}/roleAssignments"));
        self.post_json(&url, token, binding, "create role assignment")
            .await
    }

    /// Legacy membership listing keyed by e-mail address.
    pub async fn list_group_users(
        &self,
        token: &Token,
        workspace_id: &str,
    ) -> Result<Listing<GroupUser>> {
        let url = format!("{}/groups/{workspace_id}/users", self.powerbi_url);
        self.get_list(url, token, "list group users").await
    }

    pub async fn list_items(&self, token: &Token, workspace_id: &str) -> Result<Listing<RemoteItem>> {
        let url = self.api_url(&format!("workspaces/{workspace_id}/items"));
        self.get_list(url, token, "list items").await
    }

    pub async fn create_item(
        &self,
        token: &Token,
        workspace_id: &str,
        request: &CreateItemRequest,
    ) -> Result<ApiResponse> {
        let url = self.api_url(&format!("workspaces/{workspace_id}/items"));
        self.post_json(&url, token, request, "create item").await
    }
}
