//! Find-or-create for the target workspace.

use tracing::{info, warn};

use crate::client::{ApiResponse, FabricClient, Listing};
use crate::error::{DeployError, Result};
use crate::model::Workspace;
use crate::token::Token;

/// How the workspace came to be available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceResolution {
    /// Already existed; nothing was created.
    Found(Workspace),
    /// Created by this call.
    Created(Workspace),
    /// The create call hit 409 and the concurrently created workspace was
    /// picked up from a fresh listing.
    Conflict(Workspace),
}

impl WorkspaceResolution {
    pub fn workspace(&self) -> &Workspace {
        match self {
            Self::Found(ws) | Self::Created(ws) | Self::Conflict(ws) => ws,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Target workspace as configured.
#[derive(Debug, Clone, Copy)]
pub struct WorkspaceSpec<'a> {
    pub name: &'a str,
    pub capacity_id: Option<&'a str>,
    /// When set, looked up directly before falling back to name resolution.
    pub id: Option<&'a str>,
}

fn listing_error(resp: &ApiResponse) -> DeployError {
    match resp.status {
        401 => DeployError::auth(format!(
            "listing workspaces rejected the token (HTTP 401): {}",
            resp.error_message()
        )),
        403 => DeployError::permission(format!(
            "authenticated but no workspace access (HTTP 403): {}",
            resp.error_message()
        )),
        status => DeployError::resource(format!(
            "listing workspaces failed (HTTP {status}): {}",
            resp.error_message()
        )),
    }
}

/// Confirm the service identity can reach the API at all. Returns every
/// workspace visible to it.
pub async fn verify_access(client: &FabricClient, token: &Token) -> Result<Vec<Workspace>> {
    match client.list_workspaces(token).await? {
        Listing::Items(all) => {
            info!(visible = all.len(), "service principal authenticated");
            Ok(all)
        }
        Listing::Rejected(resp) => Err(listing_error(&resp)),
    }
}

async fn find_by_name(client: &FabricClient, token: &Token, name: &str) -> Result<Option<Workspace>> {
    match client.list_workspaces(token).await? {
        // First listed match wins if the remote ever allows duplicates.
        Listing::Items(all) => Ok(all.into_iter().find(|ws| ws.matches_name(name))),
        Listing::Rejected(resp) => Err(listing_error(&resp)),
    }
}

async fn find_by_id(client: &FabricClient, token: &Token, id: &str) -> Result<Option<Workspace>> {
    let resp = client.get_workspace(token, id).await?;
    match resp.status {
        200 => resp
            .json()
            .map(Some)
            .map_err(|e| DeployError::resource(format!("malformed workspace response: {e}"))),
        404 => {
            warn!(workspace_id = id, "configured workspace id not found; resolving by name");
            Ok(None)
        }
        401 => Err(DeployError::auth(format!(
            "reading workspace {id} rejected the token (HTTP 401)"
        ))),
        status => Err(DeployError::resource(format!(
            "reading workspace {id} failed (HTTP {status}): {}",
            resp.error_message()
        ))),
    }
}

/// Look the workspace up by configured id, then by name, without creating
/// anything. An absent workspace is a `Resource` error.
pub async fn find_workspace(
    client: &FabricClient,
    token: &Token,
    spec: WorkspaceSpec<'_>,
) -> Result<Workspace> {
    if let Some(id) = spec.id
        && let Some(ws) = find_by_id(client, token, id).await?
    {
        return Ok(ws);
    }
    find_by_name(client, token, spec.name)
        .await?
        .ok_or_else(|| DeployError::resource(format!("workspace {} not found", spec.name)))
}

/// Ensure a workspace named `spec.name` exists and return it.
///
/// Names compare case-insensitively. Calling this repeatedly with the same
/// name never creates a second workspace.
pub async fn ensure_workspace(
    client: &FabricClient,
    token: &Token,
    spec: WorkspaceSpec<'_>,
) -> Result<WorkspaceResolution> {
    if let Some(id) = spec.id
        && let Some(ws) = find_by_id(client, token, id).await?
    {
        info!(workspace_id = %ws.id, name = %ws.display_name, "workspace exists");
        return Ok(WorkspaceResolution::Found(ws));
    }

    if let Some(ws) = find_by_name(client, token, spec.name).await? {
        info!(workspace_id = %ws.id, name = %ws.display_name, "workspace exists");
        return Ok(WorkspaceResolution::Found(ws));
    }

    info!(name = spec.name, capacity_id = ?spec.capacity_id, "creating workspace");
    let resp = client
        .create_workspace(token, spec.name, spec.capacity_id)
        .await?;

    match resp.status {
        200..=299 => {
            let ws = match resp.json::<Workspace>() {
                Ok(ws) => ws,
                Err(_) => find_by_name(client, token, spec.name).await?.ok_or_else(|| {
                    DeployError::resource(format!(
                        "workspace {} was accepted but is not listed yet",
                        spec.name
                    ))
                })?,
            };
            info!(workspace_id = %ws.id, name = %ws.display_name, "workspace created");
            Ok(WorkspaceResolution::Created(ws))
        }
        409 => {
            warn!(name = spec.name, "workspace created concurrently; re-resolving");
            match find_by_name(client, token, spec.name).await? {
                Some(ws) => Ok(WorkspaceResolution::Conflict(ws)),
                None => Err(DeployError::resource(format!(
                    "workspace {} reported as existing (HTTP 409) but is not visible to this identity",
                    spec.name
                ))),
            }
        }
        status => Err(DeployError::resource(format!(
            "creating workspace {} failed (HTTP {status}): {}",
            spec.name,
            resp.error_message()
        ))),
    }
}
