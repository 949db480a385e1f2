//! The fixed provisioning pipeline.
//!
//! token → verify access → ensure workspace → reconcile bindings →
//! discover items → deploy each item → summary.
//!
//! Token, access and workspace failures abort the run, as does an empty
//! catalogue. Binding and item failures are recorded and the run goes on.
//! A run aborted after reconciliation still hands back the binding report.

use thiserror::Error;
use tracing::{info, warn};

use crate::bindings::{self, BindingContext, ReconcileReport};
use crate::catalog::ContentCatalog;
use crate::client::{FabricClient, Listing};
use crate::config::DeployConfig;
use crate::deployer;
use crate::directory::DirectoryClient;
use crate::error::{DeployError, Result};
use crate::model::{ContentItem, DeploymentOutcome, PrincipalRef, RoleAssignment, Workspace};
use crate::source::{self, Checkout};
use crate::token::{Token, TokenProvider};
use crate::workspace::{self, WorkspaceResolution, WorkspaceSpec};

/// Result of a completed run.
#[derive(Debug)]
pub struct Summary {
    pub workspace: WorkspaceResolution,
    pub bindings: ReconcileReport,
    pub outcomes: Vec<DeploymentOutcome>,
}

impl Summary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_complete(&self) -> bool {
        self.succeeded() == self.total()
    }
}

/// A fatal error, with the binding report when reconciliation already ran.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    pub bindings: Option<ReconcileReport>,
    pub error: DeployError,
}

impl From<DeployError> for RunFailure {
    fn from(error: DeployError) -> Self {
        Self {
            bindings: None,
            error,
        }
    }
}

pub struct Orchestrator<'a> {
    config: &'a DeployConfig,
    tokens: &'a dyn TokenProvider,
    client: FabricClient,
    directory: DirectoryClient,
}

impl<'a> Orchestrator<'a> {
    /// Validates `config` up front.
    pub fn new(config: &'a DeployConfig, tokens: &'a dyn TokenProvider) -> Result<Self> {
        config.validate()?;
        let endpoints = &config.endpoints;
        Ok(Self {
            config,
            tokens,
            client: FabricClient::new(&endpoints.fabric_api, &endpoints.powerbi_api),
            directory: DirectoryClient::new(&endpoints.graph_api),
        })
    }

    pub async fn fabric_token(&self) -> Result<Token> {
        self.tokens.acquire(&self.config.endpoints.fabric_scope).await
    }

    /// Verify API access, then find or create the configured workspace.
    pub async fn ensure_workspace(&self, token: &Token) -> Result<WorkspaceResolution> {
        workspace::verify_access(&self.client, token).await?;
        let ws = &self.config.workspace;
        workspace::ensure_workspace(
            &self.client,
            token,
            WorkspaceSpec {
                name: &ws.name,
                capacity_id: ws.capacity_id.as_deref(),
                id: ws.id.as_deref(),
            },
        )
        .await
    }

    /// Resolve the configured workspace without creating it.
    pub async fn find_workspace(&self, token: &Token) -> Result<Workspace> {
        let ws = &self.config.workspace;
        workspace::find_workspace(
            &self.client,
            token,
            WorkspaceSpec {
                name: &ws.name,
                capacity_id: ws.capacity_id.as_deref(),
                id: ws.id.as_deref(),
            },
        )
        .await
    }

    /// Current role assignments, for display.
    pub async fn role_assignments(
        &self,
        token: &Token,
        workspace_id: &str,
    ) -> Result<Vec<RoleAssignment>> {
        match self.client.list_role_assignments(token, workspace_id).await? {
            Listing::Items(all) => Ok(all),
            Listing::Rejected(resp) if resp.status == 403 => Err(DeployError::permission(format!(
                "cannot list role assignments of {workspace_id}: {}",
                resp.error_message()
            ))),
            Listing::Rejected(resp) => Err(DeployError::resource(format!(
                "listing role assignments of {workspace_id} failed (HTTP {}): {}",
                resp.status,
                resp.error_message()
            ))),
        }
    }

    /// Reconcile configured bindings. Only a failed directory-token
    /// acquisition is an error; everything else lands in the report.
    pub async fn reconcile_bindings(
        &self,
        token: &Token,
        workspace_id: &str,
    ) -> Result<ReconcileReport> {
        let desired = self.config.desired_bindings();
        if self.config.deploy.skip_role_assignment {
            info!("role assignment disabled in config; skipping");
            return Ok(ReconcileReport::skipped(&desired));
        }

        let needs_directory = desired
            .iter()
            .any(|d| matches!(d.principal, PrincipalRef::Email(_)));
        let graph_token = if needs_directory {
            Some(self.tokens.acquire(&self.config.endpoints.graph_scope).await?)
        } else {
            None
        };

        let ctx = BindingContext {
            client: &self.client,
            token,
            directory: &self.directory,
            graph_token: graph_token.as_ref(),
            workspace_id,
            legacy_member_check: self.config.deploy.legacy_member_check,
        };
        let report = bindings::reconcile_desired(&ctx, &desired).await;
        if report.failures() > 0 {
            warn!(failures = report.failures(), "some role assignments failed");
        }
        Ok(report)
    }

    /// Materialise the source and discover items. The checkout must outlive
    /// deployment of the returned items.
    pub async fn discover(&self) -> Result<(Checkout, Vec<ContentItem>)> {
        let checkout = source::checkout(&self.config.source).await?;
        let root = checkout.item_root(&self.config.source.items_dir)?;
        let items = ContentCatalog::new(root)
            .with_item_types(self.config.item_types()?)
            .discover()?;
        info!(count = items.len(), "items discovered");
        Ok((checkout, items))
    }

    pub async fn run(&self) -> std::result::Result<Summary, RunFailure> {
        let token = self.fabric_token().await?;
        let workspace = self.ensure_workspace(&token).await?;
        let workspace_id = workspace.workspace().id.clone();

        let bindings = self.reconcile_bindings(&token, &workspace_id).await?;

        let (_checkout, items) = match self.discover().await {
            Ok((_, items)) if items.is_empty() => {
                return Err(RunFailure {
                    bindings: Some(bindings),
                    error: DeployError::source_tree("no items to deploy"),
                });
            }
            Ok(found) => found,
            Err(error) => {
                return Err(RunFailure {
                    bindings: Some(bindings),
                    error,
                });
            }
        };

        info!(workspace_id = %workspace_id, count = items.len(), "deploying items");
        let outcomes = deployer::deploy_all(
            &self.client,
            &token,
            &workspace_id,
            &items,
            &self.config.deploy_options(),
        )
        .await;

        let summary = Summary {
            workspace,
            bindings,
            outcomes,
        };
        info!(
            succeeded = summary.succeeded(),
            total = summary.total(),
            "deployment complete"
        );
        Ok(summary)
    }
}
