use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fabric_deploy_core::DeployConfig;

#[derive(Parser)]
#[command(name = "fabric-deploy")]
#[command(about = "Provision a Microsoft Fabric workspace and deploy content into it")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./fabric-deploy.toml when present)
    #[arg(short, long, global = true, env = "FABRIC_DEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ensure the workspace, reconcile role assignments and deploy every item
    Run,
    /// Find or create the workspace
    EnsureWorkspace,
    /// Show current role assignments of the workspace
    Roles,
    /// Reconcile configured role assignments
    AssignRoles,
    /// List deployable items without contacting the service
    Discover(DiscoverArgs),
}

#[derive(clap::Args)]
pub struct DiscoverArgs {
    /// Item folder to scan instead of the configured source
    #[arg(short, long)]
    pub path: Option<PathBuf>,
}

/// Settings that take precedence over the configuration file.
#[derive(clap::Args, Default)]
pub struct Overrides {
    #[arg(long, global = true, env = "TENANT_ID")]
    pub tenant_id: Option<String>,

    #[arg(long, global = true, env = "CLIENT_ID")]
    pub client_id: Option<String>,

    #[arg(long, global = true, env = "CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    #[arg(long, global = true, env = "CAPACITY_ID")]
    pub capacity_id: Option<String>,

    #[arg(long, global = true, env = "WORKSPACE_NAME")]
    pub workspace_name: Option<String>,

    #[arg(long, global = true, env = "WORKSPACE_ID")]
    pub workspace_id: Option<String>,

    /// Leave role assignments untouched
    #[arg(long, global = true, env = "SKIP_ROLE_ASSIGNMENT")]
    pub skip_role_assignment: bool,

    /// Local checkout holding the item folder
    #[arg(long, global = true)]
    pub source_path: Option<PathBuf>,

    /// Git repository to clone instead of a local checkout
    #[arg(long, global = true)]
    pub source_repo: Option<String>,

    #[arg(long, global = true)]
    pub source_branch: Option<String>,
}

impl Overrides {
    pub fn apply(&self, cfg: &mut DeployConfig) {
        if let Some(v) = &self.tenant_id {
            cfg.credentials.tenant_id = v.clone();
        }
        if let Some(v) = &self.client_id {
            cfg.credentials.client_id = v.clone();
        }
        if let Some(v) = &self.client_secret {
            cfg.credentials.client_secret = v.clone();
        }
        if let Some(v) = &self.capacity_id {
            cfg.workspace.capacity_id = Some(v.clone());
        }
        if let Some(v) = &self.workspace_name {
            cfg.workspace.name = v.clone();
        }
        if let Some(v) = &self.workspace_id {
            cfg.workspace.id = Some(v.clone());
        }
        if self.skip_role_assignment {
            cfg.deploy.skip_role_assignment = true;
        }
        if let Some(v) = &self.source_path {
            cfg.source.path = Some(v.clone());
        }
        if let Some(v) = &self.source_repo {
            cfg.source.repo_url = Some(v.clone());
            // An explicit repository beats a path coming from the file.
            if self.source_path.is_none() {
                cfg.source.path = None;
            }
        }
        if let Some(v) = &self.source_branch {
            cfg.source.branch = v.clone();
        }
    }
}
