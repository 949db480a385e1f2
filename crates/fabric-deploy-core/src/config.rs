use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::client::{DEFAULT_FABRIC_API, DEFAULT_POWERBI_API};
use crate::deployer::DeployOptions;
use crate::directory::DEFAULT_GRAPH_API;
use crate::error::{DeployError, Result};
use crate::model::{DesiredBinding, ItemType, PrincipalKind, PrincipalRef, Role};
use crate::token::{DEFAULT_AUTHORITY, FABRIC_SCOPE, GRAPH_SCOPE};

/// Service principal credentials.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub authority: String,
    pub fabric_api: String,
    pub powerbi_api: String,
    pub graph_api: String,
    pub fabric_scope: String,
    pub graph_scope: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            authority: DEFAULT_AUTHORITY.to_string(),
            fabric_api: DEFAULT_FABRIC_API.to_string(),
            powerbi_api: DEFAULT_POWERBI_API.to_string(),
            graph_api: DEFAULT_GRAPH_API.to_string(),
            fabric_scope: FABRIC_SCOPE.to_string(),
            graph_scope: GRAPH_SCOPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub name: String,
    pub capacity_id: Option<String>,
    /// Known workspace id, tried before name resolution.
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BindingConfig {
    /// Object id, or an e-mail address resolved through the directory.
    pub principal: String,
    #[serde(default)]
    pub principal_type: PrincipalKind,
    pub role: Role,
}

impl BindingConfig {
    pub fn to_desired(&self) -> DesiredBinding {
        DesiredBinding {
            principal: PrincipalRef::parse(&self.principal),
            kind: self.principal_type,
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Local checkout. Takes precedence over `repo_url`.
    pub path: Option<PathBuf>,
    pub repo_url: Option<String>,
    pub branch: String,
    /// Folder holding the item directories, relative to the checkout root.
    pub items_dir: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: None,
            repo_url: None,
            branch: "main".to_string(),
            items_dir: "Development".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeploySettings {
    /// Item types in scope; empty means all known types.
    pub item_types: Vec<String>,
    pub item_delay_ms: u64,
    pub skip_existing: bool,
    pub skip_role_assignment: bool,
    pub legacy_member_check: bool,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            item_types: Vec::new(),
            item_delay_ms: 2000,
            skip_existing: false,
            skip_role_assignment: false,
            legacy_member_check: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub credentials: Credentials,
    pub endpoints: EndpointsConfig,
    pub workspace: WorkspaceConfig,
    pub bindings: Vec<BindingConfig>,
    pub source: SourceConfig,
    pub deploy: DeploySettings,
}

impl DeployConfig {
    pub fn validate(&self) -> Result<()> {
        let creds = &self.credentials;
        for (key, value) in [
            ("credentials.tenant_id", &creds.tenant_id),
            ("credentials.client_id", &creds.client_id),
            ("credentials.client_secret", &creds.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(DeployError::config(format!("{key} is required")));
            }
        }
        if self.workspace.name.trim().is_empty() {
            return Err(DeployError::config("workspace.name is required"));
        }
        for binding in &self.bindings {
            if binding.principal.trim().is_empty() {
                return Err(DeployError::config("bindings[].principal must not be empty"));
            }
        }
        self.item_types()?;
        Ok(())
    }

    pub fn desired_bindings(&self) -> Vec<DesiredBinding> {
        self.bindings.iter().map(BindingConfig::to_desired).collect()
    }

    pub fn item_types(&self) -> Result<Vec<ItemType>> {
        self.deploy
            .item_types
            .iter()
            .map(|raw| {
                ItemType::parse(raw)
                    .ok_or_else(|| DeployError::config(format!("unknown item type: {raw:?}")))
            })
            .collect()
    }

    pub fn deploy_options(&self) -> DeployOptions {
        DeployOptions {
            delay: Duration::from_millis(self.deploy.item_delay_ms),
            skip_existing: self.deploy.skip_existing,
        }
    }
}

pub mod loader {
    use super::DeployConfig;
    use crate::error::{DeployError, Result};
    use ::config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub const DEFAULT_CONFIG_FILE: &str = "fabric-deploy.toml";
    pub const ENV_PREFIX: &str = "FABRIC_DEPLOY";

    /// Load configuration from an optional TOML file layered under
    /// `FABRIC_DEPLOY__SECTION__KEY` environment overrides. Does not validate.
    pub fn load_config(path: Option<&Path>) -> Result<DeployConfig> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(DeployError::config(format!(
                        "config file not found: {}",
                        p.display()
                    )));
                }
                builder = builder.add_source(File::from(p.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| DeployError::config(format!("config build error: {e}")))?;
        cfg.try_deserialize()
            .map_err(|e| DeployError::config(format!("config deserialize error: {e}")))
    }
}
