//! Wire and domain types shared by the resolver, reconciler and deployer.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A Fabric workspace as returned by `GET /workspaces`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_id: Option<String>,
}

impl Workspace {
    /// Display names are matched case-insensitively.
    pub fn matches_name(&self, name: &str) -> bool {
        self.display_name.to_lowercase() == name.to_lowercase()
    }
}

/// Paged list envelope used by every Fabric and Power BI list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default)]
    pub continuation_uri: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrincipalKind {
    #[default]
    User,
    #[serde(rename = "ServicePrincipal", alias = "App")]
    App,
    Group,
    /// Any principal type this tool does not grant to (e.g. profiles).
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: PrincipalKind,
}

impl Principal {
    pub fn new(id: impl Into<String>, kind: PrincipalKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Member,
    Contributor,
    Viewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Admin => "Admin",
            Self::Member => "Member",
            Self::Contributor => "Contributor",
            Self::Viewer => "Viewer",
        };
        f.write_str(s)
    }
}

/// A resolved grant of one role to one principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    pub principal: Principal,
    pub role: Role,
}

impl Binding {
    pub fn new(principal: Principal, role: Role) -> Self {
        Self { principal, role }
    }

    /// Uniqueness key: `(principal id, role)`.
    pub fn key(&self) -> (&str, Role) {
        (self.principal.id.as_str(), self.role)
    }
}

/// How a desired binding names its principal before directory resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalRef {
    Id(String),
    Email(String),
}

impl PrincipalRef {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.contains('@') {
            Self::Email(raw.to_string())
        } else {
            Self::Id(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Id(s) | Self::Email(s) => s,
        }
    }
}

impl fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A binding as written in configuration, before e-mails are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredBinding {
    pub principal: PrincipalRef,
    pub kind: PrincipalKind,
    pub role: Role,
}

/// One entry of `GET /workspaces/{id}/roleAssignments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    #[serde(default)]
    pub id: Option<String>,
    pub principal: Principal,
    pub role: Role,
}

impl RoleAssignment {
    pub fn key(&self) -> (&str, Role) {
        (self.principal.id.as_str(), self.role)
    }
}

/// One entry of the legacy `GET /groups/{id}/users` listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupUser {
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub group_user_access_right: Option<String>,
    #[serde(default)]
    pub principal_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Report,
    SemanticModel,
    Lakehouse,
    Dataflow,
    Notebook,
}

impl ItemType {
    pub const ALL: [ItemType; 5] = [
        Self::Report,
        Self::SemanticModel,
        Self::Lakehouse,
        Self::Notebook,
        Self::Dataflow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Report => "Report",
            Self::SemanticModel => "SemanticModel",
            Self::Lakehouse => "Lakehouse",
            Self::Dataflow => "Dataflow",
            Self::Notebook => "Notebook",
        }
    }

    /// Directory-name marker, e.g. `Sales.Report`.
    pub fn suffix(&self) -> String {
        format!(".{}", self.as_str())
    }

    /// Logical file name of the single definition part.
    pub fn definition_file(&self) -> &'static str {
        match self {
            Self::Report => "definition.pbir",
            Self::SemanticModel => "definition.pbism",
            Self::Lakehouse => "lakehouse.metadata.json",
            Self::Dataflow => "mashup.pq",
            Self::Notebook => "notebook-content.py",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(raw.trim()))
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadType {
    InlineBase64,
}

/// A deployable unit discovered in the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub display_name: String,
    pub item_type: ItemType,
    /// Directory the item was discovered in.
    pub directory: PathBuf,
    /// Name the definition part is published under.
    pub logical_file: String,
    pub definition_path: PathBuf,
    pub payload_type: PayloadType,
}

/// Body of `POST /workspaces/{id}/items`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub display_name: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub definition: ItemDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemDefinition {
    pub parts: Vec<DefinitionPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionPart {
    pub path: String,
    pub payload: String,
    pub payload_type: PayloadType,
}

/// One entry of `GET /workspaces/{id}/items`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteItem {
    #[serde(default)]
    pub id: Option<String>,
    pub display_name: String,
    #[serde(rename = "type")]
    pub item_type: String,
}

/// Per-item result of a deployment attempt.
#[derive(Debug, Clone)]
pub struct DeploymentOutcome {
    pub item: ContentItem,
    pub succeeded: bool,
    pub http_status: Option<u16>,
    pub error_detail: Option<String>,
}

impl DeploymentOutcome {
    pub fn success(item: ContentItem, status: Option<u16>) -> Self {
        Self {
            item,
            succeeded: true,
            http_status: status,
            error_detail: None,
        }
    }

    pub fn failure(item: ContentItem, status: Option<u16>, detail: impl Into<String>) -> Self {
        Self {
            item,
            succeeded: false,
            http_status: status,
            error_detail: Some(detail.into()),
        }
    }
}
