//! Role-assignment reconciliation.
//!
//! Computes the delta between desired `(principal, role)` bindings and the
//! workspace's current role assignments, then grants only what is missing.
//! Reconciliation is additive: assignments that exist remotely but are not
//! desired are never revoked, and a principal holding a different role is
//! granted the desired one in addition.
//!
//! Nothing in here aborts a run. Listing failures degrade to an empty
//! existing set, and each binding gets its own [`BindingOutcome`].

use std::collections::HashSet;

use tracing::{error, info, warn};

use crate::client::{FabricClient, Listing};
use crate::directory::DirectoryClient;
use crate::model::{Binding, DesiredBinding, Principal, PrincipalRef, Role, RoleAssignment};
use crate::token::Token;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingOutcome {
    /// The exact `(principal, role)` pair already exists.
    AlreadyPresent,
    Created,
    /// The create call answered 409.
    AlreadyAssigned,
    /// The create call answered 403. Needs a manual grant; the run goes on.
    PermissionDenied { detail: String },
    Failed { status: Option<u16>, detail: String },
    /// Role assignment disabled by configuration.
    Skipped,
}

impl BindingOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Whether the desired grant is known to hold after reconciliation.
    pub fn is_satisfied(&self) -> bool {
        matches!(
            self,
            Self::AlreadyPresent | Self::Created | Self::AlreadyAssigned
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingResult {
    /// Principal as configured (object id or e-mail).
    pub principal: String,
    /// Resolved object id, when resolution got that far.
    pub principal_id: Option<String>,
    pub role: Role,
    pub outcome: BindingOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Role assignments observed before any grant.
    pub before: Vec<RoleAssignment>,
    /// Role assignments observed after reconciliation.
    pub after: Vec<RoleAssignment>,
    /// One entry per desired binding, in the order given.
    pub results: Vec<BindingResult>,
    /// The initial listing answered 403 and was treated as empty.
    pub listing_denied: bool,
}

impl ReconcileReport {
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_failure()).count()
    }

    pub fn created(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == BindingOutcome::Created)
            .count()
    }

    /// Report for a run with role assignment disabled.
    pub fn skipped(desired: &[DesiredBinding]) -> Self {
        Self {
            results: desired
                .iter()
                .map(|d| BindingResult {
                    principal: d.principal.to_string(),
                    principal_id: None,
                    role: d.role,
                    outcome: BindingOutcome::Skipped,
                })
                .collect(),
            ..Self::default()
        }
    }
}

enum CurrentAssignments {
    Listed(Vec<RoleAssignment>),
    /// 403: the caller has no grant on the workspace yet.
    Denied,
    Unavailable,
}

async fn current_assignments(
    client: &FabricClient,
    token: &Token,
    workspace_id: &str,
) -> CurrentAssignments {
    match client.list_role_assignments(token, workspace_id).await {
        Ok(Listing::Items(all)) => CurrentAssignments::Listed(all),
        Ok(Listing::Rejected(resp)) if resp.status == 403 => {
            warn!(
                workspace_id,
                "cannot list role assignments (HTTP 403); service principal may not be assigned yet"
            );
            CurrentAssignments::Denied
        }
        Ok(Listing::Rejected(resp)) => {
            warn!(
                workspace_id,
                status = resp.status,
                detail = %resp.error_message(),
                "failed to list role assignments; treating as empty"
            );
            CurrentAssignments::Unavailable
        }
        Err(e) => {
            warn!(workspace_id, error = %e, "failed to list role assignments; treating as empty");
            CurrentAssignments::Unavailable
        }
    }
}

async fn grant(
    client: &FabricClient,
    token: &Token,
    workspace_id: &str,
    binding: &Binding,
) -> BindingOutcome {
    let principal_id = binding.principal.id.as_str();
    let resp = match client.create_role_assignment(token, workspace_id, binding).await {
        Ok(resp) => resp,
        Err(e) => {
            error!(principal_id, role = %binding.role, error = %e, "role assignment failed");
            return BindingOutcome::Failed {
                status: None,
                detail: e.to_string(),
            };
        }
    };

    match resp.status {
        200 | 201 => {
            info!(principal_id, role = %binding.role, "role assigned");
            BindingOutcome::Created
        }
        409 => {
            info!(principal_id, role = %binding.role, "role already assigned");
            BindingOutcome::AlreadyAssigned
        }
        403 => {
            warn!(
                principal_id,
                role = %binding.role,
                "cannot auto-assign role (HTTP 403); assign it manually in the workspace settings"
            );
            BindingOutcome::PermissionDenied {
                detail: resp.error_message(),
            }
        }
        status => {
            error!(principal_id, role = %binding.role, status, "role assignment failed");
            BindingOutcome::Failed {
                status: Some(status),
                detail: resp.error_message(),
            }
        }
    }
}

/// Grant every binding in `desired` that the workspace does not already have.
///
/// Returns one [`BindingOutcome`] per desired binding, in order, along with
/// the before/after listings.
pub async fn reconcile(
    client: &FabricClient,
    token: &Token,
    workspace_id: &str,
    desired: &[Binding],
) -> (Vec<BindingOutcome>, ReconcileReport) {
    let mut report = ReconcileReport::default();
    match current_assignments(client, token, workspace_id).await {
        CurrentAssignments::Listed(all) => report.before = all,
        CurrentAssignments::Denied => report.listing_denied = true,
        CurrentAssignments::Unavailable => {}
    }

    // Duplicate remote entries collapse into one key.
    let mut existing: HashSet<(String, Role)> = report
        .before
        .iter()
        .map(|ra| {
            let (id, role) = ra.key();
            (id.to_string(), role)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(desired.len());
    for binding in desired {
        let (id, role) = binding.key();
        let key = (id.to_string(), role);
        if existing.contains(&key) {
            info!(principal_id = id, %role, "role already present; skipping");
            outcomes.push(BindingOutcome::AlreadyPresent);
            continue;
        }
        let outcome = grant(client, token, workspace_id, binding).await;
        if outcome.is_satisfied() {
            existing.insert(key);
        }
        outcomes.push(outcome);
    }

    report.after = match current_assignments(client, token, workspace_id).await {
        CurrentAssignments::Listed(all) => all,
        _ => Vec::new(),
    };
    (outcomes, report)
}

/// Clients and tokens needed to reconcile configured bindings.
pub struct BindingContext<'a> {
    pub client: &'a FabricClient,
    pub token: &'a Token,
    pub directory: &'a DirectoryClient,
    /// Graph-scoped token; only needed when a binding names an e-mail.
    pub graph_token: Option<&'a Token>,
    pub workspace_id: &'a str,
    /// Skip e-mail bindings whose user already appears in the legacy
    /// membership listing, whatever their role.
    pub legacy_member_check: bool,
}

async fn legacy_member_emails(ctx: &BindingContext<'_>) -> HashSet<String> {
    match ctx.client.list_group_users(ctx.token, ctx.workspace_id).await {
        Ok(Listing::Items(users)) => {
            for u in &users {
                info!(
                    identifier = ?u.identifier,
                    email = ?u.email_address,
                    access = ?u.group_user_access_right,
                    principal_type = ?u.principal_type,
                    "existing workspace member"
                );
            }
            users
                .into_iter()
                .filter_map(|u| u.email_address)
                .map(|e| e.to_lowercase())
                .collect()
        }
        Ok(Listing::Rejected(resp)) => {
            warn!(status = resp.status, "cannot list workspace members; skipping membership check");
            HashSet::new()
        }
        Err(e) => {
            warn!(error = %e, "cannot list workspace members; skipping membership check");
            HashSet::new()
        }
    }
}

async fn resolve_principal(
    ctx: &BindingContext<'_>,
    desired: &DesiredBinding,
) -> Result<Principal, BindingOutcome> {
    let email = match &desired.principal {
        PrincipalRef::Id(id) => return Ok(Principal::new(id.clone(), desired.kind)),
        PrincipalRef::Email(email) => email,
    };
    let Some(graph_token) = ctx.graph_token else {
        return Err(BindingOutcome::Failed {
            status: None,
            detail: format!("no directory token available to resolve {email}"),
        });
    };
    match ctx.directory.resolve_user(graph_token, email).await {
        Ok(Some(id)) => Ok(Principal::new(id, desired.kind)),
        Ok(None) => Err(BindingOutcome::Failed {
            status: Some(404),
            detail: format!("{email} not found in directory"),
        }),
        Err(e) => Err(BindingOutcome::Failed {
            status: None,
            detail: e.to_string(),
        }),
    }
}

/// Resolve configured principals and reconcile them against the workspace.
pub async fn reconcile_desired(
    ctx: &BindingContext<'_>,
    desired: &[DesiredBinding],
) -> ReconcileReport {
    let members = if ctx.legacy_member_check
        && desired
            .iter()
            .any(|d| matches!(d.principal, PrincipalRef::Email(_)))
    {
        legacy_member_emails(ctx).await
    } else {
        HashSet::new()
    };

    let mut results: Vec<BindingResult> = Vec::with_capacity(desired.len());
    let mut pending: Vec<(usize, Binding)> = Vec::new();
    for d in desired {
        let mut result = BindingResult {
            principal: d.principal.to_string(),
            principal_id: None,
            role: d.role,
            outcome: BindingOutcome::AlreadyPresent,
        };
        if let PrincipalRef::Email(email) = &d.principal
            && members.contains(&email.to_lowercase())
        {
            info!(email = %email, "user already a workspace member; skipping role assignment");
            results.push(result);
            continue;
        }
        match resolve_principal(ctx, d).await {
            Ok(principal) => {
                result.principal_id = Some(principal.id.clone());
                pending.push((results.len(), Binding::new(principal, d.role)));
            }
            Err(outcome) => {
                warn!(principal = %d.principal, "could not resolve principal");
                result.outcome = outcome;
            }
        }
        results.push(result);
    }

    let bindings: Vec<Binding> = pending.iter().map(|(_, b)| b.clone()).collect();
    let (outcomes, mut report) = reconcile(ctx.client, ctx.token, ctx.workspace_id, &bindings).await;
    for ((idx, _), outcome) in pending.into_iter().zip(outcomes) {
        results[idx].outcome = outcome;
    }
    report.results = results;
    report
}
