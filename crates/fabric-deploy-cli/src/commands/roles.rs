use anyhow::Result;
use colored::Colorize;
use fabric_deploy_core::Orchestrator;

use crate::output::{print_bindings, print_role_assignments, print_workspace};

pub async fn show(orchestrator: &Orchestrator<'_>) -> Result<()> {
    let token = orchestrator.fabric_token().await?;
    let ws = orchestrator.find_workspace(&token).await?;
    let assignments = orchestrator.role_assignments(&token, &ws.id).await?;
    print_role_assignments(
        &format!("Role assignments of {}", ws.display_name.cyan()),
        &assignments,
    );
    Ok(())
}

pub async fn assign(orchestrator: &Orchestrator<'_>) -> Result<()> {
    let token = orchestrator.fabric_token().await?;
    let resolution = orchestrator.ensure_workspace(&token).await?;
    print_workspace(&resolution);

    let report = orchestrator
        .reconcile_bindings(&token, &resolution.workspace().id)
        .await?;
    print_bindings(&report);
    Ok(())
}
