use anyhow::Result;
use fabric_deploy_core::Orchestrator;

use crate::output::print_workspace;

pub async fn ensure(orchestrator: &Orchestrator<'_>) -> Result<()> {
    let token = orchestrator.fabric_token().await?;
    let resolution = orchestrator.ensure_workspace(&token).await?;
    print_workspace(&resolution);
    Ok(())
}
