use std::path::Path;

use anyhow::{Context, Result};
use fabric_deploy_core::catalog::ContentCatalog;
use fabric_deploy_core::{DeployConfig, Orchestrator, source};

use crate::output::{print_bindings, print_catalog, print_summary};

pub async fn run(orchestrator: &Orchestrator<'_>) -> Result<()> {
    match orchestrator.run().await {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(failure) => {
            if let Some(report) = &failure.bindings {
                print_bindings(report);
            }
            Err(failure.error.into())
        }
    }
}

pub async fn discover(cfg: &DeployConfig, path: Option<&Path>) -> Result<()> {
    let item_types = cfg.item_types()?;
    let items = match path {
        Some(dir) => ContentCatalog::new(dir)
            .with_item_types(item_types)
            .discover()
            .with_context(|| format!("scanning {}", dir.display()))?,
        None => {
            let checkout = source::checkout(&cfg.source).await?;
            let root = checkout.item_root(&cfg.source.items_dir)?;
            ContentCatalog::new(root)
                .with_item_types(item_types)
                .discover()?
        }
    };
    print_catalog(&items);
    Ok(())
}
