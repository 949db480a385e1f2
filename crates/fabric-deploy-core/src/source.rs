//! Materialising the version-controlled source tree.

use std::path::PathBuf;

use tempfile::TempDir;
use tokio::process::Command;
use tracing::info;

use crate::config::SourceConfig;
use crate::error::{DeployError, Result};

/// A source tree on local disk. Clones are removed when this is dropped.
#[derive(Debug)]
pub struct Checkout {
    root: PathBuf,
    _clone: Option<TempDir>,
}

impl Checkout {
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            _clone: None,
        }
    }

    /// Directory holding the item folders. An empty `items_dir` means the
    /// checkout root itself.
    pub fn item_root(&self, items_dir: &str) -> Result<PathBuf> {
        let path = if items_dir.is_empty() {
            self.root.clone()
        } else {
            self.root.join(items_dir)
        };
        if !path.is_dir() {
            return Err(DeployError::source_tree(format!(
                "item folder not found at {}",
                path.display()
            )));
        }
        Ok(path)
    }
}

/// Shallow-clone `url` at `branch` into a fresh temporary directory.
pub async fn clone_repository(url: &str, branch: &str) -> Result<Checkout> {
    let dir = tempfile::Builder::new().prefix("fabric-deploy-").tempdir()?;
    let target = dir.path().join("repo");
    info!(url, branch, "cloning repository");

    let output = Command::new("git")
        .arg("clone")
        .args(["--depth", "1", "--branch", branch])
        .arg(url)
        .arg(&target)
        .output()
        .await
        .map_err(|e| DeployError::source_tree(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DeployError::source_tree(format!(
            "git clone of {url} ({branch}) failed: {}",
            stderr.trim()
        )));
    }
    info!(path = %target.display(), "repository cloned");
    Ok(Checkout {
        root: target,
        _clone: Some(dir),
    })
}

/// Resolve the configured source into a local checkout.
pub async fn checkout(source: &SourceConfig) -> Result<Checkout> {
    match (&source.path, &source.repo_url) {
        (Some(path), _) => {
            if !path.is_dir() {
                return Err(DeployError::source_tree(format!(
                    "source path {} is not a directory",
                    path.display()
                )));
            }
            Ok(Checkout::local(path.clone()))
        }
        (None, Some(url)) => clone_repository(url, &source.branch).await,
        (None, None) => Err(DeployError::config(
            "no source configured; set source.path or source.repo_url",
        )),
    }
}
