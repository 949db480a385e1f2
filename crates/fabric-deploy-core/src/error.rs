use thiserror::Error;

/// Failure taxonomy for a deployment run.
///
/// Only `Auth`, `Resource`, `Config`, `Source` and setup-time `Transport`
/// errors ever abort a run. Conflicts, per-binding and per-item failures are
/// reported as data (`WorkspaceResolution::Conflict`, `BindingOutcome`,
/// `DeploymentOutcome`) and have no variant here.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Workspace error: {0}")]
    Resource(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Source tree error: {0}")]
    Source(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn source_tree(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    pub fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source,
        }
    }
}

/// Result type for deployment operations
pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category() {
        let err = DeployError::resource("create failed (HTTP 500)");
        assert_eq!(err.to_string(), "Workspace error: create failed (HTTP 500)");
    }

    #[test]
    fn config_message_is_preserved() {
        let err = DeployError::config("missing tenant_id");
        assert!(err.to_string().contains("missing tenant_id"));
    }
}
