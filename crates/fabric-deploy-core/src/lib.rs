//! Idempotent provisioning of a Microsoft Fabric workspace and deployment of
//! content items into it.
//!
//! The building blocks can be used on their own ([`workspace::ensure_workspace`],
//! [`bindings::reconcile`], [`catalog::ContentCatalog`], [`deployer::deploy_one`])
//! or driven end to end by [`orchestrator::Orchestrator`].

pub mod bindings;
pub mod catalog;
pub mod client;
pub mod config;
pub mod deployer;
pub mod directory;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod source;
pub mod token;
pub mod workspace;

pub use bindings::{BindingOutcome, BindingResult, ReconcileReport};
pub use catalog::ContentCatalog;
pub use client::FabricClient;
pub use config::DeployConfig;
pub use config::loader::load_config;
pub use error::{DeployError, Result};
pub use model::*;
pub use orchestrator::{Orchestrator, RunFailure, Summary};
pub use token::{ClientSecretCredential, Token, TokenProvider};
pub use workspace::WorkspaceResolution;
