mod cli;
mod commands;
mod observability;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use fabric_deploy_core::{ClientSecretCredential, DeployConfig, Orchestrator, load_config};

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    observability::init_tracing_with_level(&cli.log_level);

    let mut cfg = load_config(cli.config.as_deref()).context("loading configuration")?;
    cli.overrides.apply(&mut cfg);

    let tokens = ClientSecretCredential::new(&cfg.endpoints.authority, cfg.credentials.clone());

    match &cli.command {
        Commands::Run => commands::deploy::run(&orchestrator(&cfg, &tokens)?).await?,
        Commands::EnsureWorkspace => {
            commands::workspace::ensure(&orchestrator(&cfg, &tokens)?).await?
        }
        Commands::Roles => commands::roles::show(&orchestrator(&cfg, &tokens)?).await?,
        Commands::AssignRoles => commands::roles::assign(&orchestrator(&cfg, &tokens)?).await?,
        Commands::Discover(args) => commands::deploy::discover(&cfg, args.path.as_deref()).await?,
    }
    Ok(())
}

fn orchestrator<'a>(
    cfg: &'a DeployConfig,
    tokens: &'a ClientSecretCredential,
) -> Result<Orchestrator<'a>> {
    Orchestrator::new(cfg, tokens).context("invalid configuration")
}
