//! keystone deploys the Triumph protocol contracts in dependency order and
//! wires them together.

mod cli;

use std::process::ExitCode;

use clap::Parser;

use cli::{Cli, Command};
use keystone_deploy::{DeployConfig, DeployError, Deployer, report};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            let code = err
                .downcast_ref::<DeployError>()
                .map_or(1, DeployError::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = DeployConfig::load(cli.config.as_deref(), cli.overrides())?;
    let deployer = Deployer::new(config);
    let redeploy = cli.redeploy;

    match cli.command.unwrap_or_default() {
        Command::Plan { tags } => {
            let registry = deployer.read_registry()?;
            deployer.plan(&registry, &tags, redeploy)?;
        }
        Command::Status => {
            let registry = deployer.read_registry()?;
            tracing::info!(
                network = %registry.network(),
                records = registry.len(),
                "Registry loaded"
            );
            println!("{}", report::registry_table(&registry));
        }
        Command::Deploy { tags } => {
            deployer.save_config()?;
            let mut registry = deployer.open_registry()?;
            let (ledger, sender) = deployer.connect().await?;
            deployer
                .deploy(&ledger, sender, &mut registry, &tags, redeploy)
                .await?;
        }
        Command::Setup => {
            let registry = deployer.open_registry()?;
            let (ledger, sender) = deployer.connect().await?;
            deployer.setup(&ledger, sender, &registry).await?;
        }
        Command::All => {
            deployer.save_config()?;
            let mut registry = deployer.open_registry()?;
            let (ledger, sender) = deployer.connect().await?;
            deployer
                .deploy_and_setup(&ledger, sender, &mut registry, redeploy)
                .await?;
        }
    }

    Ok(())
}
