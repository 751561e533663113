use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "keystone")]
#[command(
    author,
    version,
    about = "Deploy and wire up the Triumph protocol contracts"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "KEYSTONE_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a Keystone.toml configuration file.
    ///
    /// If not provided, ./Keystone.toml is used when it exists.
    #[arg(long, alias = "conf", env = "KEYSTONE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Network name. Each network has its own registry file.
    #[arg(short, long, global = true)]
    pub network: Option<String>,

    /// The URL of the JSON-RPC endpoint.
    #[arg(long, alias = "rpc", global = true)]
    pub rpc_url: Option<Url>,

    /// Sending account. Must be unlocked on the node.
    ///
    /// If not provided, the node's first account is used.
    #[arg(long, global = true)]
    pub deployer: Option<Address>,

    /// Directory holding the compiled artifacts (`<Contract>.json`).
    #[arg(long, global = true)]
    pub artifacts: Option<PathBuf>,

    /// The path to the output data directory.
    #[arg(long, global = true)]
    pub outdata: Option<PathBuf>,

    /// Redeploy every unit, even those already in the registry.
    #[arg(long, env = "KEYSTONE_REDEPLOY", global = true, default_value_t = false)]
    pub redeploy: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Deploy the units, in dependency order.
    Deploy {
        /// Only deploy units with one of these tags, plus their dependencies.
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Run the setup sequence against deployed units.
    Setup,
    /// Deploy every unit, then run the setup sequence.
    #[default]
    All,
    /// Print what would be deployed and configured.
    Plan {
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Print the registry.
    Status,
}

/// Command line values that take precedence over the configuration file.
#[derive(Debug, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rpc_url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deployer: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifacts: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outdata: Option<PathBuf>,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            network: self.network.clone(),
            rpc_url: self.rpc_url.clone(),
            deployer: self.deployer,
            artifacts: self.artifacts.clone(),
            outdata: self.outdata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_deploy::{DeployConfig, config::CONFIG_FILENAME};
    use tempdir::TempDir;

    #[test]
    fn test_default_command_is_all() {
        let cli = Cli::try_parse_from(["keystone"]).unwrap();
        assert_eq!(cli.command.unwrap_or_default(), Command::All);
        assert_eq!(cli.verbosity, LevelFilter::INFO);
    }

    #[test]
    fn test_parse_deploy_with_tags() {
        let cli = Cli::try_parse_from([
            "keystone",
            "deploy",
            "--tags",
            "staking,governance",
            "--redeploy",
            "--network",
            "sepolia",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Some(Command::Deploy {
                tags: vec!["staking".to_string(), "governance".to_string()]
            })
        );
        assert!(cli.redeploy);
        assert_eq!(cli.network.as_deref(), Some("sepolia"));
    }

    #[test]
    fn test_invalid_deployer_is_rejected() {
        assert!(Cli::try_parse_from(["keystone", "--deployer", "0x1234"]).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp_dir = TempDir::new("keystone-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "network = \"sepolia\"\noutdata = \"/tmp/out\"\n").unwrap();

        let cli = Cli::try_parse_from(["keystone", "status", "--outdata", "/var/keystone"]).unwrap();
        let config = DeployConfig::load(Some(&path), cli.overrides()).unwrap();

        assert_eq!(config.network, "sepolia");
        assert_eq!(config.outdata, PathBuf::from("/var/keystone"));
    }
}
