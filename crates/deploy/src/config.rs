//! Layered deployment configuration.
//!
//! Defaults, then `Keystone.toml`, then `KEYSTONE_*` environment variables,
//! then command line overrides.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Address;
use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    error::DeployError,
    ledger::ConfirmationPolicy,
    unit::{UnitDescriptor, UnitName},
};

/// The default name for the keystone configuration file.
pub const CONFIG_FILENAME: &str = "Keystone.toml";

/// Prefix of the environment variables read by [`DeployConfig::load`].
pub const ENV_PREFIX: &str = "KEYSTONE_";

/// Protocol constants fed into constructor arguments and setup steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolParams {
    /// Treasury timelock, in blocks. Zero disables it.
    pub treasury_timelock: u64,
    pub epoch_length_in_blocks: u64,
    pub first_epoch_number: u64,
    /// Unix timestamp of the first epoch.
    pub first_epoch_time: u64,
    /// Starting index of the staked token (9 decimals).
    pub initial_index: u64,
    /// Reward rate of the staking recipient, in ten-thousandths of a percent.
    pub initial_reward_rate: u64,
    /// Bounty paid to whoever triggers a rebase.
    pub bounty_amount: u64,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            treasury_timelock: 0,
            epoch_length_in_blocks: 1_000,
            first_epoch_number: 767,
            first_epoch_time: 1_639_430_907,
            initial_index: 45_000_000_000,
            initial_reward_rate: 4_000,
            bounty_amount: 100_000_000,
        }
    }
}

/// Per-unit override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotent: Option<bool>,
}

/// Complete configuration of a deployment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Network name. Namespaces the registry file.
    pub network: String,
    /// JSON-RPC endpoint of the node.
    pub rpc_url: Url,
    /// Sending account. Defaults to the node's first account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployer: Option<Address>,
    /// Directory of compiled artifacts.
    pub artifacts: PathBuf,
    /// Output directory. The registry lives under `deployments/`.
    pub outdata: PathBuf,
    pub confirmation: ConfirmationPolicy,
    pub params: ProtocolParams,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub units: BTreeMap<UnitName, UnitOverride>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            network: "localhost".to_string(),
            rpc_url: Url::parse("http://127.0.0.1:8545/").expect("default RPC URL is valid"),
            deployer: None,
            artifacts: PathBuf::from("artifacts"),
            outdata: PathBuf::from("data"),
            confirmation: ConfirmationPolicy::default(),
            params: ProtocolParams::default(),
            units: BTreeMap::new(),
        }
    }
}

impl DeployConfig {
    /// Resolve the configuration from every layer.
    ///
    /// `config_file` is optional; when given explicitly it must exist.
    /// `overrides` is merged last and should skip unset fields.
    pub fn load(config_file: Option<&Path>, overrides: impl Serialize) -> Result<Self, DeployError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match config_file {
            Some(path) if !path.exists() => {
                return Err(DeployError::InvalidConfig(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => figment = figment.merge(Toml::file(CONFIG_FILENAME)),
        }

        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(overrides))
            .extract()
            .map_err(|err| DeployError::InvalidConfig(err.to_string()))?;

        config.validate()?;
        tracing::debug!(network = %config.network, rpc_url = %config.rpc_url, "Configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DeployError> {
        if self.network.is_empty()
            || !self
                .network
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DeployError::InvalidConfig(format!(
                "Invalid network name {:?}: use letters, digits, '-' and '_'",
                self.network
            )));
        }

        if self.confirmation.poll_interval_ms == 0 {
            return Err(DeployError::InvalidConfig(
                "confirmation.poll_interval_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Path of this network's registry file.
    pub fn registry_path(&self) -> PathBuf {
        self.outdata
            .join("deployments")
            .join(format!("{}.json", self.network))
    }

    /// Apply the `[units.<name>]` overrides to `units`.
    pub fn apply_overrides(
        &self,
        mut units: Vec<UnitDescriptor>,
    ) -> Result<Vec<UnitDescriptor>, DeployError> {
        for (name, unit_override) in &self.units {
            let unit = units
                .iter_mut()
                .find(|unit| unit.name == *name)
                .ok_or_else(|| {
                    DeployError::InvalidConfig(format!("Override for unknown unit {name}"))
                })?;

            if let Some(idempotent) = unit_override.idempotent {
                tracing::debug!(unit = %name, idempotent, "Overriding idempotency");
                unit.idempotent = idempotent;
            }
        }
        Ok(units)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize deploy config to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }
}
