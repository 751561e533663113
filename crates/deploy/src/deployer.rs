//! Top-level orchestration: configuration, registry, ledger, deploy, setup.

use alloy_core::primitives::Address;
use anyhow::Context;

use crate::{
    artifacts::Artifacts,
    catalog,
    config::{CONFIG_FILENAME, DeployConfig},
    error::DeployError,
    executor::Executor,
    ledger::{JsonRpcLedger, LedgerClient},
    registry::{DeploymentRecord, Registry},
    report,
    resolver::resolve_order,
    setup::{Configurator, SetupPlan, StepReport},
    unit::UnitDescriptor,
};

/// Drives a deployment of the protocol catalog from a [`DeployConfig`].
#[derive(Debug, Clone)]
pub struct Deployer {
    pub config: DeployConfig,
}

impl Deployer {
    pub fn new(config: DeployConfig) -> Self {
        Self { config }
    }

    /// Save the configuration next to the registry, in `outdata`.
    pub fn save_config(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.config.outdata).with_context(|| {
            format!(
                "Failed to create output directory {}",
                self.config.outdata.display()
            )
        })?;
        self.config
            .save_to_file(&self.config.outdata.join(CONFIG_FILENAME))
    }

    /// Catalog units with the configured overrides applied, narrowed to `tags`.
    pub fn units(&self, tags: &[String]) -> Result<Vec<UnitDescriptor>, DeployError> {
        let units = self
            .config
            .apply_overrides(catalog::units(&self.config.params))?;
        crate::resolver::select_by_tags(&units, tags)
    }

    pub fn setup_plan<L: LedgerClient>(&self) -> SetupPlan<L> {
        catalog::setup_plan(&self.config.params)
    }

    pub fn open_registry(&self) -> Result<Registry, DeployError> {
        Registry::open(&self.config.registry_path(), &self.config.network)
    }

    /// Registry view for `plan` and `status`; takes no lock.
    pub fn read_registry(&self) -> Result<Registry, DeployError> {
        Registry::open_read_only(&self.config.registry_path(), &self.config.network)
    }

    /// Connect to the configured node and pick the sending account.
    pub async fn connect(&self) -> anyhow::Result<(JsonRpcLedger, Address)> {
        let ledger = JsonRpcLedger::new(self.config.rpc_url.clone(), self.config.confirmation)?;
        let chain_id = ledger
            .chain_id()
            .await
            .with_context(|| format!("Failed to reach node at {}", self.config.rpc_url))?;

        let sender = match self.config.deployer {
            Some(deployer) => deployer,
            None => ledger.default_account().await?,
        };

        tracing::info!(
            network = %self.config.network,
            rpc_url = %self.config.rpc_url,
            chain_id,
            sender = %sender,
            "Connected to node"
        );

        Ok((ledger, sender))
    }

    /// Print the resolved order and the setup steps without touching the
    /// ledger.
    pub fn plan(&self, registry: &Registry, tags: &[String], redeploy: bool) -> Result<(), DeployError> {
        let units = self.units(tags)?;
        let order = resolve_order(&units)?;
        let plan = self.setup_plan::<JsonRpcLedger>();

        println!("{}", report::plan_table(&order, registry, redeploy));
        println!("{}", report::steps_table(&plan.describe()));
        Ok(())
    }

    /// Deploy the units selected by `tags`, in dependency order.
    pub async fn deploy<L: LedgerClient>(
        &self,
        ledger: &L,
        sender: Address,
        registry: &mut Registry,
        tags: &[String],
        redeploy: bool,
    ) -> Result<Vec<DeploymentRecord>, DeployError> {
        let units = self.units(tags)?;
        let order = resolve_order(&units)?;
        let names: Vec<&str> = order.names().into_iter().map(|name| name.as_str()).collect();
        tracing::info!(
            units = order.len(),
            order = %names.join(" -> "),
            "Resolved deployment order"
        );

        let artifacts = Artifacts::load(
            &self.config.artifacts,
            order.iter().map(|unit| unit.artifact.as_str()),
        )
        .map_err(|err| DeployError::InvalidConfig(format!("{err:#}")))?;

        let records = Executor::new(ledger, &artifacts, sender)
            .redeploy(redeploy)
            .deploy_all(&order, registry)
            .await?;

        println!("{}", report::deployment_table(&records));
        Ok(records)
    }

    /// Run the setup sequence against an already deployed registry.
    pub async fn setup<L: LedgerClient>(
        &self,
        ledger: &L,
        sender: Address,
        registry: &Registry,
    ) -> Result<Vec<StepReport>, DeployError> {
        let plan = self.setup_plan::<L>();
        let reports = Configurator::new(ledger, sender)
            .run_setup(&plan, registry)
            .await?;

        println!("{}", report::setup_table(&reports));
        Ok(reports)
    }

    /// Deploy every unit, then run the setup sequence.
    pub async fn deploy_and_setup<L: LedgerClient>(
        &self,
        ledger: &L,
        sender: Address,
        registry: &mut Registry,
        redeploy: bool,
    ) -> Result<(), DeployError> {
        // Setup inputs must all be deployable before anything is submitted.
        self.setup_plan::<L>().validate(&self.units(&[])?)?;

        self.deploy(ledger, sender, registry, &[], redeploy).await?;
        self.setup(ledger, sender, registry).await?;
        Ok(())
    }
}
