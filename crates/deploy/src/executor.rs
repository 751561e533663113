//! Deployment executor.
//!
//! Walks a resolved [`DeploymentOrder`] one unit at a time. A unit is only
//! recorded in the registry after the ledger confirmed its creation, and the
//! first failure aborts the rest of the sequence.

use alloy_core::primitives::Address;

use crate::{
    artifacts::Artifacts,
    error::DeployError,
    ledger::LedgerClient,
    registry::{DeploymentRecord, Registry, args_fingerprint},
    resolver::DeploymentOrder,
    unit::UnitDescriptor,
};

/// Deploys units through a [`LedgerClient`].
pub struct Executor<'a, L> {
    ledger: &'a L,
    artifacts: &'a Artifacts,
    sender: Address,
    redeploy: bool,
}

impl<'a, L: LedgerClient> Executor<'a, L> {
    pub fn new(ledger: &'a L, artifacts: &'a Artifacts, sender: Address) -> Self {
        Self {
            ledger,
            artifacts,
            sender,
            redeploy: false,
        }
    }

    /// Treat every unit as non-idempotent for this run.
    pub fn redeploy(mut self, redeploy: bool) -> Self {
        self.redeploy = redeploy;
        self
    }

    fn may_skip(&self, unit: &UnitDescriptor) -> bool {
        !self.redeploy && unit.idempotent
    }

    fn should_skip(&self, unit: &UnitDescriptor, registry: &Registry) -> bool {
        self.may_skip(unit) && registry.contains(&unit.name)
    }

    /// Deploy every unit of `order` that needs deploying.
    ///
    /// Returns one record per unit, in order; skipped units return their
    /// existing record with `newly_deployed == false`.
    pub async fn deploy_all(
        &self,
        order: &DeploymentOrder<'_>,
        registry: &mut Registry,
    ) -> Result<Vec<DeploymentRecord>, DeployError> {
        // Every artifact must be present before the first submission.
        if let Some(unit) = order
            .iter()
            .find(|unit| !self.should_skip(unit, registry) && !self.artifacts.contains(&unit.artifact))
        {
            return Err(DeployError::MissingArtifact {
                unit: unit.name.clone(),
                artifact: unit.artifact.clone(),
            });
        }

        let mut records = Vec::with_capacity(order.len());
        for unit in order.iter() {
            let record = self.deploy_unit(unit, registry).await?;
            records.push(record);
        }

        let deployed = records.iter().filter(|r| r.newly_deployed).count();
        tracing::info!(
            deployed,
            skipped = records.len() - deployed,
            "Deployment sequence complete"
        );

        Ok(records)
    }

    async fn deploy_unit(
        &self,
        unit: &UnitDescriptor,
        registry: &mut Registry,
    ) -> Result<DeploymentRecord, DeployError> {
        if let Some(existing) = registry.get(&unit.name).filter(|_| self.may_skip(unit)) {
            return self.skip_unit(unit, existing.clone(), registry);
        }

        let args = unit.resolve_args(registry, self.sender)?;
        let bytecode = self
            .artifacts
            .get(&unit.artifact)
            .ok_or_else(|| DeployError::MissingArtifact {
                unit: unit.name.clone(),
                artifact: unit.artifact.clone(),
            })?;

        tracing::info!(
            unit = %unit.name,
            artifact = %unit.artifact,
            args = args.len(),
            replacing = registry.contains(&unit.name),
            "Deploying unit"
        );

        let failed = |cause: anyhow::Error| DeployError::DeploymentFailed {
            unit: unit.name.clone(),
            cause,
        };

        let pending = self
            .ledger
            .submit_creation(bytecode, &args, self.sender)
            .await
            .map_err(failed)?;
        let receipt = self
            .ledger
            .wait_for_confirmation(&pending)
            .await
            .map_err(failed)?;
        let address = receipt.contract_address.ok_or_else(|| {
            failed(anyhow::anyhow!(
                "Receipt for {} carries no contract address",
                receipt.tx_hash
            ))
        })?;

        let record = DeploymentRecord {
            name: unit.name.clone(),
            address,
            artifact: unit.artifact.clone(),
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            args_hash: args_fingerprint(&args),
            deployed_at: chrono::Utc::now().timestamp(),
            newly_deployed: true,
        };
        registry.record(record.clone())?;

        tracing::info!(
            unit = %unit.name,
            address = %address,
            tx_hash = %receipt.tx_hash,
            block = ?receipt.block_number,
            "Unit deployed"
        );

        Ok(record)
    }

    fn skip_unit(
        &self,
        unit: &UnitDescriptor,
        mut existing: DeploymentRecord,
        registry: &Registry,
    ) -> Result<DeploymentRecord, DeployError> {
        existing.newly_deployed = false;

        let args = unit.resolve_args(registry, self.sender)?;
        let args_hash = args_fingerprint(&args);
        if args_hash != existing.args_hash {
            tracing::warn!(
                unit = %unit.name,
                recorded = %existing.args_hash,
                current = %args_hash,
                "Constructor arguments changed since deployment; keeping existing unit (use --redeploy to replace it)"
            );
        }

        tracing::info!(
            unit = %unit.name,
            address = %existing.address,
            "Unit already deployed, skipping"
        );

        Ok(existing)
    }
}
