//! Post-deployment configuration.
//!
//! A [`SetupPlan`] is an append-only list of [`ConfigurationStep`]s. The
//! [`Configurator`] runs them strictly in declaration order. Whether a step
//! has already been applied is decided by reading live ledger state, never
//! by a local flag, so an interrupted run is resumed by running the whole
//! plan again.
//!
//! Per step:
//!
//! ```text
//! Pending --(applied)--> Skipped
//! Pending --(not applied)--> Executing --> Confirmed
//!                                      \-> Failed
//! ```

use alloy_core::primitives::{Address, TxHash};
use futures::future::BoxFuture;

use crate::{
    error::DeployError,
    handles::{Handle, TypedHandle},
    ledger::{LedgerClient, PendingTx},
    registry::Registry,
    unit::{UnitDescriptor, UnitName},
};

/// Everything a step may look at: the registry, the ledger and the sender.
pub struct StepContext<'a, L> {
    pub registry: &'a Registry,
    pub ledger: &'a L,
    pub sender: Address,
}

impl<L> Clone for StepContext<'_, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L> Copy for StepContext<'_, L> {}

impl<'a, L: LedgerClient> StepContext<'a, L> {
    /// Untyped handle to a deployed unit.
    pub fn handle(&self, name: &str) -> Result<Handle<'a, L>, DeployError> {
        crate::handles::resolve_unit(self.registry, self.ledger, self.sender, name)
    }

    /// Typed handle to a deployed unit.
    pub fn resolve<H: TypedHandle<'a, L>>(&self, name: &str) -> Result<H, DeployError> {
        self.handle(name).map(H::bind)
    }

    pub fn address(&self, name: &str) -> Result<Address, DeployError> {
        self.handle(name).map(|handle| handle.address())
    }
}

/// A single post-deployment configuration step.
pub trait ConfigurationStep<L: LedgerClient>: Send + Sync {
    /// Human readable summary, e.g. `staking.setDistributor(distributor)`.
    fn description(&self) -> String;

    /// Units this step reads from the registry.
    fn requires(&self) -> Vec<UnitName>;

    /// Whether the on-chain state already reflects this step.
    ///
    /// Checked before the action, and again after it is confirmed.
    fn is_applied<'a>(&'a self, ctx: StepContext<'a, L>) -> BoxFuture<'a, anyhow::Result<bool>>;

    /// Submit the mutating call.
    fn apply<'a>(&'a self, ctx: StepContext<'a, L>) -> BoxFuture<'a, anyhow::Result<PendingTx>>;
}

/// Terminal state of a step within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum StepState {
    Pending,
    Skipped,
    Executing,
    Confirmed,
    Failed,
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// 1-based ordinal in the plan.
    pub id: usize,
    pub description: String,
    pub state: StepState,
    pub tx_hash: Option<TxHash>,
}

/// Ordered list of configuration steps.
///
/// Steps can only be appended; their ordinal is their position, and there is
/// no way to reorder or insert.
pub struct SetupPlan<L: LedgerClient> {
    steps: Vec<Box<dyn ConfigurationStep<L>>>,
}

impl<L: LedgerClient> Default for SetupPlan<L> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<L: LedgerClient> SetupPlan<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step after the ones already declared.
    pub fn then(mut self, step: impl ConfigurationStep<L> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// `(ordinal, description)` for every step, in execution order.
    pub fn describe(&self) -> Vec<(usize, String)> {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| (i + 1, step.description()))
            .collect()
    }

    /// Check that every unit a step requires is declared by `units`.
    ///
    /// Catches steps whose inputs have no resolver before anything is
    /// deployed.
    pub fn validate(&self, units: &[UnitDescriptor]) -> Result<(), DeployError> {
        self.check_inputs(|name| units.iter().any(|unit| unit.name == *name))
    }

    fn check_inputs(&self, available: impl Fn(&UnitName) -> bool) -> Result<(), DeployError> {
        for (i, step) in self.steps.iter().enumerate() {
            if let Some(unit) = step.requires().into_iter().find(|unit| !available(unit)) {
                return Err(DeployError::MissingStepInput {
                    step: i + 1,
                    description: step.description(),
                    unit,
                });
            }
        }
        Ok(())
    }
}

/// Runs a [`SetupPlan`] against the ledger.
pub struct Configurator<'a, L> {
    ledger: &'a L,
    sender: Address,
}

impl<'a, L: LedgerClient> Configurator<'a, L> {
    pub fn new(ledger: &'a L, sender: Address) -> Self {
        Self { ledger, sender }
    }

    /// Run every step of `plan` in order, stopping at the first failure.
    pub async fn run_setup(
        &self,
        plan: &SetupPlan<L>,
        registry: &Registry,
    ) -> Result<Vec<StepReport>, DeployError> {
        // All inputs must be deployed before the first mutating call.
        plan.check_inputs(|name| registry.contains(name))?;

        let ctx = StepContext {
            registry,
            ledger: self.ledger,
            sender: self.sender,
        };

        let mut reports = Vec::with_capacity(plan.len());
        for (i, step) in plan.steps.iter().enumerate() {
            let report = self
                .run_step(i + 1, step.as_ref(), ctx)
                .await
                .inspect_err(|err| {
                    tracing::error!(
                        step = i + 1,
                        state = %StepState::Failed,
                        error = %err,
                        "Setup sequence halted"
                    );
                })?;
            reports.push(report);
        }

        let applied = reports
            .iter()
            .filter(|report| report.state == StepState::Confirmed)
            .count();
        tracing::info!(
            applied,
            skipped = reports.len() - applied,
            "Setup sequence complete"
        );

        Ok(reports)
    }

    async fn run_step(
        &self,
        id: usize,
        step: &dyn ConfigurationStep<L>,
        ctx: StepContext<'_, L>,
    ) -> Result<StepReport, DeployError> {
        let description = step.description();
        let failed = |cause: anyhow::Error| DeployError::SetupStepFailed {
            step: id,
            description: description.clone(),
            cause,
        };

        let mut report = StepReport {
            id,
            description: description.clone(),
            state: StepState::Pending,
            tx_hash: None,
        };

        if step.is_applied(ctx).await.map_err(failed)? {
            tracing::info!(step = id, %description, "Setup step already applied, skipping");
            report.state = StepState::Skipped;
            return Ok(report);
        }

        report.state = StepState::Executing;
        tracing::info!(step = id, %description, "Applying setup step");

        let pending = step.apply(ctx).await.map_err(failed)?;
        report.tx_hash = Some(pending.hash);
        let receipt = self
            .ledger
            .wait_for_confirmation(&pending)
            .await
            .map_err(failed)?;

        if !step.is_applied(ctx).await.map_err(failed)? {
            return Err(DeployError::SetupStepInconsistent {
                step: id,
                description,
            });
        }

        tracing::info!(step = id, %description, tx_hash = %receipt.tx_hash, "Setup step confirmed");
        report.state = StepState::Confirmed;
        Ok(report)
    }
}
