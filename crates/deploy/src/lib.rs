//! keystone-deploy - Dependency-ordered contract deployment and setup.
//!
//! Units are declared as [`UnitDescriptor`]s, ordered by the resolver,
//! deployed by the [`Executor`] into a persistent [`Registry`], and wired
//! together by a [`SetupPlan`] whose steps are skipped when the ledger
//! already reflects them.

pub mod abi;
pub mod artifacts;
pub mod catalog;
pub mod config;
mod deployer;
pub mod error;
pub mod executor;
pub mod handles;
pub mod ledger;
pub mod registry;
pub mod report;
pub mod resolver;
mod rpc;
pub mod setup;
pub mod unit;

pub use abi::AbiValue;
pub use artifacts::Artifacts;
pub use config::{DeployConfig, ProtocolParams, UnitOverride};
pub use deployer::Deployer;
pub use error::DeployError;
pub use executor::Executor;
pub use ledger::{ConfirmationPolicy, JsonRpcLedger, LedgerClient, PendingTx, Receipt};
pub use registry::{DeploymentRecord, Registry};
pub use resolver::{DeploymentOrder, resolve_order, select_by_tags};
pub use setup::{ConfigurationStep, Configurator, SetupPlan, StepContext, StepReport, StepState};
pub use unit::{ArgsContext, UnitDescriptor, UnitName};
