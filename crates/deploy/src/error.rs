//! Error taxonomy for the deployment pipeline.
//!
//! Every variant carries the identity of the unit or setup step it concerns.
//! Lower layers (RPC, file I/O, JSON) report through [`anyhow::Error`], which
//! is attached as the `cause` of the typed variant.

use crate::unit::UnitName;

/// Errors raised while resolving, deploying or configuring units.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The same unit name was declared twice.
    #[error("unit {0} is declared more than once")]
    DuplicateUnit(UnitName),

    /// A unit declares a dependency that has no descriptor.
    #[error("unit {unit} depends on undeclared unit {dependency}")]
    UnknownDependency { unit: UnitName, dependency: UnitName },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle detected at {unit}: {}", format_path(.path))]
    CycleDetected { unit: UnitName, path: Vec<UnitName> },

    /// A tag filter matched no declared unit.
    #[error("no unit carries the tag {0}")]
    UnknownTag(String),

    /// A unit that must be deployed has no compiled artifact.
    #[error("unit {unit} has no compiled artifact named {artifact}")]
    MissingArtifact { unit: UnitName, artifact: String },

    /// A setup step needs a unit that nothing resolves.
    #[error("setup step {step} ({description}) requires unit {unit}, which is not available")]
    MissingStepInput {
        step: usize,
        description: String,
        unit: UnitName,
    },

    /// The loaded configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Constructor arguments referenced a unit not yet in the registry.
    ///
    /// Only reachable when the resolved order was bypassed.
    #[error("unit {unit} needs {dependency}, which is not in the registry")]
    UnresolvedDependency { unit: UnitName, dependency: UnitName },

    /// Submitting or confirming a creation transaction failed.
    #[error("deployment of {unit} failed")]
    DeploymentFailed {
        unit: UnitName,
        #[source]
        cause: anyhow::Error,
    },

    /// Reading, submitting or confirming a setup step failed.
    #[error("setup step {step} ({description}) failed")]
    SetupStepFailed {
        step: usize,
        description: String,
        #[source]
        cause: anyhow::Error,
    },

    /// A confirmed setup action did not produce the state it promised.
    #[error("setup step {step} ({description}) was confirmed but its postcondition does not hold")]
    SetupStepInconsistent { step: usize, description: String },

    /// Loading or persisting the registry failed.
    #[error("registry error")]
    Registry(#[source] anyhow::Error),
}

impl DeployError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::DuplicateUnit(_)
            | Self::UnknownDependency { .. }
            | Self::CycleDetected { .. }
            | Self::UnknownTag(_)
            | Self::MissingArtifact { .. }
            | Self::MissingStepInput { .. }
            | Self::InvalidConfig(_) => 2,
            Self::DeploymentFailed { .. } => 3,
            Self::SetupStepInconsistent { .. } => 4,
            Self::SetupStepFailed { .. } => 5,
            Self::UnresolvedDependency { .. } => 6,
            Self::Registry(_) => 1,
        }
    }

    /// Whether the error was detected before any mutating call.
    pub fn is_configuration_error(&self) -> bool {
        self.exit_code() == 2
    }
}

fn format_path(path: &[UnitName]) -> String {
    path.iter()
        .map(|name| name.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}
