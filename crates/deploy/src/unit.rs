//! Declarative descriptors for deployable units.

use std::{borrow::Borrow, fmt, sync::Arc};

use alloy_core::primitives::Address;
use derive_more::{Deref, Display, From};
use serde::{Deserialize, Serialize};

use crate::{abi::AbiValue, error::DeployError, registry::Registry};

/// Unique identifier of a deployable unit.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Deref,
    Display,
    From,
)]
#[serde(transparent)]
pub struct UnitName(String);

impl UnitName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UnitName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl Borrow<str> for UnitName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for UnitName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for UnitName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// What an argument resolver can see while building constructor arguments.
pub struct ArgsContext<'a> {
    pub unit: &'a UnitName,
    pub registry: &'a Registry,
    /// The submitting account.
    pub deployer: Address,
}

impl ArgsContext<'_> {
    /// Address of an already-deployed unit.
    ///
    /// Fails with [`DeployError::UnresolvedDependency`] if the unit has no
    /// registry record yet.
    pub fn address(&self, dependency: &str) -> Result<Address, DeployError> {
        self.registry
            .get(dependency)
            .map(|record| record.address)
            .ok_or_else(|| DeployError::UnresolvedDependency {
                unit: self.unit.clone(),
                dependency: dependency.into(),
            })
    }
}

/// Builds the ordered constructor arguments of a unit.
pub type ArgsResolver =
    Arc<dyn Fn(&ArgsContext<'_>) -> Result<Vec<AbiValue>, DeployError> + Send + Sync>;

fn no_args(_: &ArgsContext<'_>) -> Result<Vec<AbiValue>, DeployError> {
    Ok(Vec::new())
}

/// Declarative description of a deployable unit.
#[derive(Clone)]
pub struct UnitDescriptor {
    pub name: UnitName,
    /// Name of the compiled artifact holding the creation bytecode.
    pub artifact: String,
    /// Declared dependencies, in declaration order, without duplicates.
    pub dependencies: Vec<UnitName>,
    pub args: ArgsResolver,
    /// Skip deployment when the registry already has a record.
    pub idempotent: bool,
    /// Selection tags.
    pub tags: Vec<String>,
}

impl UnitDescriptor {
    /// A unit with no dependencies, no constructor arguments, and
    /// idempotent deployment.
    pub fn new(name: impl Into<UnitName>, artifact: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artifact: artifact.into(),
            dependencies: Vec::new(),
            args: Arc::new(no_args),
            idempotent: true,
            tags: Vec::new(),
        }
    }

    pub fn depends_on<I, N>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<UnitName>,
    {
        for dependency in dependencies {
            let dependency = dependency.into();
            if !self.dependencies.contains(&dependency) {
                self.dependencies.push(dependency);
            }
        }
        self
    }

    pub fn args<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&ArgsContext<'_>) -> Result<Vec<AbiValue>, DeployError> + Send + Sync + 'static,
    {
        self.args = Arc::new(resolver);
        self
    }

    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Run the argument resolver against the registry.
    pub fn resolve_args(
        &self,
        registry: &Registry,
        deployer: Address,
    ) -> Result<Vec<AbiValue>, DeployError> {
        let ctx = ArgsContext {
            unit: &self.name,
            registry,
            deployer,
        };
        (self.args)(&ctx)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

impl fmt::Debug for UnitDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitDescriptor")
            .field("name", &self.name)
            .field("artifact", &self.artifact)
            .field("dependencies", &self.dependencies)
            .field("idempotent", &self.idempotent)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depends_on_dedupes_in_declaration_order() {
        let unit = UnitDescriptor::new("distributor", "Distributor")
            .depends_on(["treasury", "toc"])
            .depends_on(["treasury", "staking"]);

        assert_eq!(unit.dependencies, vec!["treasury", "toc", "staking"]);
    }

    #[test]
    fn test_resolve_args_reports_missing_dependency() {
        let registry = Registry::in_memory("test");
        let unit = UnitDescriptor::new("toc", "TriumphERC20Token")
            .depends_on(["authority"])
            .args(|ctx| Ok(vec![ctx.address("authority")?.into()]));

        let err = unit.resolve_args(&registry, Address::ZERO).unwrap_err();
        match err {
            DeployError::UnresolvedDependency { unit, dependency } => {
                assert_eq!(unit, "toc");
                assert_eq!(dependency, "authority");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_resolver_has_no_args() {
        let registry = Registry::in_memory("test");
        let unit = UnitDescriptor::new("sToc", "sTriumph");

        assert!(unit.resolve_args(&registry, Address::ZERO).unwrap().is_empty());
        assert!(unit.idempotent);
    }
}
