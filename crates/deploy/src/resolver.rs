//! Dependency graph resolution.
//!
//! Units are ordered with Kahn's algorithm. Among units that are ready at the
//! same time, the one declared first goes first, so the same input always
//! yields the same order.

use std::collections::{BTreeSet, HashMap, HashSet};

use derive_more::Deref;

use crate::{
    error::DeployError,
    unit::{UnitDescriptor, UnitName},
};

/// Units in an order where every dependency precedes its dependents.
///
/// Only [`resolve_order`] builds this, so the executor can never be handed an
/// arbitrary ordering.
#[derive(Debug, Clone, Deref)]
pub struct DeploymentOrder<'a>(Vec<&'a UnitDescriptor>);

impl<'a> DeploymentOrder<'a> {
    pub fn names(&self) -> Vec<&'a UnitName> {
        self.0.iter().map(|unit| &unit.name).collect()
    }
}

/// Topologically sort `units` by their declared dependencies.
pub fn resolve_order(units: &[UnitDescriptor]) -> Result<DeploymentOrder<'_>, DeployError> {
    let index = index_units(units)?;

    let mut in_degree = vec![0usize; units.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); units.len()];
    for (i, unit) in units.iter().enumerate() {
        for dependency in &unit.dependencies {
            let dep = *index.get(dependency.as_str()).ok_or_else(|| {
                DeployError::UnknownDependency {
                    unit: unit.name.clone(),
                    dependency: dependency.clone(),
                }
            })?;
            in_degree[i] += 1;
            dependents[dep].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..units.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut ordered = Vec::with_capacity(units.len());

    while let Some(next) = ready.pop_first() {
        ordered.push(&units[next]);
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if ordered.len() < units.len() {
        let path = find_cycle(units, &index, &in_degree);
        let unit = path
            .first()
            .cloned()
            .unwrap_or_else(|| units[0].name.clone());
        return Err(DeployError::CycleDetected { unit, path });
    }

    tracing::debug!(
        order = ?ordered.iter().map(|unit| unit.name.as_str()).collect::<Vec<_>>(),
        "Resolved deployment order"
    );

    Ok(DeploymentOrder(ordered))
}

/// Select the units carrying any of `tags`, together with everything they
/// transitively depend on. Declaration order is preserved.
///
/// An empty tag list selects every unit.
pub fn select_by_tags(
    units: &[UnitDescriptor],
    tags: &[String],
) -> Result<Vec<UnitDescriptor>, DeployError> {
    if tags.is_empty() {
        return Ok(units.to_vec());
    }

    if let Some(tag) = tags
        .iter()
        .find(|tag| !units.iter().any(|unit| unit.has_tag(tag)))
    {
        return Err(DeployError::UnknownTag(tag.clone()));
    }

    let index = index_units(units)?;
    let mut selected = HashSet::new();
    let mut stack: Vec<usize> = units
        .iter()
        .enumerate()
        .filter(|(_, unit)| tags.iter().any(|tag| unit.has_tag(tag)))
        .map(|(i, _)| i)
        .collect();

    while let Some(i) = stack.pop() {
        if !selected.insert(i) {
            continue;
        }
        for dependency in &units[i].dependencies {
            let dep = *index.get(dependency.as_str()).ok_or_else(|| {
                DeployError::UnknownDependency {
                    unit: units[i].name.clone(),
                    dependency: dependency.clone(),
                }
            })?;
            stack.push(dep);
        }
    }

    Ok(units
        .iter()
        .enumerate()
        .filter(|(i, _)| selected.contains(i))
        .map(|(_, unit)| unit.clone())
        .collect())
}

fn index_units(units: &[UnitDescriptor]) -> Result<HashMap<&str, usize>, DeployError> {
    let mut index = HashMap::with_capacity(units.len());
    for (i, unit) in units.iter().enumerate() {
        if index.insert(unit.name.as_str(), i).is_some() {
            return Err(DeployError::DuplicateUnit(unit.name.clone()));
        }
    }
    Ok(index)
}

/// Walk unresolved dependencies from the first stuck unit until a unit
/// repeats. Every stuck unit has at least one stuck dependency, so the walk
/// always closes a cycle.
fn find_cycle(
    units: &[UnitDescriptor],
    index: &HashMap<&str, usize>,
    in_degree: &[usize],
) -> Vec<UnitName> {
    let stuck = |i: usize| in_degree[i] > 0;
    let Some(start) = (0..units.len()).find(|&i| stuck(i)) else {
        return Vec::new();
    };

    let mut walk = vec![start];
    let mut position: HashMap<usize, usize> = HashMap::from([(start, 0)]);
    let mut current = start;

    loop {
        let next = units[current]
            .dependencies
            .iter()
            .filter_map(|dep| index.get(dep.as_str()).copied())
            .find(|&dep| stuck(dep));

        let Some(next) = next else {
            break;
        };

        if let Some(&at) = position.get(&next) {
            let mut cycle: Vec<UnitName> =
                walk[at..].iter().map(|&i| units[i].name.clone()).collect();
            cycle.push(units[next].name.clone());
            return cycle;
        }

        position.insert(next, walk.len());
        walk.push(next);
        current = next;
    }

    walk.iter().map(|&i| units[i].name.clone()).collect()
}
