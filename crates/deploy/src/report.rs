//! Human readable summary tables.

use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};

use crate::{
    registry::{DeploymentRecord, Registry},
    resolver::DeploymentOrder,
    setup::StepReport,
};

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// Outcome of a deployment run, one row per unit.
pub fn deployment_table(records: &[DeploymentRecord]) -> Table {
    let mut table = table(vec!["Unit", "Address", "Status", "Tx"]);
    for record in records {
        let status = if record.newly_deployed {
            "deployed"
        } else {
            "skipped"
        };
        table.add_row(vec![
            record.name.to_string(),
            record.address.to_string(),
            status.to_string(),
            record.tx_hash.to_string(),
        ]);
    }
    table
}

/// Outcome of a setup run, one row per step.
pub fn setup_table(reports: &[StepReport]) -> Table {
    let mut table = table(vec!["#", "Step", "Status", "Tx"]);
    for report in reports {
        table.add_row(vec![
            report.id.to_string(),
            report.description.clone(),
            report.state.to_string(),
            report
                .tx_hash
                .map(|hash| hash.to_string())
                .unwrap_or_default(),
        ]);
    }
    table
}

/// Registry contents.
pub fn registry_table(registry: &Registry) -> Table {
    let mut table = table(vec!["Unit", "Address", "Artifact", "Block", "Deployed at"]);
    for record in registry.records() {
        let deployed_at = chrono::DateTime::from_timestamp(record.deployed_at, 0)
            .map(|time| time.to_rfc3339())
            .unwrap_or_else(|| record.deployed_at.to_string());
        table.add_row(vec![
            record.name.to_string(),
            record.address.to_string(),
            record.artifact.clone(),
            record
                .block_number
                .map(|block| block.to_string())
                .unwrap_or_default(),
            deployed_at,
        ]);
    }
    table
}

/// Resolved deployment order, with what a run would do for each unit.
pub fn plan_table(order: &DeploymentOrder<'_>, registry: &Registry, redeploy: bool) -> Table {
    let mut table = table(vec!["#", "Unit", "Artifact", "Depends on", "Action"]);
    for (i, unit) in order.iter().enumerate() {
        let action = match (registry.contains(&unit.name), unit.idempotent && !redeploy) {
            (true, true) => "skip",
            (true, false) => "redeploy",
            (false, _) => "deploy",
        };
        let dependencies = unit
            .dependencies
            .iter()
            .map(|dependency| dependency.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            (i + 1).to_string(),
            unit.name.to_string(),
            unit.artifact.clone(),
            dependencies,
            action.to_string(),
        ]);
    }
    table
}

/// Setup steps in execution order.
pub fn steps_table(steps: &[(usize, String)]) -> Table {
    let mut table = table(vec!["#", "Step"]);
    for (id, description) in steps {
        table.add_row(vec![id.to_string(), description.clone()]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{resolver::resolve_order, unit::UnitDescriptor};

    #[test]
    fn test_plan_table_actions() {
        let units = vec![
            UnitDescriptor::new("a", "A"),
            UnitDescriptor::new("b", "B").depends_on(["a"]).idempotent(false),
        ];
        let order = resolve_order(&units).unwrap();
        let registry = Registry::in_memory("test");

        let rendered = plan_table(&order, &registry, false).to_string();
        assert!(rendered.contains("deploy"));
        assert!(!rendered.contains("skip"));
    }
}
