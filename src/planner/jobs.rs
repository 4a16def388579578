//! Bootstrap and execution selection.
//!
//! Only the jobs a change actually needs are scheduled: enrolment for new
//! units, provisioning for new or changed payloads and for units that just
//! joined an unchanged group, and cleanup for units that went away.

use std::collections::HashSet;
use tracing::debug;

use crate::model::{Execution, Instance, TargetState};
use crate::normalizer::bootstrap::{bootstrap_job_name, cleanup_job, master_name};

use super::diff::DiffSet;

/// Selects the bootstrap jobs for newly created units.
#[must_use]
pub fn bootstraps_to_create(target: &TargetState, instances: &DiffSet<Instance>) -> Vec<Execution> {
    if !target.bootstrapping.is_enabled() {
        return Vec::new();
    }

    let wanted: HashSet<String> = instances
        .to_create
        .iter()
        .map(|unit| bootstrap_job_name(&unit.name))
        .collect();

    target
        .bootstraps
        .iter()
        .filter(|job| wanted.contains(&job.name))
        .cloned()
        .collect()
}

/// Selects the executions to run, followed by cleanup jobs for deleted
/// units.
#[must_use]
pub fn executions_to_create(
    previous: &TargetState,
    target: &TargetState,
    instances: &DiffSet<Instance>,
) -> Vec<Execution> {
    let Some(provisioner) = target.bootstrapping.provisioner() else {
        return Vec::new();
    };

    let created: HashSet<&str> = instances
        .to_create
        .iter()
        .map(|unit| unit.name.as_str())
        .collect();

    let mut selected = Vec::new();
    for execution in &target.executions {
        match previous.executions.iter().find(|e| e.name == execution.name) {
            Some(old) if old.payload == execution.payload => {
                let target: Vec<String> = execution
                    .target
                    .iter()
                    .filter(|unit| created.contains(unit.as_str()))
                    .cloned()
                    .collect();
                if !target.is_empty() {
                    debug!(
                        "Execution {} restricted to {} new units",
                        execution.name,
                        target.len()
                    );
                    selected.push(Execution {
                        target,
                        ..execution.clone()
                    });
                }
            }
            _ => selected.push(execution.clone()),
        }
    }

    let master = master_name(&target.service_name, provisioner);
    selected.extend(
        instances
            .to_delete
            .iter()
            .filter(|unit| unit.name != master)
            .map(|unit| cleanup_job(provisioner, &master, &unit.name)),
    );

    selected
}
