//! Diff engine for comparing previous and target state.
//!
//! This module computes, per resource kind, what has to be created, updated
//! and deleted to move an environment from its previous state to the target
//! state. Diffing cannot fail: any pair of well-formed states has a diff.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{Execution, Instance, Network, Previous, Router, TargetState};

use super::identity::partition;
use super::jobs;

/// Records to create, update and delete for one resource kind.
///
/// The three lists are disjoint by identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSet<T> {
    /// Records only present in the target.
    pub to_create: Vec<T>,
    /// Records present in both with differing comparable fields.
    pub to_update: Vec<T>,
    /// Records only present in the previous state.
    pub to_delete: Vec<T>,
}

impl<T> Default for DiffSet<T> {
    fn default() -> Self {
        Self {
            to_create: Vec::new(),
            to_update: Vec::new(),
            to_delete: Vec::new(),
        }
    }
}

impl<T> DiffSet<T> {
    /// Returns true if nothing changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Returns the total number of changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }
}

/// What the change set was computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Baseline {
    /// No previous state: first creation.
    #[default]
    Initial,
    /// An existing environment.
    Existing,
    /// Removal of an existing environment.
    Teardown,
}

/// Change summary counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeCounts {
    /// Records to create.
    pub creates: usize,
    /// Records to update.
    pub updates: usize,
    /// Records to delete.
    pub deletes: usize,
}

/// Everything that has to change, per resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Baseline the diff was computed against.
    pub baseline: Baseline,
    /// Router changes.
    pub routers: DiffSet<Router>,
    /// Network changes.
    pub networks: DiffSet<Network>,
    /// Instance unit changes.
    pub instances: DiffSet<Instance>,
    /// Whether the firewall collection differs as a whole.
    pub firewalls_changed: bool,
    /// Whether the NAT collection differs as a whole.
    pub nats_changed: bool,
    /// Bootstrap jobs to run.
    pub bootstraps_to_create: Vec<Execution>,
    /// Executions to run, including cleanup jobs.
    pub executions_to_create: Vec<Execution>,
}

impl ChangeSet {
    /// Builds the change set that removes every record of a state.
    #[must_use]
    pub fn teardown(state: &TargetState) -> Self {
        Self {
            baseline: Baseline::Teardown,
            routers: DiffSet {
                to_delete: state.routers.clone(),
                ..DiffSet::default()
            },
            networks: DiffSet {
                to_delete: state.networks.clone(),
                ..DiffSet::default()
            },
            instances: DiffSet {
                to_delete: state.instances.clone(),
                ..DiffSet::default()
            },
            ..Self::default()
        }
    }

    /// Returns true if the change set requires any work.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.routers.is_empty()
            || !self.networks.is_empty()
            || !self.instances.is_empty()
            || self.firewalls_changed
            || self.nats_changed
            || !self.bootstraps_to_create.is_empty()
            || !self.executions_to_create.is_empty()
    }

    /// Returns per-action totals over the itemized kinds.
    #[must_use]
    pub fn counts(&self) -> ChangeCounts {
        ChangeCounts {
            creates: self.routers.to_create.len()
                + self.networks.to_create.len()
                + self.instances.to_create.len(),
            updates: self.routers.to_update.len()
                + self.networks.to_update.len()
                + self.instances.to_update.len(),
            deletes: self.routers.to_delete.len()
                + self.networks.to_delete.len()
                + self.instances.to_delete.len(),
        }
    }
}

/// Engine for computing change sets.
#[derive(Debug, Default)]
pub struct DiffEngine;

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the change set between a baseline and a target state.
    #[must_use]
    pub fn compute(&self, previous: &Previous, target: &TargetState) -> ChangeSet {
        let empty = TargetState::default();
        let (baseline, before) = match previous {
            Previous::Absent => (Baseline::Initial, &empty),
            Previous::Present(previous) => (Baseline::Existing, &previous.state),
        };

        let routers = partition(&before.routers, &target.routers);
        let networks = partition(&before.networks, &target.networks);
        let instances = partition(&before.instances, &target.instances);

        // Against an absent baseline, an empty rule set counts as unchanged.
        let firewalls_changed = before.firewalls != target.firewalls;
        let nats_changed = before.nats != target.nats;

        let bootstraps_to_create = jobs::bootstraps_to_create(target, &instances);
        let executions_to_create = jobs::executions_to_create(before, target, &instances);

        debug!(
            "Routers: {} create, {} delete; networks: {} create, {} update, {} delete",
            routers.to_create.len(),
            routers.to_delete.len(),
            networks.to_create.len(),
            networks.to_update.len(),
            networks.to_delete.len()
        );

        let changes = ChangeSet {
            baseline,
            routers,
            networks,
            instances,
            firewalls_changed,
            nats_changed,
            bootstraps_to_create,
            executions_to_create,
        };

        let counts = changes.counts();
        info!(
            "Diff for '{}': {} to create, {} to update, {} to delete",
            target.service_name, counts.creates, counts.updates, counts.deletes
        );

        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Definition, DefinitionParser};
    use crate::model::{
        Bootstrapping, Datacenter, ExecutionPurpose, PreviousState, ServiceIdentity,
    };
    use crate::normalizer::Normalizer;
    use crate::workflow::WorkflowGraph;

    const BASE: &str = r"
name: demo
routers:
  - name: gw
    networks:
      - name: web
        subnet: 10.1.0.0/24
instances:
  - name: web
    image: ubuntu-1404
    count: 1
    memory: 1GB
    networks:
      name: web
      start: 10.1.0.11
";

    fn definition(yaml: &str) -> Definition {
        DefinitionParser::new().parse(yaml, None).unwrap()
    }

    fn normalize(yaml: &str, previous: &Previous) -> TargetState {
        let identity = ServiceIdentity {
            service_id: String::from("svc-1"),
            service_name: String::from("demo"),
            ..ServiceIdentity::default()
        };
        Normalizer::new()
            .normalize(&definition(yaml), &identity, &Datacenter::default(), previous)
            .unwrap()
    }

    fn present(state: TargetState) -> Previous {
        Previous::Present(Box::new(PreviousState {
            state,
            workflow: WorkflowGraph::default(),
            endpoint: None,
            snapshot: String::new(),
        }))
    }

    fn names(units: &[Instance]) -> Vec<&str> {
        units.iter().map(|u| u.name.as_str()).collect()
    }

    #[test]
    fn test_absent_baseline_creates_everything() {
        let target = normalize(BASE, &Previous::Absent);
        let changes = DiffEngine::new().compute(&Previous::Absent, &target);

        assert_eq!(changes.baseline, Baseline::Initial);
        assert_eq!(changes.routers.to_create.len(), 1);
        assert_eq!(changes.networks.to_create.len(), 1);
        assert_eq!(changes.instances.to_create.len(), 1);
        assert!(!changes.firewalls_changed);
        assert!(!changes.nats_changed);
    }

    #[test]
    fn test_identical_state_has_no_changes() {
        let target = normalize(BASE, &Previous::Absent);
        let previous = present(target.clone());
        let changes = DiffEngine::new().compute(&previous, &target);

        assert_eq!(changes.baseline, Baseline::Existing);
        assert!(!changes.has_changes());
    }

    #[test]
    fn test_scale_up_creates_and_updates() {
        let first = normalize(BASE, &Previous::Absent);
        let previous = present(first);
        let target = normalize(&BASE.replace("count: 1", "count: 2"), &previous);
        let changes = DiffEngine::new().compute(&previous, &target);

        assert_eq!(names(&changes.instances.to_create), vec!["demo-web-2"]);
        assert_eq!(names(&changes.instances.to_update), vec!["demo-web-1"]);
        assert!(changes.instances.to_delete.is_empty());
        assert!(changes.routers.is_empty());
        assert!(changes.networks.is_empty());
    }

    #[test]
    fn test_scale_down_deletes_tail_units() {
        let first = normalize(&BASE.replace("count: 1", "count: 3"), &Previous::Absent);
        let previous = present(first);
        let target = normalize(BASE, &previous);
        let changes = DiffEngine::new().compute(&previous, &target);

        assert_eq!(names(&changes.instances.to_delete), vec!["demo-web-2", "demo-web-3"]);
        assert_eq!(names(&changes.instances.to_update), vec!["demo-web-1"]);
    }

    #[test]
    fn test_firewall_change_is_atomic() {
        let with_rule = BASE.replace(
            "    networks:\n      - name: web",
            "    rules:\n      - name: ssh\n        source: any\n        destination: web\n        from_port: \"22\"\n        to_port: \"22\"\n        protocol: tcp\n    networks:\n      - name: web",
        );
        let first = normalize(&with_rule, &Previous::Absent);
        let initial = DiffEngine::new().compute(&Previous::Absent, &first);
        assert!(initial.firewalls_changed);

        let previous = present(first);
        let target = normalize(&with_rule.replace("\"22\"", "\"2222\""), &previous);
        let changes = DiffEngine::new().compute(&previous, &target);
        assert!(changes.firewalls_changed);
        assert!(changes.instances.is_empty());
    }

    #[test]
    fn test_executions_restricted_to_new_units() {
        let yaml = BASE.replace("name: demo\n", "name: demo\nbootstrapping: salt\n")
            + "    provisioner:\n      - exec:\n          - date\n";
        let first = normalize(&yaml, &Previous::Absent);
        assert_eq!(first.bootstrapping, Bootstrapping::Provisioner(String::from("salt")));

        let initial = DiffEngine::new().compute(&Previous::Absent, &first);
        assert_eq!(initial.bootstraps_to_create.len(), 1);
        assert_eq!(initial.executions_to_create.len(), 1);

        let previous = present(first);
        let target = normalize(&yaml.replace("count: 1", "count: 2"), &previous);
        let changes = DiffEngine::new().compute(&previous, &target);

        assert_eq!(changes.bootstraps_to_create.len(), 1);
        assert_eq!(changes.bootstraps_to_create[0].name, "bootstrap-demo-web-2");
        assert_eq!(changes.executions_to_create.len(), 1);
        assert_eq!(changes.executions_to_create[0].target, vec!["demo-web-2"]);
    }

    #[test]
    fn test_changed_payload_runs_everywhere() {
        let yaml = BASE.replace("name: demo\n", "name: demo\nbootstrapping: salt\n")
            .replace("count: 1", "count: 2")
            + "    provisioner:\n      - exec:\n          - date\n";
        let previous = present(normalize(&yaml, &Previous::Absent));
        let target = normalize(&yaml.replace("- date", "- uptime"), &previous);
        let changes = DiffEngine::new().compute(&previous, &target);

        assert_eq!(changes.executions_to_create.len(), 1);
        assert_eq!(changes.executions_to_create[0].target.len(), 2);
        assert!(changes.bootstraps_to_create.is_empty());
    }

    #[test]
    fn test_deleted_units_get_cleanup_jobs() {
        let yaml = BASE.replace("name: demo\n", "name: demo\nbootstrapping: salt\n");
        let previous = present(normalize(&yaml.replace("count: 1", "count: 2"), &Previous::Absent));
        let target = normalize(&yaml, &previous);
        let changes = DiffEngine::new().compute(&previous, &target);

        let cleanup: Vec<_> = changes
            .executions_to_create
            .iter()
            .filter(|e| e.purpose == ExecutionPurpose::Cleanup)
            .collect();
        assert_eq!(cleanup.len(), 1);
        assert_eq!(cleanup[0].name, "cleanup-demo-web-2");
        assert_eq!(cleanup[0].target, vec!["demo-salt-master"]);
    }

    #[test]
    fn test_teardown_deletes_everything() {
        let state = normalize(BASE, &Previous::Absent);
        let changes = ChangeSet::teardown(&state);

        assert_eq!(changes.baseline, Baseline::Teardown);
        assert_eq!(changes.routers.to_delete.len(), 1);
        assert_eq!(changes.networks.to_delete.len(), 1);
        assert_eq!(changes.instances.to_delete.len(), 1);
        assert_eq!(changes.counts().deletes, 3);
        assert!(changes.instances.to_create.is_empty());
    }
}
