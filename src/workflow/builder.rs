//! Workflow graph builder.
//!
//! Fragment precedence lives in the stage tables below. Each table is walked
//! in order; a stage contributes its fragment when its gate holds and no
//! fragment with the same subject is in the graph yet. Parents come before
//! children on create, children before parents on delete.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, WorkflowError};
use crate::model::ExecutionPurpose;
use crate::planner::{Baseline, ChangeSet};

use super::fragment::Subject;
use super::graph::WorkflowGraph;
use super::registry::TemplateRegistry;

/// The kind of graph to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildKind {
    /// Create or update an environment.
    Create,
    /// Tear an environment down.
    Delete,
    /// Adopt an environment that already exists outside the planner.
    Import,
}

/// Condition under which a stage contributes its fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Routers to create.
    RoutersToCreate,
    /// Networks to create.
    NetworksToCreate,
    /// Networks to update.
    NetworksToUpdate,
    /// Instances to create.
    InstancesToCreate,
    /// Instances to update.
    InstancesToUpdate,
    /// Instances to delete.
    InstancesToDelete,
    /// Networks to delete.
    NetworksToDelete,
    /// Routers to delete.
    RoutersToDelete,
    /// Firewalls present on first creation.
    FirewallsInitial,
    /// NATs present on first creation.
    NatsInitial,
    /// Firewalls differ from the baseline.
    FirewallsChanged,
    /// NATs differ from the baseline.
    NatsChanged,
    /// Bootstrap jobs to run.
    BootstrapsToCreate,
    /// Executions to run.
    ExecutionsToCreate,
    /// Cleanup jobs for deleted units.
    CleanupExecutions,
}

/// One row of a precedence table.
#[derive(Debug, Clone, Copy)]
pub struct Stage {
    /// Condition for inclusion.
    pub gate: Gate,
    /// Fragment to include.
    pub fragment: &'static str,
    /// Subject the fragment must carry.
    pub subject: Subject,
}

const fn stage(gate: Gate, fragment: &'static str, subject: Subject) -> Stage {
    Stage {
        gate,
        fragment,
        subject,
    }
}

/// Stages evaluated for every create graph.
pub const CREATE_STAGES: &[Stage] = &[
    stage(Gate::RoutersToCreate, "routers_create", Subject::Routers),
    stage(Gate::NetworksToCreate, "networks_create", Subject::Networks),
    stage(Gate::InstancesToCreate, "instances_create", Subject::Instances),
    stage(Gate::FirewallsInitial, "firewalls_create", Subject::Firewalls),
    stage(Gate::NatsInitial, "nats_create", Subject::Nats),
    stage(Gate::BootstrapsToCreate, "bootstraps_create", Subject::Bootstrapping),
    stage(Gate::ExecutionsToCreate, "executions_create", Subject::RunningExecutions),
];

/// Stages evaluated after the create stages when the environment exists.
///
/// Rule sets are re-applied before the routers and networks they reference
/// are removed.
pub const UPDATE_STAGES: &[Stage] = &[
    stage(Gate::NetworksToCreate, "networks_create", Subject::Networks),
    stage(Gate::NetworksToUpdate, "networks_update", Subject::NetworksUpdate),
    stage(Gate::InstancesToUpdate, "instances_update", Subject::InstancesUpdate),
    stage(Gate::InstancesToDelete, "instances_delete", Subject::InstancesDelete),
    stage(Gate::FirewallsChanged, "firewalls_update", Subject::Firewalls),
    stage(Gate::NatsChanged, "nats_update", Subject::Nats),
    stage(Gate::NetworksToDelete, "networks_delete", Subject::NetworksDelete),
    stage(Gate::RoutersToDelete, "routers_delete", Subject::RoutersDelete),
    stage(Gate::BootstrapsToCreate, "bootstraps_create", Subject::Bootstrapping),
    stage(Gate::BootstrapsToCreate, "executions_create", Subject::RunningExecutions),
    stage(Gate::CleanupExecutions, "executions_create", Subject::RunningExecutions),
];

/// Stages of a delete graph.
pub const DELETE_STAGES: &[Stage] = &[
    stage(Gate::InstancesToDelete, "instances_delete", Subject::InstancesDelete),
    stage(Gate::NetworksToDelete, "networks_delete", Subject::NetworksDelete),
    stage(Gate::RoutersToDelete, "routers_delete", Subject::RoutersDelete),
];

impl Gate {
    /// Evaluates the gate against a change set.
    #[must_use]
    pub fn holds(self, changes: &ChangeSet) -> bool {
        match self {
            Self::RoutersToCreate => !changes.routers.to_create.is_empty(),
            Self::NetworksToCreate => !changes.networks.to_create.is_empty(),
            Self::NetworksToUpdate => !changes.networks.to_update.is_empty(),
            Self::InstancesToCreate => !changes.instances.to_create.is_empty(),
            Self::InstancesToUpdate => !changes.instances.to_update.is_empty(),
            Self::InstancesToDelete => !changes.instances.to_delete.is_empty(),
            Self::NetworksToDelete => !changes.networks.to_delete.is_empty(),
            Self::RoutersToDelete => !changes.routers.to_delete.is_empty(),
            Self::FirewallsInitial => {
                changes.baseline == Baseline::Initial && changes.firewalls_changed
            }
            Self::NatsInitial => changes.baseline == Baseline::Initial && changes.nats_changed,
            Self::FirewallsChanged => changes.firewalls_changed,
            Self::NatsChanged => changes.nats_changed,
            Self::BootstrapsToCreate => !changes.bootstraps_to_create.is_empty(),
            Self::ExecutionsToCreate => !changes.executions_to_create.is_empty(),
            Self::CleanupExecutions => changes
                .executions_to_create
                .iter()
                .any(|e| e.purpose == ExecutionPurpose::Cleanup),
        }
    }
}

/// Builds workflow graphs from change sets.
#[derive(Debug, Clone, Copy)]
pub struct GraphBuilder<'a> {
    registry: &'a TemplateRegistry,
}

impl<'a> GraphBuilder<'a> {
    /// Creates a builder drawing fragments from a registry.
    #[must_use]
    pub const fn new(registry: &'a TemplateRegistry) -> Self {
        Self { registry }
    }

    /// Builds the graph for a change set.
    ///
    /// # Errors
    ///
    /// Returns an error if a fragment is missing from the registry or is
    /// tagged with a subject other than the one its stage expects.
    pub fn build(&self, kind: BuildKind, changes: &ChangeSet) -> Result<WorkflowGraph> {
        let mut graph = WorkflowGraph::new(self.registry.version());

        match kind {
            BuildKind::Create => {
                self.push(&mut graph, "initial", Subject::Initial)?;
                self.walk(&mut graph, CREATE_STAGES, changes)?;
                if changes.baseline == Baseline::Existing {
                    self.walk(&mut graph, UPDATE_STAGES, changes)?;
                }
                self.push(&mut graph, "terminal", Subject::Terminal)?;
            }
            BuildKind::Delete => {
                self.push(&mut graph, "delete_initial", Subject::Initial)?;
                self.walk(&mut graph, DELETE_STAGES, changes)?;
                self.push(&mut graph, "delete_terminal", Subject::Terminal)?;
            }
            BuildKind::Import => {
                self.push(&mut graph, "import", Subject::Import)?;
                self.push(&mut graph, "terminal", Subject::Terminal)?;
            }
        }

        info!(
            "Built {:?} graph with fragments: {}",
            kind,
            graph.fragment_names().join(", ")
        );
        Ok(graph)
    }

    /// Walks a stage table, appending fragments whose gate holds.
    fn walk(&self, graph: &mut WorkflowGraph, stages: &[Stage], changes: &ChangeSet) -> Result<()> {
        for stage in stages {
            if !stage.gate.holds(changes) {
                continue;
            }
            if graph.contains_subject(stage.subject) {
                debug!(
                    "Skipping {}: subject {} already in graph",
                    stage.fragment, stage.subject
                );
                continue;
            }
            self.push(graph, stage.fragment, stage.subject)?;
        }
        Ok(())
    }

    /// Appends a named fragment after checking its subject.
    fn push(&self, graph: &mut WorkflowGraph, name: &str, expected: Subject) -> Result<()> {
        let fragment = self.registry.get(name)?;
        if fragment.subject != expected {
            return Err(WorkflowError::SubjectMismatch {
                fragment: name.to_string(),
                expected: expected.to_string(),
                found: fragment.subject.to_string(),
            }
            .into());
        }
        graph.append(fragment);
        Ok(())
    }
}
