//! Workflow fragments.
//!
//! A fragment is a named block of plan steps tagged with the subject it acts
//! on. Fragments are read from templates and never modified afterwards.

use serde::{Deserialize, Serialize};

/// The logical category a fragment belongs to.
///
/// A graph holds at most one fragment per subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    /// Opening fragment of a create or delete graph.
    Initial,
    /// Closing fragment.
    Terminal,
    /// Router creation.
    Routers,
    /// Network creation.
    Networks,
    /// Network update.
    NetworksUpdate,
    /// Instance creation.
    Instances,
    /// Instance update.
    InstancesUpdate,
    /// Instance deletion.
    InstancesDelete,
    /// Firewall build or update.
    Firewalls,
    /// NAT build or update.
    Nats,
    /// Bootstrap jobs.
    Bootstrapping,
    /// Executions.
    RunningExecutions,
    /// Network deletion.
    NetworksDelete,
    /// Router deletion.
    RoutersDelete,
    /// Import of an existing environment.
    Import,
}

/// One step of a plan: on `event`, move from `from` to `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowArc {
    /// Source step.
    pub from: String,
    /// Destination step.
    pub to: String,
    /// Event that triggers the transition.
    pub event: String,
}

/// A named, immutable unit of plan steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowFragment {
    /// Fragment name, unique within a registry.
    pub name: String,
    /// Subject the fragment acts on.
    pub subject: Subject,
    /// Ordered plan steps.
    #[serde(default)]
    pub arcs: Vec<WorkflowArc>,
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initial => "initial",
            Self::Terminal => "terminal",
            Self::Routers => "routers",
            Self::Networks => "networks",
            Self::NetworksUpdate => "networks_update",
            Self::Instances => "instances",
            Self::InstancesUpdate => "instances_update",
            Self::InstancesDelete => "instances_delete",
            Self::Firewalls => "firewalls",
            Self::Nats => "nats",
            Self::Bootstrapping => "bootstrapping",
            Self::RunningExecutions => "running_executions",
            Self::NetworksDelete => "networks_delete",
            Self::RoutersDelete => "routers_delete",
            Self::Import => "import",
        };
        write!(f, "{s}")
    }
}
