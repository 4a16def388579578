//! Message assembly.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::model::{Previous, TargetState};
use crate::planner::ChangeSet;
use crate::workflow::{BuildKind, WorkflowGraph};

use super::OutboundMessage;

/// Combines the pipeline's outputs into an outbound message.
#[derive(Debug, Default)]
pub struct MessageAssembler;

impl MessageAssembler {
    /// Creates a new assembler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Assembles a message.
    ///
    /// With an existing baseline the endpoint is carried over unchanged and
    /// the previous message is embedded as a snapshot.
    #[must_use]
    pub fn assemble(
        &self,
        kind: BuildKind,
        state: TargetState,
        changes: ChangeSet,
        workflow: WorkflowGraph,
        previous: &Previous,
        definition_hash: String,
    ) -> OutboundMessage {
        let (endpoint, snapshot) = match previous {
            Previous::Absent => (None, None),
            Previous::Present(previous) => {
                (previous.endpoint.clone(), Some(previous.snapshot.clone()))
            }
        };

        let message = OutboundMessage {
            id: Uuid::new_v4(),
            service_id: state.service_id.clone(),
            client_id: state.client_id.clone(),
            client_name: state.client_name.clone(),
            service_name: state.service_name.clone(),
            kind,
            datacenter: state.datacenter.clone(),
            bootstrapping: state.bootstrapping.clone(),
            service_ip: state.service_ip.clone(),
            management_ip: state.management_ip.clone(),
            endpoint,
            definition_hash,
            state,
            changes,
            workflow,
            previous: snapshot,
            created_at: Utc::now(),
        };

        debug!(
            "Assembled {:?} message {} for service {}",
            message.kind, message.id, message.service_id
        );
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PreviousState;

    fn state() -> TargetState {
        TargetState {
            service_id: String::from("svc-1"),
            service_name: String::from("demo"),
            service_ip: Some(String::from("172.16.186.44")),
            ..TargetState::default()
        }
    }

    #[test]
    fn test_first_creation_has_no_endpoint() {
        let message = MessageAssembler::new().assemble(
            BuildKind::Create,
            state(),
            ChangeSet::default(),
            WorkflowGraph::default(),
            &Previous::Absent,
            String::from("abc"),
        );
        assert!(message.endpoint.is_none());
        assert!(message.previous.is_none());
        assert_eq!(message.service_ip.as_deref(), Some("172.16.186.44"));
        assert_eq!(message.definition_hash, "abc");
    }

    #[test]
    fn test_existing_baseline_carries_endpoint_and_snapshot() {
        let previous = Previous::Present(Box::new(PreviousState {
            state: state(),
            workflow: WorkflowGraph::default(),
            endpoint: Some(String::from("172.16.186.44")),
            snapshot: String::from("{\"id\":\"old\"}"),
        }));
        let message = MessageAssembler::new().assemble(
            BuildKind::Create,
            state(),
            ChangeSet::default(),
            WorkflowGraph::default(),
            &previous,
            String::new(),
        );
        assert_eq!(message.endpoint.as_deref(), Some("172.16.186.44"));
        assert_eq!(message.previous.as_deref(), Some("{\"id\":\"old\"}"));
    }
}
