//! The planning pipeline.
//!
//! The mapper runs one request end to end: parse and validate the
//! definition, normalize it against the baseline, diff, build the graph and
//! assemble the outbound message. Errors are returned as soon as a stage
//! fails; nothing is retried.

use std::sync::Arc;
use tracing::{info, warn};

use crate::definition::{derive_definition, Definition, DefinitionHasher, DefinitionValidator};
use crate::error::Result;
use crate::message::{MessageAssembler, OutboundMessage, Request};
use crate::model::{Previous, PreviousState, TargetState};
use crate::normalizer::Normalizer;
use crate::planner::{ChangeSet, DiffEngine};
use crate::workflow::{BuildKind, GraphBuilder, TemplateRegistry};

/// Runs planning requests.
#[derive(Debug, Clone)]
pub struct Mapper {
    /// Fragments for graph building.
    registry: Arc<TemplateRegistry>,
}

impl Mapper {
    /// Creates a mapper over a template registry.
    #[must_use]
    pub const fn new(registry: Arc<TemplateRegistry>) -> Self {
        Self { registry }
    }

    /// Returns the template registry.
    #[must_use]
    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Plans the creation or update of an environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is invalid, an invariant is
    /// violated, or a fragment is missing.
    pub fn create(&self, request: &Request, previous: &Previous) -> Result<OutboundMessage> {
        let (definition, target) = self.target(request, previous)?;

        let changes = DiffEngine::new().compute(previous, &target);
        let workflow = GraphBuilder::new(&self.registry).build(BuildKind::Create, &changes)?;
        let hash = DefinitionHasher::new().hash_definition(&definition);

        info!(
            "Planned {} for service {} ({} fragments)",
            if previous.is_present() { "update" } else { "creation" },
            target.service_id,
            workflow.fragments.len()
        );

        Ok(MessageAssembler::new().assemble(
            BuildKind::Create,
            target,
            changes,
            workflow,
            previous,
            hash,
        ))
    }

    /// Plans the removal of an environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a fragment is missing.
    pub fn delete(&self, request: &Request, previous: PreviousState) -> Result<OutboundMessage> {
        let state = previous.state.clone();
        let changes = ChangeSet::teardown(&state);
        let workflow = GraphBuilder::new(&self.registry).build(BuildKind::Delete, &changes)?;
        let hash = DefinitionHasher::new().hash_definition(&derive_definition(&state));

        info!(
            "Planned removal of service {}: {} records",
            request.id,
            changes.counts().deletes
        );

        Ok(MessageAssembler::new().assemble(
            BuildKind::Delete,
            state,
            changes,
            workflow,
            &Previous::Present(Box::new(previous)),
            hash,
        ))
    }

    /// Plans the import of an environment created elsewhere.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is invalid or a fragment is
    /// missing.
    pub fn import(&self, request: &Request) -> Result<OutboundMessage> {
        let previous = Previous::Absent;
        let (definition, target) = self.target(request, &previous)?;

        let changes = DiffEngine::new().compute(&previous, &target);
        let workflow = GraphBuilder::new(&self.registry).build(BuildKind::Import, &changes)?;
        let hash = DefinitionHasher::new().hash_definition(&definition);

        info!("Planned import of service {}", target.service_id);

        Ok(MessageAssembler::new().assemble(
            BuildKind::Import,
            target,
            changes,
            workflow,
            &previous,
            hash,
        ))
    }

    /// Previews the changes a request would make.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is invalid or an invariant is
    /// violated.
    pub fn diff(&self, request: &Request, previous: &Previous) -> Result<ChangeSet> {
        let (_, target) = self.target(request, previous)?;
        Ok(DiffEngine::new().compute(previous, &target))
    }

    /// Parses, validates and normalizes a request's definition.
    fn target(&self, request: &Request, previous: &Previous) -> Result<(Definition, TargetState)> {
        let definition = request.parse_definition()?;
        let result = DefinitionValidator::new().validate(&definition)?;
        for warning in &result.warnings {
            warn!("Definition warning: {warning}");
        }

        let identity = request.identity(&definition);
        let target =
            Normalizer::new().normalize(&definition, &identity, &request.datacenter, previous)?;
        Ok((definition, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EnvmapError, InvariantError};
    use crate::model::{Bootstrapping, Datacenter};
    use crate::workflow::Subject;

    const SCENARIO: &str = r"
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

    fn mapper() -> Mapper {
        Mapper::new(Arc::new(TemplateRegistry::builtin().unwrap()))
    }

    fn request(definition: &str) -> Request {
        Request {
            id: String::from("svc-1"),
            previous_id: None,
            client_id: String::from("client-1"),
            client_name: String::from("acme"),
            name: String::from("demo"),
            datacenter: Datacenter {
                name: String::from("dc1"),
                kind: String::from("fake"),
                ..Datacenter::default()
            },
            definition: definition.to_string(),
        }
    }

    fn realized(message: &OutboundMessage) -> Previous {
        Previous::from_message(Some(message)).unwrap()
    }

    #[test]
    fn test_first_creation() {
        let message = mapper().create(&request(SCENARIO), &Previous::Absent).unwrap();

        assert_eq!(message.state.routers.len(), 1);
        assert_eq!(message.state.networks.len(), 1);
        assert_eq!(message.state.instances.len(), 1);
        assert_eq!(message.changes.routers.to_create.len(), 1);
        assert_eq!(message.changes.networks.to_create.len(), 1);
        assert_eq!(message.changes.instances.to_create.len(), 1);
        assert_eq!(
            message.workflow.fragment_names(),
            vec!["initial", "routers_create", "networks_create", "instances_create", "terminal"]
        );
        assert!(message.previous.is_none());
        assert_eq!(message.kind, BuildKind::Create);
    }

    #[test]
    fn test_scale_up() {
        let mapper = mapper();
        let first = mapper.create(&request(SCENARIO), &Previous::Absent).unwrap();
        let previous = realized(&first);

        let message = mapper
            .create(&request(&SCENARIO.replace("count: 1", "count: 2")), &previous)
            .unwrap();

        assert_eq!(message.changes.instances.to_create.len(), 1);
        assert_eq!(message.changes.instances.to_create[0].name, "demo-web-2");
        assert_eq!(message.changes.instances.to_update.len(), 1);
        assert_eq!(message.changes.instances.to_update[0].name, "demo-web-1");
        assert!(message.changes.networks.to_create.is_empty());
        assert_eq!(
            message.workflow.fragment_names(),
            vec!["initial", "instances_create", "instances_update", "terminal"]
        );
        assert!(message.previous.is_some());
    }

    #[test]
    fn test_resubmitting_same_definition_is_noop() {
        let mapper = mapper();
        let first = mapper.create(&request(SCENARIO), &Previous::Absent).unwrap();
        let message = mapper.create(&request(SCENARIO), &realized(&first)).unwrap();

        assert!(!message.changes.has_changes());
        assert_eq!(message.workflow.fragment_names(), vec!["initial", "terminal"]);
    }

    #[test]
    fn test_bootstrapping_mode_is_locked() {
        let mapper = mapper();
        let salted = SCENARIO.replace("name: demo\n", "name: demo\nbootstrapping: salt\n");
        let first = mapper.create(&request(&salted), &Previous::Absent).unwrap();
        assert_eq!(first.bootstrapping, Bootstrapping::Provisioner(String::from("salt")));

        let unsalted = SCENARIO.replace("name: demo\n", "name: demo\nbootstrapping: none\n");
        let err = mapper
            .create(&request(&unsalted), &realized(&first))
            .unwrap_err();
        assert!(matches!(
            err,
            EnvmapError::Invariant(InvariantError::BootstrappingChanged { .. })
        ));
    }

    #[test]
    fn test_delete_tears_everything_down() {
        let mapper = mapper();
        let first = mapper.create(&request(SCENARIO), &Previous::Absent).unwrap();
        let previous = PreviousState::from_message(&first).unwrap();

        let message = mapper.delete(&request(""), previous).unwrap();

        assert_eq!(message.kind, BuildKind::Delete);
        assert_eq!(
            message.workflow.fragment_names(),
            vec![
                "delete_initial",
                "instances_delete",
                "networks_delete",
                "routers_delete",
                "delete_terminal"
            ]
        );
        assert!(
            message.workflow.position(Subject::InstancesDelete)
                < message.workflow.position(Subject::NetworksDelete)
        );
        assert!(message.previous.is_some());
    }

    #[test]
    fn test_import_graph() {
        let message = mapper().import(&request(SCENARIO)).unwrap();
        assert_eq!(message.kind, BuildKind::Import);
        assert_eq!(message.workflow.fragment_names(), vec!["import", "terminal"]);
    }

    #[test]
    fn test_diff_preview() {
        let changes = mapper().diff(&request(SCENARIO), &Previous::Absent).unwrap();
        assert_eq!(changes.counts().creates, 3);
    }

    #[test]
    fn test_invalid_definition_rejected() {
        let err = mapper()
            .create(&request(&SCENARIO.replace("10.1.0.0/24", "bad")), &Previous::Absent)
            .unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_snapshot_does_not_nest() {
        let mapper = mapper();
        let first = mapper.create(&request(SCENARIO), &Previous::Absent).unwrap();
        let second = mapper.create(&request(SCENARIO), &realized(&first)).unwrap();
        let third = mapper.create(&request(SCENARIO), &realized(&second)).unwrap();

        let snapshot: OutboundMessage =
            serde_json::from_str(third.previous.as_deref().unwrap()).unwrap();
        assert_eq!(snapshot.id, second.id);
        assert!(snapshot.previous.is_none());
    }
}
