//! Normalization of definitions into target state.
//!
//! The normalizer resolves every cross reference in a definition, expands
//! instance groups into units, and adds the records bootstrapping needs. It
//! is a pure function of its inputs: the same definition, identity,
//! datacenter and baseline always produce the same target state.

pub mod bootstrap;
mod resolve;

pub use resolve::{allocate, forward_destination, KnownNetwork, References};

use std::net::Ipv4Addr;
use std::str::FromStr;
use tracing::{debug, info};

use crate::definition::{Definition, RouterDefinition};
use crate::error::{DefinitionError, InvariantError, Result};
use crate::model::{
    Bootstrapping, Datacenter, Execution, ExecutionPurpose, Firewall, FirewallRule, Instance,
    Nat, NatKind, NatRule, Network, Previous, Router, ServiceIdentity, TargetState,
};

/// Placeholder used for the public side of NAT rules until a service IP is
/// assigned.
const UNASSIGNED_PUBLIC_IP: &str = "external";

/// Turns definitions into normalized target state.
#[derive(Debug, Default)]
pub struct Normalizer;

impl Normalizer {
    /// Creates a new normalizer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Normalizes a definition.
    ///
    /// # Errors
    ///
    /// Returns a definition error for unresolvable references or addresses
    /// outside their subnet, and an invariant error when the bootstrapping
    /// mode is inconsistent with the baseline or the definition.
    pub fn normalize(
        &self,
        definition: &Definition,
        identity: &ServiceIdentity,
        datacenter: &Datacenter,
        previous: &Previous,
    ) -> Result<TargetState> {
        let bootstrapping = definition.bootstrapping.clone();
        Self::check_bootstrapping(definition, previous)?;

        let mut state = TargetState::empty(identity, datacenter.clone(), bootstrapping.clone());
        let service = identity.service_name.as_str();

        state.service_ip = previous
            .state()
            .and_then(|s| s.service_ip.clone())
            .or_else(|| definition.service_ip.clone());

        state.routers = definition
            .routers
            .iter()
            .map(|r| Router::new(&r.name, state.service_ip.clone()))
            .collect();

        let mut refs = References::new(&definition.loadbalancers);
        for (router, network) in definition.networks() {
            let qualified = qualify(service, &network.name);
            refs.add_network(&network.name, qualified.clone(), &network.subnet)?;
            state.networks.push(Network {
                name: qualified,
                router: router.name.clone(),
                subnet: network.subnet.clone(),
                dns: network.dns.clone(),
            });
        }

        for group in &definition.instances {
            let network = refs.network(&group.networks.name)?;
            let start = Ipv4Addr::from_str(&group.networks.start).map_err(|e| {
                DefinitionError::validation(
                    format!("Invalid start address '{}': {e}", group.networks.start),
                    format!("instances.{}.networks.start", group.name),
                )
            })?;

            for n in 0..group.count {
                let name = format!("{service}-{}-{}", group.name, n + 1);
                let ip = allocate(&name, start, n, network.subnet)?;
                state.instances.push(Instance {
                    name,
                    group: group.name.clone(),
                    network: network.qualified.clone(),
                    ip: ip.to_string(),
                    image: group.image.clone(),
                    count: group.count,
                    cpus: group.cpus,
                    memory: group.memory.clone(),
                    disks: group.disks.clone(),
                });
            }
        }

        if let Bootstrapping::Provisioner(provisioner) = &bootstrapping {
            Self::add_management(&mut state, definition, provisioner)?;
        }

        let public_ip = state
            .service_ip
            .clone()
            .unwrap_or_else(|| UNASSIGNED_PUBLIC_IP.to_string());

        for (index, router) in definition.routers.iter().enumerate() {
            let managed = index == 0 && bootstrapping.is_enabled();

            let mut rules = router
                .rules
                .iter()
                .map(|rule| {
                    Ok(FirewallRule {
                        name: rule.name.clone(),
                        source: refs.endpoint(&rule.source)?,
                        destination: refs.endpoint(&rule.destination)?,
                        from_port: rule.from_port.clone(),
                        to_port: rule.to_port.clone(),
                        protocol: rule.protocol.clone(),
                        action: rule.action.clone(),
                    })
                })
                .collect::<std::result::Result<Vec<_>, DefinitionError>>()?;
            if managed {
                let own_networks: Vec<Network> = state
                    .networks
                    .iter()
                    .filter(|n| n.router == router.name && n.subnet != bootstrap::MANAGEMENT_SUBNET)
                    .cloned()
                    .collect();
                rules.extend(bootstrap::management_rules(
                    &state.datacenter,
                    &public_ip,
                    &own_networks,
                ));
            }
            if !rules.is_empty() {
                state.firewalls.push(Firewall {
                    name: router.name.clone(),
                    rules,
                });
            }

            if let Some(nat) = Self::router_nat(&state, router, &public_ip, managed)? {
                state.nats.push(nat);
            }
        }

        if let Bootstrapping::Provisioner(provisioner) = &bootstrapping {
            Self::add_jobs(&mut state, definition, provisioner);
        }

        state.check_invariants()?;

        info!(
            "Normalized service '{}': {} routers, {} networks, {} instances",
            state.service_name,
            state.routers.len(),
            state.networks.len(),
            state.instances.len()
        );
        Ok(state)
    }

    /// Checks the bootstrapping mode against the baseline and the
    /// definition's provisioning steps.
    fn check_bootstrapping(
        definition: &Definition,
        previous: &Previous,
    ) -> std::result::Result<(), InvariantError> {
        if let Previous::Present(previous) = previous {
            previous.check_bootstrapping(&definition.bootstrapping)?;
        }

        if !definition.bootstrapping.is_enabled() {
            let count = definition.provisioned_groups();
            if count > 0 {
                return Err(InvariantError::ExecutionsWithoutBootstrapping { count });
            }
        }
        Ok(())
    }

    /// Adds the management network and master instance.
    fn add_management(
        state: &mut TargetState,
        definition: &Definition,
        provisioner: &str,
    ) -> std::result::Result<(), InvariantError> {
        let first_router = definition.routers.first().ok_or_else(|| {
            InvariantError::BootstrappingWithoutRouter {
                provisioner: provisioner.to_string(),
            }
        })?;
        let service = state.service_name.clone();

        debug!(
            "Adding management records for provisioner '{}' on router '{}'",
            provisioner, first_router.name
        );

        state.networks.push(bootstrap::management_network(
            &service,
            provisioner,
            &first_router.name,
        ));
        state.instances.push(bootstrap::master_instance(
            &service,
            provisioner,
            &state.datacenter,
        ));
        state.management_ip = Some(bootstrap::MANAGEMENT_IP.to_string());
        Ok(())
    }

    /// Builds the NAT rule set of a router, if it needs one.
    fn router_nat(
        state: &TargetState,
        router: &RouterDefinition,
        public_ip: &str,
        managed: bool,
    ) -> Result<Option<Nat>> {
        let mut rules = router
            .port_forwarding
            .iter()
            .map(|forward| {
                Ok(NatRule {
                    kind: NatKind::Dnat,
                    origin_ip: public_ip.to_string(),
                    origin_port: forward.from_port.clone(),
                    translation_ip: forward_destination(&forward.destination, &state.instances)?,
                    translation_port: forward.to_port.clone(),
                    protocol: forward.protocol.clone(),
                })
            })
            .collect::<std::result::Result<Vec<_>, DefinitionError>>()?;

        if managed {
            rules.push(bootstrap::management_forward(public_ip));
        }
        if rules.is_empty() {
            return Ok(None);
        }

        rules.extend(
            state
                .networks
                .iter()
                .filter(|n| n.router == router.name)
                .map(|n| NatRule {
                    kind: NatKind::Snat,
                    origin_ip: n.subnet.clone(),
                    origin_port: String::from("any"),
                    translation_ip: public_ip.to_string(),
                    translation_port: String::from("any"),
                    protocol: String::from("any"),
                }),
        );

        Ok(Some(Nat {
            name: router.name.clone(),
            rules,
        }))
    }

    /// Adds bootstrap jobs for every unit and one execution per provisioned
    /// group.
    fn add_jobs(state: &mut TargetState, definition: &Definition, provisioner: &str) {
        let master = bootstrap::master_name(&state.service_name, provisioner);

        state.bootstraps = state
            .instances
            .iter()
            .filter(|unit| unit.name != master)
            .map(|unit| bootstrap::bootstrap_job(provisioner, &master, unit))
            .collect();

        state.executions = definition
            .instances
            .iter()
            .filter_map(|group| {
                let payload = group.commands();
                if payload.is_empty() {
                    return None;
                }
                let target = state
                    .instances
                    .iter()
                    .filter(|unit| unit.group == group.name && unit.name != master)
                    .map(|unit| unit.name.clone())
                    .collect();
                Some(Execution {
                    name: format!("exec-{}", group.name),
                    provisioner: provisioner.to_string(),
                    purpose: ExecutionPurpose::Provision,
                    target,
                    payload,
                })
            })
            .collect();
    }
}

/// Qualifies a definition-local name with the service name.
#[must_use]
pub fn qualify(service: &str, name: &str) -> String {
    format!("{service}-{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::DefinitionParser;
    use crate::error::EnvmapError;
    use crate::model::PreviousState;
    use crate::workflow::WorkflowGraph;

    const BASIC: &str = r#"
name: demo
service_ip: 172.16.186.44
routers:
  - name: gw
    rules:
      - name: web-in
        source: any
        destination: web
        from_port: "80"
        to_port: "80"
        protocol: tcp
    networks:
      - name: web
        subnet: 10.1.0.0/24
    port_forwarding:
      - from_port: "2222"
        to_port: "22"
        destination: demo-web-1
instances:
  - name: web
    image: ubuntu-1404
    count: 2
    memory: 1GB
    networks:
      name: web
      start: 10.1.0.11
"#;

    fn identity() -> ServiceIdentity {
        ServiceIdentity {
            service_id: String::from("svc-1"),
            client_id: String::from("client-1"),
            client_name: String::from("acme"),
            service_name: String::from("demo"),
        }
    }

    fn normalize(yaml: &str, previous: &Previous) -> Result<TargetState> {
        let definition = DefinitionParser::new().parse(yaml, None).unwrap();
        Normalizer::new().normalize(&definition, &identity(), &Datacenter::default(), previous)
    }

    fn present(state: TargetState) -> Previous {
        Previous::Present(Box::new(PreviousState {
            state,
            workflow: WorkflowGraph::default(),
            endpoint: None,
            snapshot: String::new(),
        }))
    }

    #[test]
    fn test_units_expanded_with_sequential_ips() {
        let state = normalize(BASIC, &Previous::Absent).unwrap();
        let names: Vec<_> = state.instances.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["demo-web-1", "demo-web-2"]);
        assert_eq!(state.instances[1].ip, "10.1.0.12");
        assert_eq!(state.instances[1].network, "demo-web");
        assert!(state.instances.iter().all(|i| i.count == 2));
    }

    #[test]
    fn test_rules_and_forwards_resolved() {
        let state = normalize(BASIC, &Previous::Absent).unwrap();
        assert_eq!(state.firewalls.len(), 1);
        assert_eq!(state.firewalls[0].rules[0].destination, "10.1.0.0/24");

        let nat = &state.nats[0];
        assert_eq!(nat.rules[0].kind, NatKind::Dnat);
        assert_eq!(nat.rules[0].translation_ip, "10.1.0.11");
        assert_eq!(nat.rules[0].origin_ip, "172.16.186.44");
        assert_eq!(nat.rules[1].kind, NatKind::Snat);
        assert_eq!(nat.rules[1].origin_ip, "10.1.0.0/24");
    }

    #[test]
    fn test_router_without_rules_has_no_firewall() {
        let yaml = r"
name: demo
routers:
  - name: gw
    networks:
      - name: web
        subnet: 10.1.0.0/24
";
        let state = normalize(yaml, &Previous::Absent).unwrap();
        assert!(state.firewalls.is_empty());
        assert!(state.nats.is_empty());
        assert_eq!(state.routers[0].status, crate::model::RouterStatus::Pending);
    }

    #[test]
    fn test_service_ip_is_sticky() {
        let first = normalize(BASIC, &Previous::Absent).unwrap();
        let changed = BASIC.replace("172.16.186.44", "172.16.186.99");
        let second = normalize(&changed, &present(first)).unwrap();
        assert_eq!(second.service_ip.as_deref(), Some("172.16.186.44"));
        assert_eq!(second.routers[0].status, crate::model::RouterStatus::Completed);
    }

    #[test]
    fn test_unknown_network_reference_fails() {
        let yaml = BASIC.replace("name: web\n      start", "name: db\n      start");
        let err = normalize(&yaml, &Previous::Absent).unwrap_err();
        assert!(matches!(
            err,
            EnvmapError::Definition(DefinitionError::UnknownReference { .. })
        ));
    }

    #[test]
    fn test_unit_outside_subnet_fails() {
        let yaml = BASIC.replace("start: 10.1.0.11", "start: 10.1.0.255");
        let err = normalize(&yaml, &Previous::Absent).unwrap_err();
        assert!(matches!(
            err,
            EnvmapError::Definition(DefinitionError::AddressOutOfRange { .. })
        ));
    }

    #[test]
    fn test_bootstrapping_adds_management_records() {
        let yaml = BASIC.replace("name: demo\n", "name: demo\nbootstrapping: salt\n");
        let state = normalize(&yaml, &Previous::Absent).unwrap();

        assert_eq!(state.management_ip.as_deref(), Some(bootstrap::MANAGEMENT_IP));
        assert!(state.networks.iter().any(|n| n.name == "demo-salt"));
        assert!(state.instance("demo-salt-master").is_some());
        assert_eq!(state.bootstraps.len(), 2);
        assert!(state.executions.is_empty());

        let nat = &state.nats[0];
        assert!(nat
            .rules
            .iter()
            .any(|r| r.kind == NatKind::Dnat && r.translation_ip == bootstrap::MANAGEMENT_IP));
    }

    #[test]
    fn test_provisioner_commands_become_executions() {
        let yaml = BASIC.replace("name: demo\n", "name: demo\nbootstrapping: salt\n")
            + "    provisioner:\n      - exec:\n          - date\n";
        let state = normalize(&yaml, &Previous::Absent).unwrap();
        assert_eq!(state.executions.len(), 1);
        assert_eq!(state.executions[0].name, "exec-web");
        assert_eq!(state.executions[0].target, vec!["demo-web-1", "demo-web-2"]);
    }

    #[test]
    fn test_commands_without_bootstrapping_fail() {
        let yaml = BASIC.to_string() + "    provisioner:\n      - exec:\n          - date\n";
        let err = normalize(&yaml, &Previous::Absent).unwrap_err();
        assert!(matches!(
            err,
            EnvmapError::Invariant(InvariantError::ExecutionsWithoutBootstrapping { count: 1 })
        ));
    }

    #[test]
    fn test_bootstrapping_change_rejected() {
        let first = normalize(BASIC, &Previous::Absent).unwrap();
        let yaml = BASIC.replace("name: demo\n", "name: demo\nbootstrapping: salt\n");
        let err = normalize(&yaml, &present(first)).unwrap_err();
        assert!(matches!(
            err,
            EnvmapError::Invariant(InvariantError::BootstrappingChanged { .. })
        ));
    }

    #[test]
    fn test_bootstrapping_without_router_fails() {
        let err = normalize("name: demo\nbootstrapping: salt\n", &Previous::Absent).unwrap_err();
        assert!(matches!(
            err,
            EnvmapError::Invariant(InvariantError::BootstrappingWithoutRouter { .. })
        ));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        assert_eq!(
            normalize(BASIC, &Previous::Absent).unwrap(),
            normalize(BASIC, &Previous::Absent).unwrap()
        );
    }
}
