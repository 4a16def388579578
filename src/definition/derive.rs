//! Rebuilding definitions from realized state.
//!
//! When an environment is imported, the realized records are the only
//! source of truth. This module folds them back into a definition a client
//! can edit and resubmit.

use indexmap::IndexMap;

use crate::model::{ExecutionPurpose, Instance, NatKind, TargetState};
use crate::normalizer::bootstrap::{MANAGEMENT_RULE_PREFIX, management_network_name};

use super::spec::{
    Definition, InstanceDefinition, InstanceNetworkDefinition, NetworkDefinition,
    PortForwardDefinition, ProvisionerStep, RouterDefinition, RuleDefinition,
};

/// Derives a definition from a realized target state.
///
/// Records managed by bootstrapping are left out, qualified names are
/// stripped back to their short form, and instance units are grouped again.
#[must_use]
pub fn derive_definition(state: &TargetState) -> Definition {
    let service = state.service_name.as_str();
    let management_network = state
        .bootstrapping
        .provisioner()
        .map(|p| management_network_name(service, p));

    let routers = state
        .routers
        .iter()
        .map(|router| RouterDefinition {
            name: router.name.clone(),
            rules: state
                .firewalls
                .iter()
                .filter(|f| f.name == router.name)
                .flat_map(|f| f.rules.iter())
                .filter(|r| !r.name.starts_with(MANAGEMENT_RULE_PREFIX))
                .map(|r| RuleDefinition {
                    name: r.name.clone(),
                    source: r.source.clone(),
                    destination: r.destination.clone(),
                    from_port: r.from_port.clone(),
                    to_port: r.to_port.clone(),
                    protocol: r.protocol.clone(),
                    action: r.action.clone(),
                })
                .collect(),
            networks: state
                .networks
                .iter()
                .filter(|n| n.router == router.name)
                .filter(|n| management_network.as_deref() != Some(n.name.as_str()))
                .map(|n| NetworkDefinition {
                    name: unqualify(service, &n.name),
                    subnet: n.subnet.clone(),
                    dns: n.dns.clone(),
                })
                .collect(),
            port_forwarding: state
                .nats
                .iter()
                .filter(|nat| nat.name == router.name)
                .flat_map(|nat| nat.rules.iter())
                .filter(|r| r.kind == NatKind::Dnat)
                .filter(|r| state.management_ip.as_deref() != Some(r.translation_ip.as_str()))
                .map(|r| PortForwardDefinition {
                    from_port: r.origin_port.clone(),
                    to_port: r.translation_port.clone(),
                    destination: unit_at(state, &r.translation_ip),
                    protocol: r.protocol.clone(),
                })
                .collect(),
        })
        .collect();

    let mut groups: IndexMap<&str, Vec<&Instance>> = IndexMap::new();
    for unit in &state.instances {
        if state.management_ip.as_deref() == Some(unit.ip.as_str()) {
            continue;
        }
        groups.entry(unit.group.as_str()).or_default().push(unit);
    }

    let instances = groups
        .into_iter()
        .filter_map(|(group, units)| {
            let first = units.first()?;
            let commands: Vec<String> = state
                .executions
                .iter()
                .filter(|e| e.purpose == ExecutionPurpose::Provision)
                .filter(|e| e.name == format!("exec-{group}"))
                .flat_map(|e| e.payload.iter().cloned())
                .collect();
            let provisioner = if commands.is_empty() {
                Vec::new()
            } else {
                vec![ProvisionerStep { exec: commands }]
            };

            Some(InstanceDefinition {
                name: group.to_string(),
                image: first.image.clone(),
                count: u32::try_from(units.len()).unwrap_or(u32::MAX),
                cpus: first.cpus,
                memory: first.memory.clone(),
                disks: first.disks.clone(),
                networks: InstanceNetworkDefinition {
                    name: unqualify(service, &first.network),
                    start: first.ip.clone(),
                },
                provisioner,
            })
        })
        .collect();

    Definition {
        name: state.service_name.clone(),
        datacenter: Some(state.datacenter.name.clone()).filter(|n| !n.is_empty()),
        bootstrapping: state.bootstrapping.clone(),
        service_ip: state.service_ip.clone(),
        routers,
        instances,
        loadbalancers: Vec::new(),
    }
}

/// Strips the service prefix from a qualified name.
fn unqualify(service: &str, name: &str) -> String {
    name.strip_prefix(service)
        .and_then(|rest| rest.strip_prefix('-'))
        .unwrap_or(name)
        .to_string()
}

/// Names the unit holding an address, or returns the address itself.
fn unit_at(state: &TargetState, ip: &str) -> String {
    state
        .instances
        .iter()
        .find(|i| i.ip == ip)
        .map_or_else(|| ip.to_string(), |i| i.name.clone())
}
