//! Records added to an environment when bootstrapping is enabled.
//!
//! A bootstrapped environment gets a management network with a master
//! instance on it, firewall and NAT entries that let the orchestration fleet
//! reach the master, and one enrolment job per instance unit.

use crate::model::{
    Datacenter, Execution, ExecutionPurpose, FirewallRule, Instance, NatKind, NatRule, Network,
};

/// Subnet of the management network.
pub const MANAGEMENT_SUBNET: &str = "10.254.254.0/24";

/// Address of the bootstrapping master inside the management network.
pub const MANAGEMENT_IP: &str = "10.254.254.100";

/// Prefix of firewall rule names managed by bootstrapping.
pub const MANAGEMENT_RULE_PREFIX: &str = "mgmt-";

/// Port the master's API listens on.
const MASTER_API_PORT: &str = "8000";

/// Name of the management network for a service.
#[must_use]
pub fn management_network_name(service: &str, provisioner: &str) -> String {
    format!("{service}-{provisioner}")
}

/// Name of the bootstrapping master unit for a service.
#[must_use]
pub fn master_name(service: &str, provisioner: &str) -> String {
    format!("{service}-{provisioner}-master")
}

/// Builds the management network on the given router.
#[must_use]
pub fn management_network(service: &str, provisioner: &str, router: &str) -> Network {
    Network {
        name: management_network_name(service, provisioner),
        router: router.to_string(),
        subnet: MANAGEMENT_SUBNET.to_string(),
        dns: Vec::new(),
    }
}

/// Builds the master instance.
#[must_use]
pub fn master_instance(service: &str, provisioner: &str, datacenter: &Datacenter) -> Instance {
    let image = datacenter
        .bootstrap_image
        .clone()
        .unwrap_or_else(|| format!("{provisioner}-master"));

    Instance {
        name: master_name(service, provisioner),
        group: format!("{provisioner}-master"),
        network: management_network_name(service, provisioner),
        ip: MANAGEMENT_IP.to_string(),
        image,
        count: 1,
        cpus: 1,
        memory: String::from("2GB"),
        disks: Vec::new(),
    }
}

/// Builds the firewall rules that open the master to the fleet and to the
/// environment's own networks.
#[must_use]
pub fn management_rules(
    datacenter: &Datacenter,
    service_ip: &str,
    networks: &[Network],
) -> Vec<FirewallRule> {
    let mut rules = Vec::new();

    for (i, cidr) in datacenter.management_cidrs.iter().enumerate() {
        for (label, port) in [("ssh", "22"), ("api", MASTER_API_PORT)] {
            rules.push(FirewallRule {
                name: format!("{MANAGEMENT_RULE_PREFIX}{label}-{i}"),
                source: cidr.clone(),
                destination: service_ip.to_string(),
                from_port: port.to_string(),
                to_port: port.to_string(),
                protocol: String::from("tcp"),
                action: String::from("allow"),
            });
        }
    }

    for network in networks {
        rules.push(FirewallRule {
            name: format!("{MANAGEMENT_RULE_PREFIX}minion-{}", network.name),
            source: network.subnet.clone(),
            destination: MANAGEMENT_IP.to_string(),
            from_port: String::from("4505"),
            to_port: String::from("4506"),
            protocol: String::from("tcp"),
            action: String::from("allow"),
        });
    }

    rules
}

/// Builds the port forward to the master's API.
#[must_use]
pub fn management_forward(service_ip: &str) -> NatRule {
    NatRule {
        kind: NatKind::Dnat,
        origin_ip: service_ip.to_string(),
        origin_port: MASTER_API_PORT.to_string(),
        translation_ip: MANAGEMENT_IP.to_string(),
        translation_port: MASTER_API_PORT.to_string(),
        protocol: String::from("tcp"),
    }
}

/// Name of the enrolment job for a unit.
#[must_use]
pub fn bootstrap_job_name(unit: &str) -> String {
    format!("bootstrap-{unit}")
}

/// Builds the enrolment job for one unit.
#[must_use]
pub fn bootstrap_job(provisioner: &str, master: &str, unit: &Instance) -> Execution {
    Execution {
        name: bootstrap_job_name(&unit.name),
        provisioner: provisioner.to_string(),
        purpose: ExecutionPurpose::Bootstrap,
        target: vec![master.to_string()],
        payload: vec![format!("{provisioner}-key --accept {} {}", unit.name, unit.ip)],
    }
}

/// Builds the job that removes a decommissioned unit from the master.
#[must_use]
pub fn cleanup_job(provisioner: &str, master: &str, unit: &str) -> Execution {
    Execution {
        name: format!("cleanup-{unit}"),
        provisioner: provisioner.to_string(),
        purpose: ExecutionPurpose::Cleanup,
        target: vec![master.to_string()],
        payload: vec![format!("{provisioner}-key --delete {unit}")],
    }
}
