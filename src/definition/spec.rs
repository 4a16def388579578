//! Desired-state definition types.
//!
//! These structs map one-to-one to the YAML (or JSON) definition a client
//! submits. They describe what the environment should look like; the
//! normalizer turns them into target-state records.

use serde::{Deserialize, Deserializer, Serialize};

use crate::model::Bootstrapping;

/// The root of a desired-state definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Definition {
    /// Service name.
    pub name: String,
    /// Datacenter name the service is deployed to.
    #[serde(default)]
    pub datacenter: Option<String>,
    /// Provisioning mechanism (`none` or a provisioner name).
    #[serde(default)]
    pub bootstrapping: Bootstrapping,
    /// Public address to use on first creation.
    #[serde(default)]
    pub service_ip: Option<String>,
    /// Routers and the networks behind them.
    #[serde(default)]
    pub routers: Vec<RouterDefinition>,
    /// Instance groups.
    #[serde(default)]
    pub instances: Vec<InstanceDefinition>,
    /// Load balancers whose virtual IPs rules may reference.
    #[serde(default)]
    pub loadbalancers: Vec<LoadBalancerDefinition>,
}

/// A router definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouterDefinition {
    /// Router name.
    pub name: String,
    /// Firewall rules.
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
    /// Networks routed by this router.
    #[serde(default)]
    pub networks: Vec<NetworkDefinition>,
    /// Inbound port forwards.
    #[serde(default)]
    pub port_forwarding: Vec<PortForwardDefinition>,
}

/// A firewall rule definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleDefinition {
    /// Rule name.
    pub name: String,
    /// Source: keyword, network name, load balancer name, address or CIDR.
    pub source: String,
    /// Destination: same forms as `source`.
    pub destination: String,
    /// First port.
    #[serde(default = "default_any", deserialize_with = "port")]
    pub from_port: String,
    /// Last port.
    #[serde(default = "default_any", deserialize_with = "port")]
    pub to_port: String,
    /// Protocol.
    #[serde(default = "default_any")]
    pub protocol: String,
    /// "allow" or "deny".
    #[serde(default = "default_action")]
    pub action: String,
}

/// A network definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkDefinition {
    /// Network name, unique within the definition.
    pub name: String,
    /// Subnet in CIDR notation.
    pub subnet: String,
    /// DNS servers.
    #[serde(default)]
    pub dns: Vec<String>,
}

/// A port forward definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortForwardDefinition {
    /// Public port.
    #[serde(deserialize_with = "port")]
    pub from_port: String,
    /// Port on the destination.
    #[serde(deserialize_with = "port")]
    pub to_port: String,
    /// Destination instance unit name or address.
    pub destination: String,
    /// Protocol.
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

/// An instance group definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceDefinition {
    /// Group name.
    pub name: String,
    /// Image to boot.
    pub image: String,
    /// Number of units.
    #[serde(default = "default_count")]
    pub count: u32,
    /// Virtual CPUs per unit.
    #[serde(default = "default_cpus")]
    pub cpus: u32,
    /// Memory per unit.
    pub memory: String,
    /// Extra disks per unit.
    #[serde(default)]
    pub disks: Vec<String>,
    /// Network attachment.
    pub networks: InstanceNetworkDefinition,
    /// Provisioning steps run on every unit.
    #[serde(default)]
    pub provisioner: Vec<ProvisionerStep>,
}

/// Where an instance group is attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceNetworkDefinition {
    /// Network name.
    pub name: String,
    /// First address; units are allocated sequentially from it.
    pub start: String,
}

/// One provisioning step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisionerStep {
    /// Shell commands.
    #[serde(default)]
    pub exec: Vec<String>,
}

/// A load balancer reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadBalancerDefinition {
    /// Load balancer name.
    pub name: String,
    /// Virtual IP.
    pub vip: String,
}

// Default value functions

const fn default_count() -> u32 {
    1
}

const fn default_cpus() -> u32 {
    1
}

fn default_any() -> String {
    String::from("any")
}

fn default_action() -> String {
    String::from("allow")
}

fn default_protocol() -> String {
    String::from("tcp")
}

/// Accepts ports written either as numbers or as strings.
fn port<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u64),
        Text(String),
    }

    Ok(match Port::deserialize(deserializer)? {
        Port::Number(n) => n.to_string(),
        Port::Text(s) => s,
    })
}

impl Definition {
    /// Returns the total number of instance units requested.
    #[must_use]
    pub fn total_units(&self) -> u32 {
        self.instances.iter().map(|i| i.count).sum()
    }

    /// Iterates over every network with the router it belongs to.
    pub fn networks(&self) -> impl Iterator<Item = (&RouterDefinition, &NetworkDefinition)> {
        self.routers
            .iter()
            .flat_map(|r| r.networks.iter().map(move |n| (r, n)))
    }

    /// Returns the number of instance groups that define provisioning steps.
    #[must_use]
    pub fn provisioned_groups(&self) -> usize {
        self.instances
            .iter()
            .filter(|i| i.provisioner.iter().any(|s| !s.exec.is_empty()))
            .count()
    }
}

impl InstanceDefinition {
    /// Returns every provisioning command in order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.provisioner
            .iter()
            .flat_map(|s| s.exec.iter().cloned())
            .collect()
    }
}
