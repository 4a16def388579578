//! Target state records.
//!
//! These types are the canonical, normalized form of an environment: one
//! ordered collection per resource kind plus the identity and derived
//! addresses shared by all of them.

use serde::{Deserialize, Serialize};

/// Provisioning mechanism of an environment. Immutable once set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Bootstrapping {
    /// No provisioner: executions and bootstrap jobs are forbidden.
    #[default]
    None,
    /// A named provisioner such as `salt`.
    Provisioner(String),
}

/// Datacenter metadata supplied alongside a request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Datacenter {
    /// Datacenter name.
    pub name: String,
    /// Provider type (e.g. "vcloud", "aws", "fake").
    #[serde(default, rename = "type")]
    pub kind: String,
    /// External network routers are attached to.
    #[serde(default)]
    pub external_network: String,
    /// CIDRs the orchestration fleet manages environments from.
    #[serde(default)]
    pub management_cidrs: Vec<String>,
    /// Image used for the bootstrapping master, if the provider needs one.
    #[serde(default)]
    pub bootstrap_image: Option<String>,
}

/// Completion status of a router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterStatus {
    /// No public address assigned yet.
    #[default]
    Pending,
    /// A public address has been assigned.
    Completed,
}

/// A router (edge gateway).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    /// Router name.
    pub name: String,
    /// Public, service-facing address.
    #[serde(default)]
    pub ip: Option<String>,
    /// Completion status.
    #[serde(default)]
    pub status: RouterStatus,
}

/// A routed network behind a router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Qualified network name (`<service>-<network>`).
    pub name: String,
    /// Router the network hangs off.
    pub router: String,
    /// Subnet in CIDR notation.
    pub subnet: String,
    /// DNS servers handed out on the network.
    #[serde(default)]
    pub dns: Vec<String>,
}

/// A single instance unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Unit name (`<service>-<group>-<n>`).
    pub name: String,
    /// Logical group the unit was expanded from.
    pub group: String,
    /// Qualified network name.
    pub network: String,
    /// Address inside the network.
    pub ip: String,
    /// Image to boot.
    pub image: String,
    /// Number of units in the group.
    pub count: u32,
    /// Virtual CPUs.
    pub cpus: u32,
    /// Memory size (e.g. "1GB").
    pub memory: String,
    /// Extra disks.
    #[serde(default)]
    pub disks: Vec<String>,
}

/// One firewall rule with resolved endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    /// Rule name.
    pub name: String,
    /// Resolved source (CIDR, address or keyword).
    pub source: String,
    /// Resolved destination (CIDR, address or keyword).
    pub destination: String,
    /// First port, or "any".
    pub from_port: String,
    /// Last port, or "any".
    pub to_port: String,
    /// Protocol ("tcp", "udp", "any", ...).
    pub protocol: String,
    /// "allow" or "deny".
    pub action: String,
}

/// The rule set of one router, applied as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Firewall {
    /// Router name.
    pub name: String,
    /// Ordered rules.
    pub rules: Vec<FirewallRule>,
}

/// Direction of a NAT rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NatKind {
    /// Destination NAT (port forward).
    Dnat,
    /// Source NAT (outbound).
    Snat,
}

/// One NAT rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatRule {
    /// Rule direction.
    #[serde(rename = "type")]
    pub kind: NatKind,
    /// Address or subnet before translation.
    pub origin_ip: String,
    /// Port before translation, or "any".
    pub origin_port: String,
    /// Address after translation.
    pub translation_ip: String,
    /// Port after translation, or "any".
    pub translation_port: String,
    /// Protocol.
    pub protocol: String,
}

/// The NAT rule set of one router, applied as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nat {
    /// Router name.
    pub name: String,
    /// Ordered rules.
    pub rules: Vec<NatRule>,
}

/// What an execution is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPurpose {
    /// User-defined provisioning commands for an instance group.
    Provision,
    /// Enrolment of a unit with the bootstrapping master.
    Bootstrap,
    /// Removal of a decommissioned unit from the master.
    Cleanup,
}

/// A provisioning job run by the execution fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Execution name.
    pub name: String,
    /// Provisioner that runs it.
    pub provisioner: String,
    /// What the execution is for.
    pub purpose: ExecutionPurpose,
    /// Instance units the payload runs on.
    pub target: Vec<String>,
    /// Commands to run.
    pub payload: Vec<String>,
}

impl Bootstrapping {
    /// Returns the provisioner name, or `None` when bootstrapping is disabled.
    #[must_use]
    pub fn provisioner(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Provisioner(name) => Some(name),
        }
    }

    /// Returns true if bootstrapping is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        matches!(self, Self::Provisioner(_))
    }
}

impl From<String> for Bootstrapping {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            Self::None
        } else {
            Self::Provisioner(trimmed.to_string())
        }
    }
}

impl From<Bootstrapping> for String {
    fn from(value: Bootstrapping) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for Bootstrapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Provisioner(name) => write!(f, "{name}"),
        }
    }
}

impl std::fmt::Display for ExecutionPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Provision => "provision",
            Self::Bootstrap => "bootstrap",
            Self::Cleanup => "cleanup",
        };
        write!(f, "{s}")
    }
}

impl Router {
    /// Creates a router whose status follows the presence of a public address.
    #[must_use]
    pub fn new(name: &str, ip: Option<String>) -> Self {
        let status = if ip.is_some() {
            RouterStatus::Completed
        } else {
            RouterStatus::Pending
        };
        Self {
            name: name.to_string(),
            ip,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrapping_from_string() {
        assert_eq!(Bootstrapping::from(String::from("none")), Bootstrapping::None);
        assert_eq!(Bootstrapping::from(String::from("NONE")), Bootstrapping::None);
        assert_eq!(Bootstrapping::from(String::new()), Bootstrapping::None);
        assert_eq!(
            Bootstrapping::from(String::from("salt")),
            Bootstrapping::Provisioner(String::from("salt"))
        );
    }

    #[test]
    fn test_bootstrapping_serde_is_plain_string() {
        let json = serde_json::to_string(&Bootstrapping::Provisioner(String::from("salt"))).unwrap();
        assert_eq!(json, "\"salt\"");
        let parsed: Bootstrapping = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(parsed, Bootstrapping::None);
    }

    #[test]
    fn test_router_status_follows_ip() {
        assert_eq!(Router::new("gw", None).status, RouterStatus::Pending);
        assert_eq!(
            Router::new("gw", Some(String::from("172.16.0.10"))).status,
            RouterStatus::Completed
        );
    }
}
