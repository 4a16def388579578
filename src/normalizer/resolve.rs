//! Cross-reference resolution and address allocation.

use indexmap::IndexMap;
use ipnetwork::{IpNetwork, Ipv4Network};
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::definition::LoadBalancerDefinition;
use crate::error::DefinitionError;
use crate::model::Instance;

/// Rule endpoints that pass through unchanged.
const ENDPOINT_KEYWORDS: &[&str] = &["any", "internal", "external"];

/// A network known to the normalizer, keyed by its short name.
#[derive(Debug, Clone)]
pub struct KnownNetwork {
    /// Qualified name.
    pub qualified: String,
    /// Parsed subnet.
    pub subnet: Ipv4Network,
}

/// Lookup tables used while resolving references.
#[derive(Debug, Default)]
pub struct References<'a> {
    /// Networks by short name, in definition order.
    pub networks: IndexMap<String, KnownNetwork>,
    /// Load balancers declared in the definition.
    pub loadbalancers: &'a [LoadBalancerDefinition],
}

impl<'a> References<'a> {
    /// Creates an empty lookup table over the given load balancers.
    #[must_use]
    pub fn new(loadbalancers: &'a [LoadBalancerDefinition]) -> Self {
        Self {
            networks: IndexMap::new(),
            loadbalancers,
        }
    }

    /// Registers a network.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or the subnet does not parse.
    pub fn add_network(
        &mut self,
        name: &str,
        qualified: String,
        subnet: &str,
    ) -> Result<(), DefinitionError> {
        if self.networks.contains_key(name) {
            return Err(DefinitionError::DuplicateName {
                resource_type: String::from("network"),
                name: name.to_string(),
            });
        }
        let subnet = Ipv4Network::from_str(subnet).map_err(|e| {
            DefinitionError::validation(format!("Invalid subnet '{subnet}': {e}"), name)
        })?;
        self.networks
            .insert(name.to_string(), KnownNetwork { qualified, subnet });
        Ok(())
    }

    /// Looks up a network by short name.
    ///
    /// # Errors
    ///
    /// Returns an unknown-reference error if no such network exists.
    pub fn network(&self, name: &str) -> Result<&KnownNetwork, DefinitionError> {
        self.networks
            .get(name)
            .ok_or_else(|| DefinitionError::unknown("network", name))
    }

    /// Resolves a firewall rule endpoint.
    ///
    /// Keywords pass through, network names become their subnet, load
    /// balancer names become their VIP, and literal addresses or CIDRs are
    /// kept as written.
    ///
    /// # Errors
    ///
    /// Returns an unknown-reference error for anything else.
    pub fn endpoint(&self, value: &str) -> Result<String, DefinitionError> {
        if ENDPOINT_KEYWORDS.contains(&value) {
            return Ok(value.to_string());
        }
        if let Some(network) = self.networks.get(value) {
            return Ok(network.subnet.to_string());
        }
        if let Some(lb) = self.loadbalancers.iter().find(|lb| lb.name == value) {
            return Ok(lb.vip.clone());
        }
        if IpAddr::from_str(value).is_ok() || IpNetwork::from_str(value).is_ok() {
            return Ok(value.to_string());
        }
        Err(DefinitionError::unknown("endpoint", value))
    }
}

/// Resolves a port-forward destination: an instance unit name or an address.
///
/// # Errors
///
/// Returns an unknown-reference error if the value is neither.
pub fn forward_destination(value: &str, instances: &[Instance]) -> Result<String, DefinitionError> {
    if let Some(unit) = instances.iter().find(|i| i.name == value) {
        return Ok(unit.ip.clone());
    }
    if IpAddr::from_str(value).is_ok() {
        return Ok(value.to_string());
    }
    Err(DefinitionError::unknown("instance", value))
}

/// Allocates the address of the `offset`-th unit counted from `start`.
///
/// # Errors
///
/// Returns an error if the address overflows or leaves the subnet.
pub fn allocate(
    unit: &str,
    start: Ipv4Addr,
    offset: u32,
    subnet: Ipv4Network,
) -> Result<Ipv4Addr, DefinitionError> {
    let out_of_range = |address: String| DefinitionError::AddressOutOfRange {
        name: unit.to_string(),
        address,
        subnet: subnet.to_string(),
    };

    let raw = u32::from(start)
        .checked_add(offset)
        .ok_or_else(|| out_of_range(format!("{start}+{offset}")))?;
    let address = Ipv4Addr::from(raw);

    if subnet.contains(address) {
        Ok(address)
    } else {
        Err(out_of_range(address.to_string()))
    }
}
