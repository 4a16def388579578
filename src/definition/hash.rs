//! Definition fingerprints.
//!
//! A fingerprint is attached to every outbound message so an operator can
//! tell at a glance whether two builds were planned from the same input.

use sha2::{Digest, Sha256};

use super::spec::{Definition, InstanceDefinition, RouterDefinition};

/// Hasher for computing definition fingerprints.
#[derive(Debug, Default)]
pub struct DefinitionHasher;

impl DefinitionHasher {
    /// Creates a new definition hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of the entire definition.
    #[must_use]
    pub fn hash_definition(&self, definition: &Definition) -> String {
        let mut hasher = Sha256::new();

        hasher.update(definition.name.as_bytes());
        if let Some(datacenter) = &definition.datacenter {
            hasher.update(datacenter.as_bytes());
        }
        hasher.update(definition.bootstrapping.to_string().as_bytes());
        if let Some(ip) = &definition.service_ip {
            hasher.update(ip.as_bytes());
        }

        for router in &definition.routers {
            hasher.update(self.hash_router(router).as_bytes());
        }
        for instance in &definition.instances {
            hasher.update(self.hash_instance(instance).as_bytes());
        }

        // Load balancers (sorted by name; order carries no meaning)
        let mut loadbalancers: Vec<_> = definition.loadbalancers.iter().collect();
        loadbalancers.sort_by(|a, b| a.name.cmp(&b.name));
        for lb in loadbalancers {
            hasher.update(lb.name.as_bytes());
            hasher.update(lb.vip.as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a hash for a single router with its networks and rules.
    #[must_use]
    pub fn hash_router(&self, router: &RouterDefinition) -> String {
        let mut hasher = Sha256::new();

        hasher.update(router.name.as_bytes());

        for network in &router.networks {
            hasher.update(network.name.as_bytes());
            hasher.update(network.subnet.as_bytes());
            for dns in &network.dns {
                hasher.update(dns.as_bytes());
            }
        }

        // Rules are ordered; keep definition order
        for rule in &router.rules {
            for field in [
                &rule.name,
                &rule.source,
                &rule.destination,
                &rule.from_port,
                &rule.to_port,
                &rule.protocol,
                &rule.action,
            ] {
                hasher.update(field.as_bytes());
                hasher.update([0u8]);
            }
        }

        for forward in &router.port_forwarding {
            for field in [
                &forward.from_port,
                &forward.to_port,
                &forward.destination,
                &forward.protocol,
            ] {
                hasher.update(field.as_bytes());
                hasher.update([0u8]);
            }
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a hash for a single instance group.
    #[must_use]
    pub fn hash_instance(&self, instance: &InstanceDefinition) -> String {
        let mut hasher = Sha256::new();

        hasher.update(instance.name.as_bytes());
        hasher.update(instance.image.as_bytes());
        hasher.update(instance.count.to_be_bytes());
        hasher.update(instance.cpus.to_be_bytes());
        hasher.update(instance.memory.as_bytes());
        for disk in &instance.disks {
            hasher.update(disk.as_bytes());
        }
        hasher.update(instance.networks.name.as_bytes());
        hasher.update(instance.networks.start.as_bytes());
        for command in instance.commands() {
            hasher.update(command.as_bytes());
            hasher.update([0u8]);
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::DefinitionParser;

    fn definition(image: &str) -> Definition {
        let yaml = format!(
            r"
name: demo
routers:
  - name: gw
    networks:
      - name: web
        subnet: 10.1.0.0/24
instances:
  - name: web
    image: {image}
    memory: 1GB
    networks:
      name: web
      start: 10.1.0.11
"
        );
        DefinitionParser::new().parse(&yaml, None).unwrap()
    }

    #[test]
    fn test_definition_hash_deterministic() {
        let hasher = DefinitionHasher::new();
        let def = definition("ubuntu-1404");
        assert_eq!(hasher.hash_definition(&def), hasher.hash_definition(&def));
    }

    #[test]
    fn test_changed_image_changes_hash() {
        let hasher = DefinitionHasher::new();
        assert_ne!(
            hasher.hash_definition(&definition("ubuntu-1404")),
            hasher.hash_definition(&definition("ubuntu-1604"))
        );
    }

    #[test]
    fn test_loadbalancer_order_ignored() {
        let hasher = DefinitionHasher::new();
        let mut a = definition("ubuntu-1404");
        a.loadbalancers = vec![
            crate::definition::LoadBalancerDefinition {
                name: String::from("lb1"),
                vip: String::from("10.9.0.1"),
            },
            crate::definition::LoadBalancerDefinition {
                name: String::from("lb2"),
                vip: String::from("10.9.0.2"),
            },
        ];
        let mut b = a.clone();
        b.loadbalancers.reverse();
        assert_eq!(hasher.hash_definition(&a), hasher.hash_definition(&b));
    }

    #[test]
    fn test_short_hash() {
        let hasher = DefinitionHasher::new();
        let short = hasher.short_hash("abcdef1234567890abcdef1234567890");
        assert_eq!(short, "abcdef12");
    }
}
