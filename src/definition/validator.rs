//! Field-level validation of desired-state definitions.
//!
//! This module checks names, addresses, ports and sizes before the
//! normalizer resolves cross references. All errors are collected, and the
//! first one is reported to the caller.

use ipnetwork::Ipv4Network;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use tracing::debug;

use crate::error::{DefinitionError, EnvmapError, Result};

use super::spec::{
    Definition, InstanceDefinition, LoadBalancerDefinition, PortForwardDefinition,
    RouterDefinition, RuleDefinition,
};

/// Protocols accepted in firewall rules and port forwards.
const KNOWN_PROTOCOLS: &[&str] = &["tcp", "udp", "icmp", "any"];

/// Rule actions.
const KNOWN_ACTIONS: &[&str] = &["allow", "deny"];

/// Units accepted in memory sizes.
const MEMORY_UNITS: &[&str] = &["MB", "GB"];

/// Validator for desired-state definitions.
#[derive(Debug, Default)]
pub struct DefinitionValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl DefinitionValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a definition.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any field is invalid.
    pub fn validate(&self, definition: &Definition) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_service(definition, &mut result);
        Self::validate_routers(&definition.routers, &mut result);
        Self::validate_instances(&definition.instances, &mut result);
        Self::validate_loadbalancers(&definition.loadbalancers, &mut result);

        if result.errors.is_empty() {
            debug!("Definition validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(EnvmapError::Definition(DefinitionError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Validates service-level fields.
    fn validate_service(definition: &Definition, result: &mut ValidationResult) {
        if definition.name.is_empty() {
            result.error("name", String::from("Service name cannot be empty"));
        } else if !is_valid_name(&definition.name) {
            result.error(
                "name",
                format!(
                    "Service name '{}' is invalid. Must start with a lowercase letter and contain only lowercase alphanumerics, hyphens or underscores.",
                    definition.name
                ),
            );
        }

        if let Some(ip) = &definition.service_ip {
            if IpAddr::from_str(ip).is_err() {
                result.error("service_ip", format!("Service IP '{ip}' is not a valid address"));
            }
        }

        if definition.routers.is_empty() && !definition.instances.is_empty() {
            result
                .warnings
                .push(String::from("Instances are defined but no router routes their networks"));
        }
    }

    /// Validates routers, their networks, rules and port forwards.
    fn validate_routers(routers: &[RouterDefinition], result: &mut ValidationResult) {
        let mut router_names = HashSet::new();
        let mut network_names = HashSet::new();

        for (i, router) in routers.iter().enumerate() {
            let prefix = format!("routers[{i}]");

            if !router_names.insert(router.name.as_str()) {
                result.error(
                    format!("{prefix}.name"),
                    format!("Duplicate router name: {}", router.name),
                );
            }
            if !is_valid_name(&router.name) {
                result.error(
                    format!("{prefix}.name"),
                    format!("Router name '{}' is invalid", router.name),
                );
            }

            for (j, network) in router.networks.iter().enumerate() {
                let field = format!("{prefix}.networks[{j}]");
                if !network_names.insert(network.name.as_str()) {
                    result.error(
                        format!("{field}.name"),
                        format!("Duplicate network name: {}", network.name),
                    );
                }
                if !is_valid_name(&network.name) {
                    result.error(
                        format!("{field}.name"),
                        format!("Network name '{}' is invalid", network.name),
                    );
                }
                if Ipv4Network::from_str(&network.subnet).is_err() {
                    result.error(
                        format!("{field}.subnet"),
                        format!("Subnet '{}' is not a valid IPv4 CIDR", network.subnet),
                    );
                }
                for (k, dns) in network.dns.iter().enumerate() {
                    if IpAddr::from_str(dns).is_err() {
                        result.error(
                            format!("{field}.dns[{k}]"),
                            format!("DNS server '{dns}' is not a valid address"),
                        );
                    }
                }
            }

            for (j, rule) in router.rules.iter().enumerate() {
                Self::validate_rule(rule, &format!("{prefix}.rules[{j}]"), result);
            }

            for (j, forward) in router.port_forwarding.iter().enumerate() {
                Self::validate_port_forward(
                    forward,
                    &format!("{prefix}.port_forwarding[{j}]"),
                    result,
                );
            }
        }
    }

    /// Validates a firewall rule.
    fn validate_rule(rule: &RuleDefinition, prefix: &str, result: &mut ValidationResult) {
        if rule.name.is_empty() {
            result.error(format!("{prefix}.name"), String::from("Rule name cannot be empty"));
        }
        if rule.source.is_empty() {
            result.error(format!("{prefix}.source"), String::from("Rule source cannot be empty"));
        }
        if rule.destination.is_empty() {
            result.error(
                format!("{prefix}.destination"),
                String::from("Rule destination cannot be empty"),
            );
        }
        for (field, port) in [("from_port", &rule.from_port), ("to_port", &rule.to_port)] {
            if !is_valid_port(port, true) {
                result.error(
                    format!("{prefix}.{field}"),
                    format!("Port '{port}' must be 'any' or between 1 and 65535"),
                );
            }
        }
        if !KNOWN_PROTOCOLS.contains(&rule.protocol.to_lowercase().as_str()) {
            result.error(
                format!("{prefix}.protocol"),
                format!("Unknown protocol '{}'", rule.protocol),
            );
        }
        if !KNOWN_ACTIONS.contains(&rule.action.to_lowercase().as_str()) {
            result.error(
                format!("{prefix}.action"),
                format!("Rule action '{}' must be allow or deny", rule.action),
            );
        }
    }

    /// Validates a port forward.
    fn validate_port_forward(
        forward: &PortForwardDefinition,
        prefix: &str,
        result: &mut ValidationResult,
    ) {
        for (field, port) in [("from_port", &forward.from_port), ("to_port", &forward.to_port)] {
            if !is_valid_port(port, false) {
                result.error(
                    format!("{prefix}.{field}"),
                    format!("Port '{port}' must be between 1 and 65535"),
                );
            }
        }
        if forward.destination.is_empty() {
            result.error(
                format!("{prefix}.destination"),
                String::from("Port forward destination cannot be empty"),
            );
        }
        if !KNOWN_PROTOCOLS.contains(&forward.protocol.to_lowercase().as_str()) {
            result.error(
                format!("{prefix}.protocol"),
                format!("Unknown protocol '{}'", forward.protocol),
            );
        }
    }

    /// Validates instance groups.
    fn validate_instances(instances: &[InstanceDefinition], result: &mut ValidationResult) {
        let mut seen_names = HashSet::new();

        for (i, instance) in instances.iter().enumerate() {
            let prefix = format!("instances[{i}]");

            if !seen_names.insert(instance.name.as_str()) {
                result.error(
                    format!("{prefix}.name"),
                    format!("Duplicate instance name: {}", instance.name),
                );
            }
            if !is_valid_name(&instance.name) {
                result.error(
                    format!("{prefix}.name"),
                    format!("Instance name '{}' is invalid", instance.name),
                );
            }
            if instance.image.is_empty() {
                result.error(format!("{prefix}.image"), String::from("Image cannot be empty"));
            }
            if instance.count == 0 {
                result.error(
                    format!("{prefix}.count"),
                    String::from("Instance count must be at least 1"),
                );
            }
            if instance.count > 64 {
                result.warnings.push(format!(
                    "{prefix}.count: Requesting {} units in one group is unusual",
                    instance.count
                ));
            }
            if instance.cpus == 0 {
                result.error(format!("{prefix}.cpus"), String::from("CPU count must be at least 1"));
            }
            if !is_valid_size(&instance.memory) {
                result.error(
                    format!("{prefix}.memory"),
                    format!("Memory '{}' must look like 512MB or 2GB", instance.memory),
                );
            }
            for (j, disk) in instance.disks.iter().enumerate() {
                if !is_valid_size(disk) {
                    result.error(
                        format!("{prefix}.disks[{j}]"),
                        format!("Disk size '{disk}' must look like 512MB or 2GB"),
                    );
                }
            }
            if Ipv4Addr::from_str(&instance.networks.start).is_err() {
                result.error(
                    format!("{prefix}.networks.start"),
                    format!("Start address '{}' is not a valid IPv4 address", instance.networks.start),
                );
            }
        }
    }

    /// Validates load balancer references.
    fn validate_loadbalancers(
        loadbalancers: &[LoadBalancerDefinition],
        result: &mut ValidationResult,
    ) {
        let mut seen_names = HashSet::new();
        for (i, lb) in loadbalancers.iter().enumerate() {
            if !seen_names.insert(lb.name.as_str()) {
                result.error(
                    format!("loadbalancers[{i}].name"),
                    format!("Duplicate load balancer name: {}", lb.name),
                );
            }
            if IpAddr::from_str(&lb.vip).is_err() {
                result.error(
                    format!("loadbalancers[{i}].vip"),
                    format!("VIP '{}' is not a valid address", lb.vip),
                );
            }
        }
    }
}

impl ValidationResult {
    /// Records an error.
    fn error(&mut self, field: impl Into<String>, message: String) {
        self.errors.push(ValidationError {
            field: field.into(),
            message,
        });
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validates that a name follows the naming convention.
/// Names start with a lowercase letter and contain lowercase alphanumerics,
/// hyphens or underscores, without a trailing separator.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_') {
        return false;
    }

    !name.ends_with('-') && !name.ends_with('_') && !name.contains("--")
}

/// Validates a port: a number in 1..=65535, or "any" where allowed.
fn is_valid_port(port: &str, allow_any: bool) -> bool {
    if allow_any && port.eq_ignore_ascii_case("any") {
        return true;
    }
    port.parse::<u16>().is_ok_and(|p| p > 0)
}

/// Validates a size such as "512MB" or "2GB".
fn is_valid_size(size: &str) -> bool {
    MEMORY_UNITS.iter().any(|unit| {
        size.strip_suffix(unit)
            .is_some_and(|n| n.parse::<u32>().is_ok_and(|v| v > 0))
    })
}
