//! The normalized target state of an environment.

use serde::{Deserialize, Serialize};

use crate::error::InvariantError;

use super::types::{
    Bootstrapping, Datacenter, Execution, Firewall, Instance, Nat, Network, Router,
};

/// Who an environment belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceIdentity {
    /// Service (environment) identifier.
    pub service_id: String,
    /// Owning client identifier.
    pub client_id: String,
    /// Owning client name.
    pub client_name: String,
    /// Service name from the definition.
    pub service_name: String,
}

/// Fully normalized desired state for the current request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetState {
    /// Service identifier.
    pub service_id: String,
    /// Owning client identifier.
    pub client_id: String,
    /// Owning client name.
    pub client_name: String,
    /// Service name.
    pub service_name: String,
    /// Datacenter metadata.
    pub datacenter: Datacenter,
    /// Provisioning mechanism.
    pub bootstrapping: Bootstrapping,
    /// Public, service-facing address. Sticky once assigned.
    #[serde(default)]
    pub service_ip: Option<String>,
    /// Address of the bootstrapping master, when bootstrapping is enabled.
    #[serde(default)]
    pub management_ip: Option<String>,
    /// Routers.
    #[serde(default)]
    pub routers: Vec<Router>,
    /// Networks.
    #[serde(default)]
    pub networks: Vec<Network>,
    /// Instance units.
    #[serde(default)]
    pub instances: Vec<Instance>,
    /// Per-router firewall rule sets.
    #[serde(default)]
    pub firewalls: Vec<Firewall>,
    /// Per-router NAT rule sets.
    #[serde(default)]
    pub nats: Vec<Nat>,
    /// Provisioning executions.
    #[serde(default)]
    pub executions: Vec<Execution>,
    /// Bootstrap jobs.
    #[serde(default)]
    pub bootstraps: Vec<Execution>,
}

impl TargetState {
    /// Creates a state with identity and metadata but no resources.
    #[must_use]
    pub fn empty(
        identity: &ServiceIdentity,
        datacenter: Datacenter,
        bootstrapping: Bootstrapping,
    ) -> Self {
        Self {
            service_id: identity.service_id.clone(),
            client_id: identity.client_id.clone(),
            client_name: identity.client_name.clone(),
            service_name: identity.service_name.clone(),
            datacenter,
            bootstrapping,
            ..Self::default()
        }
    }

    /// Returns the identity this state belongs to.
    #[must_use]
    pub fn identity(&self) -> ServiceIdentity {
        ServiceIdentity {
            service_id: self.service_id.clone(),
            client_id: self.client_id.clone(),
            client_name: self.client_name.clone(),
            service_name: self.service_name.clone(),
        }
    }

    /// Checks that executions only exist when bootstrapping is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if bootstrapping is `none` while executions or
    /// bootstrap jobs are present.
    pub fn check_invariants(&self) -> std::result::Result<(), InvariantError> {
        if !self.bootstrapping.is_enabled() {
            let count = self.executions.len() + self.bootstraps.len();
            if count > 0 {
                return Err(InvariantError::ExecutionsWithoutBootstrapping { count });
            }
        }
        Ok(())
    }

    /// Looks up an instance unit by name.
    #[must_use]
    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.name == name)
    }

    /// Returns the total number of itemized records.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.routers.len() + self.networks.len() + self.instances.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::ExecutionPurpose;

    fn execution() -> Execution {
        Execution {
            name: String::from("exec-web"),
            provisioner: String::from("salt"),
            purpose: ExecutionPurpose::Provision,
            target: vec![String::from("demo-web-1")],
            payload: vec![String::from("date")],
        }
    }

    #[test]
    fn test_invariant_rejects_executions_without_bootstrapping() {
        let mut state = TargetState::default();
        state.executions.push(execution());
        let err = state.check_invariants().unwrap_err();
        assert!(matches!(
            err,
            InvariantError::ExecutionsWithoutBootstrapping { count: 1 }
        ));
    }

    #[test]
    fn test_invariant_accepts_executions_with_provisioner() {
        let mut state = TargetState {
            bootstrapping: Bootstrapping::Provisioner(String::from("salt")),
            ..TargetState::default()
        };
        state.executions.push(execution());
        assert!(state.check_invariants().is_ok());
    }
}
