//! Desired-state definitions.
//!
//! This module handles parsing, validation and fingerprinting of the
//! definitions clients submit, and rebuilding a definition from realized
//! state after an import.

mod derive;
mod hash;
mod parser;
mod spec;
mod validator;

pub use derive::derive_definition;
pub use hash::DefinitionHasher;
pub use parser::DefinitionParser;
pub use spec::{
    Definition, InstanceDefinition, InstanceNetworkDefinition, LoadBalancerDefinition,
    NetworkDefinition, PortForwardDefinition, ProvisionerStep, RouterDefinition, RuleDefinition,
};
pub use validator::{DefinitionValidator, ValidationError, ValidationResult};
