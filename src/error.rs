//! Error types for the envmap planning service.
//!
//! This module provides the error hierarchy for every stage of a planning
//! request: definition parsing and validation, state invariants, workflow
//! template resolution, build persistence, the message bus and process
//! configuration.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the planning service.
#[derive(Debug, Error)]
pub enum EnvmapError {
    /// Definition parsing or validation errors.
    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// State invariant violations.
    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantError),

    /// Workflow template errors.
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Build store errors.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Message bus errors.
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// Process configuration errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while reading or validating a desired-state definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The definition could not be parsed.
    #[error("Failed to parse definition: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// A field failed validation.
    #[error("Definition validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A name refers to something the definition does not declare.
    #[error("Unknown {kind} reference: {name}")]
    UnknownReference {
        /// Kind of the referenced resource.
        kind: String,
        /// The unresolved name.
        name: String,
    },

    /// Duplicate resource definition.
    #[error("Duplicate {resource_type} name: {name}")]
    DuplicateName {
        /// Type of resource (network, instance, ...).
        resource_type: String,
        /// The duplicated name.
        name: String,
    },

    /// An allocated address falls outside its network.
    #[error("Address {address} for {name} is outside subnet {subnet}")]
    AddressOutOfRange {
        /// Resource the address was allocated for.
        name: String,
        /// The offending address.
        address: String,
        /// The subnet it should belong to.
        subnet: String,
    },
}

/// Violations of target-state invariants. These are fatal and never retried.
#[derive(Debug, Error)]
pub enum InvariantError {
    /// The bootstrapping mode differs from the one the environment was built with.
    #[error("bootstrapping mode cannot be changed from '{previous}' to '{requested}' once set")]
    BootstrappingChanged {
        /// Mode recorded in the previous state.
        previous: String,
        /// Mode requested by the new definition.
        requested: String,
    },

    /// Executions or bootstrap jobs were requested with bootstrapping disabled.
    #[error("bootstrapping is 'none' but {count} provisioner execution(s) are defined")]
    ExecutionsWithoutBootstrapping {
        /// Number of offending executions or instance groups.
        count: usize,
    },

    /// Bootstrapping needs a router to attach the management network to.
    #[error("bootstrapping with '{provisioner}' requires at least one router")]
    BootstrappingWithoutRouter {
        /// The requested provisioner.
        provisioner: String,
    },
}

/// Workflow template errors.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// No fragment with the given name is registered.
    #[error("Workflow fragment not found: {name}")]
    FragmentNotFound {
        /// Name of the missing fragment.
        name: String,
    },

    /// A fragment file could not be parsed.
    #[error("Invalid workflow fragment {source_name}: {message}")]
    InvalidFragment {
        /// File or template the fragment came from.
        source_name: String,
        /// Description of the problem.
        message: String,
    },

    /// Two templates declare the same fragment name.
    #[error("Duplicate workflow fragment: {name}")]
    DuplicateFragment {
        /// The duplicated name.
        name: String,
    },

    /// A fragment is tagged with a different subject than the stage expects.
    #[error("Fragment {fragment} has subject '{found}', expected '{expected}'")]
    SubjectMismatch {
        /// Name of the fragment.
        fragment: String,
        /// Subject the stage requires.
        expected: String,
        /// Subject the fragment declares.
        found: String,
    },

    /// The template directory could not be read.
    #[error("Cannot read workflow templates at {path}: {message}")]
    TemplateDirectory {
        /// Directory that failed.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },
}

/// Build store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No build is recorded for the service.
    #[error("No build recorded for service: {service_id}")]
    NotFound {
        /// Service identifier.
        service_id: String,
    },

    /// The service id cannot be used as a storage key.
    #[error("Invalid service id for storage: {service_id}")]
    InvalidKey {
        /// Service identifier.
        service_id: String,
    },

    /// A stored record could not be read back.
    #[error("Build record is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// A record could not be written.
    #[error("Failed to write build record: {message}")]
    WriteFailed {
        /// Description of the failure.
        message: String,
    },

    /// Serialization error.
    #[error("Build record serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },
}

/// Message bus errors.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus could not be reached.
    #[error("Failed to connect to message bus at {url}: {message}")]
    ConnectionFailed {
        /// Bus address.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// Subscribing to a subject failed.
    #[error("Failed to subscribe to {subject}: {message}")]
    SubscribeFailed {
        /// Subject pattern.
        subject: String,
        /// Description of the failure.
        message: String,
    },

    /// Publishing failed.
    #[error("Failed to publish on {subject}: {message}")]
    PublishFailed {
        /// Target subject.
        subject: String,
        /// Description of the failure.
        message: String,
    },

    /// A request did not get a usable reply.
    #[error("Request on {subject} failed: {message}")]
    RequestFailed {
        /// Target subject.
        subject: String,
        /// Description of the failure.
        message: String,
    },

    /// A message body could not be decoded.
    #[error("Invalid payload on {subject}: {message}")]
    InvalidPayload {
        /// Subject the payload arrived on.
        subject: String,
        /// Description of the decoding failure.
        message: String,
    },
}

/// Process configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// A setting has an unusable value.
    #[error("Invalid value for {name}: {message}")]
    InvalidValue {
        /// Setting name.
        name: String,
        /// Description of the problem.
        message: String,
    },

    /// A local file could not be loaded.
    #[error("Failed to load {path}: {message}")]
    LoadFailed {
        /// File path.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },
}

/// Result type alias for envmap operations.
pub type Result<T> = std::result::Result<T, EnvmapError>;

impl EnvmapError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if the error comes from the request itself (bad definition
    /// or violated invariant) rather than from the service's surroundings.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(self, Self::Definition(_) | Self::Invariant(_))
    }
}

impl DefinitionError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates an unknown reference error.
    #[must_use]
    pub fn unknown(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnknownReference {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl StoreError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Creates a write error with the given message.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }
}

impl BusError {
    /// Creates a publish error.
    #[must_use]
    pub fn publish(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PublishFailed {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid payload error.
    #[must_use]
    pub fn invalid_payload(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_message_is_verbatim() {
        let err = EnvmapError::from(InvariantError::BootstrappingChanged {
            previous: String::from("salt"),
            requested: String::from("none"),
        });
        assert_eq!(
            err.to_string(),
            "Invariant violation: bootstrapping mode cannot be changed from 'salt' to 'none' once set"
        );
        assert!(err.is_input_error());
    }

    #[test]
    fn test_workflow_errors_are_not_input_errors() {
        let err = EnvmapError::from(WorkflowError::FragmentNotFound {
            name: String::from("initial"),
        });
        assert!(!err.is_input_error());
    }
}
