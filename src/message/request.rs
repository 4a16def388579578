//! Planning requests.

use serde::{Deserialize, Serialize};

use crate::definition::{Definition, DefinitionParser};
use crate::error::Result;
use crate::model::{Datacenter, ServiceIdentity};

/// Planning operations exposed on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// First creation of an environment.
    Create,
    /// Change of an existing environment.
    Update,
    /// Removal of an environment.
    Delete,
    /// Adoption of an environment created elsewhere.
    Import,
    /// Change preview without a graph.
    Diff,
}

impl Operation {
    /// Every operation, in subscription order.
    pub const ALL: [Self; 5] = [
        Self::Create,
        Self::Update,
        Self::Delete,
        Self::Import,
        Self::Diff,
    ];

    /// Returns the operation's name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Import => "import",
            Self::Diff => "diff",
        }
    }

    /// Returns the request subject for the operation.
    #[must_use]
    pub fn subject(self) -> String {
        format!("mapping.get.{}", self.as_str())
    }

    /// Parses a request subject.
    #[must_use]
    pub fn from_subject(subject: &str) -> Option<Self> {
        let name = subject.strip_prefix("mapping.get.")?;
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A planning request as received on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Service identifier.
    pub id: String,
    /// Identifier of the build to diff against, when it differs from `id`.
    #[serde(default)]
    pub previous_id: Option<String>,
    /// Owning client identifier.
    #[serde(default)]
    pub client_id: String,
    /// Owning client name.
    #[serde(default)]
    pub client_name: String,
    /// Service name; falls back to the definition's name when empty.
    #[serde(default)]
    pub name: String,
    /// Datacenter metadata.
    #[serde(default)]
    pub datacenter: Datacenter,
    /// Definition text, YAML or JSON.
    #[serde(default)]
    pub definition: String,
}

impl Request {
    /// Parses the embedded definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is empty or malformed.
    pub fn parse_definition(&self) -> Result<Definition> {
        DefinitionParser::new().parse(&self.definition, None)
    }

    /// Returns the identity of the service, named after the definition when
    /// the request carries no name.
    #[must_use]
    pub fn identity(&self, definition: &Definition) -> ServiceIdentity {
        let service_name = if self.name.is_empty() {
            definition.name.clone()
        } else {
            self.name.clone()
        };

        ServiceIdentity {
            service_id: self.id.clone(),
            client_id: self.client_id.clone(),
            client_name: self.client_name.clone(),
            service_name,
        }
    }

    /// Returns the id of the build to use as baseline.
    #[must_use]
    pub fn baseline_id(&self) -> &str {
        self.previous_id.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_subjects() {
        assert_eq!(Operation::Create.subject(), "mapping.get.create");
        assert_eq!(Operation::from_subject("mapping.get.diff"), Some(Operation::Diff));
        assert_eq!(Operation::from_subject("mapping.get.nope"), None);
        assert_eq!(Operation::from_subject("service.create.done"), None);
    }

    #[test]
    fn test_request_envelope_parses() {
        let json = r#"{
            "id": "svc-1",
            "client_id": "c-1",
            "client_name": "acme",
            "datacenter": {"name": "dc1", "type": "fake"},
            "definition": "name: demo\n"
        }"#;
        let request: Request = serde_json::from_str(json).unwrap();
        let definition = request.parse_definition().unwrap();
        let identity = request.identity(&definition);

        assert_eq!(identity.service_name, "demo");
        assert_eq!(request.datacenter.kind, "fake");
        assert_eq!(request.baseline_id(), "svc-1");
    }

    #[test]
    fn test_previous_id_overrides_baseline() {
        let request = Request {
            id: String::from("svc-2"),
            previous_id: Some(String::from("svc-1")),
            client_id: String::new(),
            client_name: String::new(),
            name: String::from("demo"),
            datacenter: Datacenter::default(),
            definition: String::new(),
        };
        assert_eq!(request.baseline_id(), "svc-1");
        assert!(request.parse_definition().is_err());
    }
}
