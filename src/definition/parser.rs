//! Definition parser for YAML and JSON sources.
//!
//! Definitions arrive either as files (CLI) or as text embedded in a bus
//! request. JSON bodies are detected by their leading brace; everything else
//! is read as YAML.

use std::path::Path;
use tracing::{debug, info};

use crate::error::{DefinitionError, EnvmapError, Result};

use super::spec::Definition;

/// Parser for desired-state definitions.
#[derive(Debug, Default)]
pub struct DefinitionParser;

impl DefinitionParser {
    /// Creates a new definition parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Loads a definition from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Definition> {
        let path = path.as_ref();
        info!("Loading definition from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            EnvmapError::Definition(DefinitionError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse(&content, Some(path))
    }

    /// Parses a definition from text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is neither valid JSON nor valid YAML for
    /// a definition.
    pub fn parse(&self, content: &str, source: Option<&Path>) -> Result<Definition> {
        let location = source.map(|p| p.display().to_string());

        if content.trim().is_empty() {
            return Err(EnvmapError::Definition(DefinitionError::ParseError {
                message: String::from("definition is empty"),
                location,
            }));
        }

        let definition: Definition = if content.trim_start().starts_with('{') {
            debug!("Parsing JSON definition");
            serde_json::from_str(content).map_err(|e| {
                EnvmapError::Definition(DefinitionError::ParseError {
                    message: format!("JSON parse error: {e}"),
                    location,
                })
            })?
        } else {
            debug!("Parsing YAML definition");
            serde_yaml::from_str(content).map_err(|e| {
                EnvmapError::Definition(DefinitionError::ParseError {
                    message: format!("YAML parse error: {e}"),
                    location,
                })
            })?
        };

        debug!("Parsed definition for service: {}", definition.name);
        Ok(definition)
    }

    /// Renders a definition back to YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self, definition: &Definition) -> Result<String> {
        serde_yaml::to_string(definition).map_err(|e| {
            EnvmapError::Definition(DefinitionError::ParseError {
                message: format!("Failed to render definition: {e}"),
                location: None,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Bootstrapping;

    #[test]
    fn test_parse_minimal_definition() {
        let yaml = r"
name: demo
";
        let definition = DefinitionParser::new().parse(yaml, None).unwrap();
        assert_eq!(definition.name, "demo");
        assert_eq!(definition.bootstrapping, Bootstrapping::None);
        assert!(definition.routers.is_empty());
    }

    #[test]
    fn test_parse_full_definition() {
        let yaml = r#"
name: demo
datacenter: dc1
bootstrapping: salt
service_ip: 172.16.186.44
routers:
  - name: gw
    rules:
      - name: web-in
        source: any
        destination: web
        from_port: "80"
        to_port: "80"
        protocol: tcp
    networks:
      - name: web
        subnet: 10.1.0.0/24
        dns: ["8.8.8.8"]
    port_forwarding:
      - from_port: "2222"
        to_port: "22"
        destination: demo-web-1
instances:
  - name: web
    image: ubuntu-1404
    count: 2
    cpus: 1
    memory: 1GB
    disks: ["10GB"]
    networks:
      name: web
      start: 10.1.0.11
    provisioner:
      - exec:
          - "apt-get update"
"#;
        let definition = DefinitionParser::new().parse(yaml, None).unwrap();
        assert_eq!(definition.bootstrapping, Bootstrapping::Provisioner(String::from("salt")));
        assert_eq!(definition.routers[0].networks[0].subnet, "10.1.0.0/24");
        assert_eq!(definition.routers[0].rules[0].action, "allow");
        assert_eq!(definition.routers[0].port_forwarding[0].protocol, "tcp");
        assert_eq!(definition.instances[0].count, 2);
        assert_eq!(definition.instances[0].commands(), vec!["apt-get update"]);
        assert_eq!(definition.total_units(), 2);
    }

    #[test]
    fn test_parse_json_definition() {
        let json = r#"{"name": "demo", "bootstrapping": "none", "routers": [{"name": "gw"}]}"#;
        let definition = DefinitionParser::new().parse(json, None).unwrap();
        assert_eq!(definition.routers.len(), 1);
    }

    #[test]
    fn test_numeric_ports() {
        let yaml = r"
name: demo
routers:
  - name: gw
    rules:
      - name: https
        source: any
        destination: any
        to_port: 443
    port_forwarding:
      - from_port: 2222
        to_port: 22
        destination: 10.1.0.11
";
        let definition = DefinitionParser::new().parse(yaml, None).unwrap();
        let router = &definition.routers[0];
        assert_eq!(router.rules[0].from_port, "any");
        assert_eq!(router.rules[0].to_port, "443");
        assert_eq!(router.port_forwarding[0].from_port, "2222");
    }

    #[test]
    fn test_parse_empty_fails() {
        assert!(DefinitionParser::new().parse("   ", None).is_err());
    }

    #[test]
    fn test_yaml_roundtrip_keeps_definition() {
        let parser = DefinitionParser::new();
        let definition = parser.parse("name: demo\nbootstrapping: salt\n", None).unwrap();
        let rendered = parser.to_yaml(&definition).unwrap();
        assert_eq!(parser.parse(&rendered, None).unwrap(), definition);
    }
}
