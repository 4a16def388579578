//! Template registry.
//!
//! Fragments are resolved once, at startup, either from the templates built
//! into the binary or from a directory of JSON/YAML files. The registry is
//! immutable afterwards and can be shared freely between requests.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, WorkflowError};

use super::fragment::WorkflowFragment;

/// Templates shipped with the crate.
const BUILTIN: &[(&str, &str)] = &[
    ("initial", include_str!("../../workflows/initial.json")),
    ("terminal", include_str!("../../workflows/terminal.json")),
    ("delete_initial", include_str!("../../workflows/delete_initial.json")),
    ("delete_terminal", include_str!("../../workflows/delete_terminal.json")),
    ("import", include_str!("../../workflows/import.json")),
    ("routers_create", include_str!("../../workflows/routers_create.json")),
    ("networks_create", include_str!("../../workflows/networks_create.json")),
    ("networks_update", include_str!("../../workflows/networks_update.json")),
    ("instances_create", include_str!("../../workflows/instances_create.json")),
    ("instances_update", include_str!("../../workflows/instances_update.json")),
    ("instances_delete", include_str!("../../workflows/instances_delete.json")),
    ("firewalls_create", include_str!("../../workflows/firewalls_create.json")),
    ("firewalls_update", include_str!("../../workflows/firewalls_update.json")),
    ("nats_create", include_str!("../../workflows/nats_create.json")),
    ("nats_update", include_str!("../../workflows/nats_update.json")),
    ("bootstraps_create", include_str!("../../workflows/bootstraps_create.json")),
    ("executions_create", include_str!("../../workflows/executions_create.json")),
    ("networks_delete", include_str!("../../workflows/networks_delete.json")),
    ("routers_delete", include_str!("../../workflows/routers_delete.json")),
];

/// Immutable, versioned collection of workflow fragments.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    /// Fragments by name.
    fragments: BTreeMap<String, WorkflowFragment>,
    /// Content hash over all fragments.
    version: String,
}

impl TemplateRegistry {
    /// Loads the templates built into the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in template is malformed.
    pub fn builtin() -> Result<Self> {
        let fragments = BUILTIN
            .iter()
            .map(|(source, content)| parse_fragment(source, content, false))
            .collect::<Result<Vec<_>>>()?;

        let registry = Self::from_fragments(fragments)?;
        debug!("Loaded {} built-in workflow fragments", registry.len());
        Ok(registry)
    }

    /// Loads every `.json`, `.yaml` and `.yml` file in a directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or a file is not a
    /// valid fragment.
    pub fn load_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading workflow templates from: {}", path.display());

        let dir_error = |e: std::io::Error| WorkflowError::TemplateDirectory {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(path).map_err(dir_error)? {
            let file = entry.map_err(dir_error)?.path();
            let extension = file.extension().and_then(|e| e.to_str()).unwrap_or_default();
            if matches!(extension, "json" | "yaml" | "yml") {
                files.push(file);
            }
        }
        files.sort();

        let mut fragments = Vec::with_capacity(files.len());
        for file in files {
            let source = file.display().to_string();
            let content = std::fs::read_to_string(&file).map_err(|e| {
                WorkflowError::InvalidFragment {
                    source_name: source.clone(),
                    message: e.to_string(),
                }
            })?;
            let yaml = file.extension().is_some_and(|e| e != "json");
            fragments.push(parse_fragment(&source, &content, yaml)?);
        }

        Self::from_fragments(fragments)
    }

    /// Builds a registry from already parsed fragments.
    ///
    /// # Errors
    ///
    /// Returns an error if two fragments share a name.
    pub fn from_fragments(fragments: Vec<WorkflowFragment>) -> Result<Self> {
        let mut by_name = BTreeMap::new();
        for fragment in fragments {
            if by_name.contains_key(&fragment.name) {
                return Err(WorkflowError::DuplicateFragment {
                    name: fragment.name,
                }
                .into());
            }
            by_name.insert(fragment.name.clone(), fragment);
        }

        let version = compute_version(&by_name)?;
        Ok(Self {
            fragments: by_name,
            version,
        })
    }

    /// Looks up a fragment by name.
    ///
    /// # Errors
    ///
    /// Returns an error if no fragment has that name.
    pub fn get(&self, name: &str) -> Result<&WorkflowFragment> {
        self.fragments.get(name).ok_or_else(|| {
            WorkflowError::FragmentNotFound {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Returns the content version of the registry.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Iterates over fragments in name order.
    pub fn fragments(&self) -> impl Iterator<Item = &WorkflowFragment> {
        self.fragments.values()
    }

    /// Returns the number of fragments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Returns true if the registry holds no fragments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Parses one fragment template.
fn parse_fragment(source: &str, content: &str, yaml: bool) -> Result<WorkflowFragment> {
    let parsed: std::result::Result<WorkflowFragment, String> = if yaml {
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(content).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| {
        WorkflowError::InvalidFragment {
            source_name: source.to_string(),
            message,
        }
        .into()
    })
}

/// Hashes fragments in name order.
fn compute_version(fragments: &BTreeMap<String, WorkflowFragment>) -> Result<String> {
    let mut hasher = Sha256::new();
    for fragment in fragments.values() {
        let canonical = serde_json::to_vec(fragment).map_err(|e| WorkflowError::InvalidFragment {
            source_name: fragment.name.clone(),
            message: e.to_string(),
        })?;
        hasher.update(&canonical);
    }
    Ok(hex::encode(hasher.finalize()))
}
