//! The workflow graph handed to the execution fleet.

use serde::{Deserialize, Serialize};

use super::fragment::{Subject, WorkflowArc, WorkflowFragment};

/// A fragment included in a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentRef {
    /// Fragment name.
    pub name: String,
    /// Fragment subject.
    pub subject: Subject,
}

/// Ordered, deduplicated plan built from fragments.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkflowGraph {
    /// Included fragments, in order.
    pub fragments: Vec<FragmentRef>,
    /// Plan steps accumulated from the fragments, in order.
    pub arcs: Vec<WorkflowArc>,
    /// Version of the template registry the fragments came from.
    #[serde(default)]
    pub template_version: String,
}

impl WorkflowGraph {
    /// Creates an empty graph drawn from the given registry version.
    #[must_use]
    pub fn new(template_version: impl Into<String>) -> Self {
        Self {
            template_version: template_version.into(),
            ..Self::default()
        }
    }

    /// Appends a fragment unless its subject is already present.
    ///
    /// Returns true if the fragment was appended.
    pub fn append(&mut self, fragment: &WorkflowFragment) -> bool {
        if self.contains_subject(fragment.subject) {
            return false;
        }
        self.fragments.push(FragmentRef {
            name: fragment.name.clone(),
            subject: fragment.subject,
        });
        self.arcs.extend(fragment.arcs.iter().cloned());
        true
    }

    /// Returns true if a fragment with this subject is included.
    #[must_use]
    pub fn contains_subject(&self, subject: Subject) -> bool {
        self.fragments.iter().any(|f| f.subject == subject)
    }

    /// Returns the names of included fragments, in order.
    #[must_use]
    pub fn fragment_names(&self) -> Vec<&str> {
        self.fragments.iter().map(|f| f.name.as_str()).collect()
    }

    /// Returns the position of a subject in the graph.
    #[must_use]
    pub fn position(&self, subject: Subject) -> Option<usize> {
        self.fragments.iter().position(|f| f.subject == subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(name: &str, subject: Subject) -> WorkflowFragment {
        WorkflowFragment {
            name: name.to_string(),
            subject,
            arcs: vec![WorkflowArc {
                from: format!("pre-{name}"),
                to: name.to_string(),
                event: format!("{name}.start"),
            }],
        }
    }

    #[test]
    fn test_append_skips_known_subject() {
        let mut graph = WorkflowGraph::new("v1");
        assert!(graph.append(&fragment("bootstraps_create", Subject::Bootstrapping)));
        assert!(graph.append(&fragment("executions_create", Subject::RunningExecutions)));
        assert!(!graph.append(&fragment("executions_cleanup", Subject::RunningExecutions)));

        assert_eq!(graph.fragment_names(), vec!["bootstraps_create", "executions_create"]);
        assert_eq!(graph.arcs.len(), 2);
        assert_eq!(graph.position(Subject::RunningExecutions), Some(1));
        assert_eq!(graph.template_version, "v1");
    }
}
