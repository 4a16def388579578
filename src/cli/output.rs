//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::definition::{Definition, ValidationResult};
use crate::message::OutboundMessage;
use crate::planner::ChangeSet;
use crate::workflow::TemplateRegistry;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Workflow step row for table display.
#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Fragment")]
    fragment: String,
    #[tabled(rename = "Subject")]
    subject: String,
}

/// Change row for table display.
#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Name")]
    name: String,
}

/// Template row for table display.
#[derive(Tabled)]
struct FragmentRow {
    #[tabled(rename = "Fragment")]
    name: String,
    #[tabled(rename = "Subject")]
    subject: String,
    #[tabled(rename = "Arcs")]
    arcs: usize,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a planned message for display.
    #[must_use]
    pub fn format_plan(&self, message: &OutboundMessage) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(message).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(message),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(message: &OutboundMessage) -> String {
        let mut output = String::new();

        let _ = writeln!(
            output,
            "\nWorkflow for {} ({:?})",
            message.service_name.bold(),
            message.kind
        );
        let _ = writeln!(
            output,
            "   Definition hash: {}",
            Self::truncate(&message.definition_hash, 12)
        );
        let _ = writeln!(
            output,
            "   Templates: {}\n",
            Self::truncate(&message.workflow.template_version, 12)
        );

        let rows: Vec<StepRow> = message
            .workflow
            .fragments
            .iter()
            .enumerate()
            .map(|(i, f)| StepRow {
                index: i + 1,
                fragment: f.name.clone(),
                subject: f.subject.to_string(),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        output.push_str(&Self::format_changes_text(&message.changes));
        output
    }

    /// Formats a change set for display.
    #[must_use]
    pub fn format_changes(&self, changes: &ChangeSet) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(changes).unwrap_or_default(),
            OutputFormat::Text => Self::format_changes_text(changes),
        }
    }

    /// Formats a change set as text.
    fn format_changes_text(changes: &ChangeSet) -> String {
        if !changes.has_changes() {
            return format!(
                "{} No changes required - environment is up to date.\n",
                "✓".green()
            );
        }

        let mut rows = Vec::new();
        push_rows(&mut rows, "router", &changes.routers, |r| r.name.clone());
        push_rows(&mut rows, "network", &changes.networks, |n| n.name.clone());
        push_rows(&mut rows, "instance", &changes.instances, |i| i.name.clone());
        if changes.firewalls_changed {
            rows.push(ChangeRow {
                action: "replace".yellow().to_string(),
                kind: "firewalls",
                name: String::from("*"),
            });
        }
        if changes.nats_changed {
            rows.push(ChangeRow {
                action: "replace".yellow().to_string(),
                kind: "nats",
                name: String::from("*"),
            });
        }
        for job in changes
            .bootstraps_to_create
            .iter()
            .chain(&changes.executions_to_create)
        {
            rows.push(ChangeRow {
                action: "run".cyan().to_string(),
                kind: "execution",
                name: job.name.clone(),
            });
        }

        let mut output = String::new();
        output.push('\n');
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let counts = changes.counts();
        let _ = writeln!(
            output,
            "\nChanges: {} to create, {} to update, {} to delete",
            counts.creates.to_string().green(),
            counts.updates.to_string().yellow(),
            counts.deletes.to_string().red()
        );
        output
    }

    /// Formats a validation result for display.
    #[must_use]
    pub fn format_validation(
        &self,
        definition: &Definition,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&ValidationJson {
                name: &definition.name,
                valid: result.is_valid(),
                warnings: &result.warnings,
                routers: definition.routers.len(),
                instance_groups: definition.instances.len(),
                units: definition.total_units(),
            })
            .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(output, "{} Definition is valid!", "✓".green());
                if show_warnings && !result.warnings.is_empty() {
                    let _ = writeln!(output, "\n{} Warnings:", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }
                let _ = writeln!(output, "\nDefinition summary:");
                let _ = writeln!(output, "  Name: {}", definition.name);
                let _ = writeln!(output, "  Bootstrapping: {}", definition.bootstrapping);
                let _ = writeln!(output, "  Routers: {}", definition.routers.len());
                let _ = writeln!(output, "  Instance groups: {}", definition.instances.len());
                let _ = writeln!(output, "  Units: {}", definition.total_units());
                output
            }
        }
    }

    /// Formats the template registry for display.
    #[must_use]
    pub fn format_fragments(&self, registry: &TemplateRegistry) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&FragmentsJson {
                version: registry.version(),
                fragments: registry.fragments().map(|f| f.name.as_str()).collect(),
            })
            .unwrap_or_default(),
            OutputFormat::Text => {
                let rows: Vec<FragmentRow> = registry
                    .fragments()
                    .map(|f| FragmentRow {
                        name: f.name.clone(),
                        subject: f.subject.to_string(),
                        arcs: f.arcs.len(),
                    })
                    .collect();
                let mut output = Table::new(rows).to_string();
                let _ = write!(
                    output,
                    "\n\n{} templates, version {}\n",
                    registry.len(),
                    Self::truncate(registry.version(), 12)
                );
                output
            }
        }
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.len() <= max_len {
            s.to_string()
        } else {
            s.chars().take(max_len).collect()
        }
    }
}

/// Appends one row per record of a diff set.
fn push_rows<T>(
    rows: &mut Vec<ChangeRow>,
    kind: &'static str,
    diff: &crate::planner::DiffSet<T>,
    name: impl Fn(&T) -> String,
) {
    let groups = [
        ("create".green().to_string(), &diff.to_create),
        ("update".yellow().to_string(), &diff.to_update),
        ("delete".red().to_string(), &diff.to_delete),
    ];
    for (action, records) in groups {
        rows.extend(records.iter().map(|r| ChangeRow {
            action: action.clone(),
            kind,
            name: name(r),
        }));
    }
}

#[derive(Serialize)]
struct ValidationJson<'a> {
    name: &'a str,
    valid: bool,
    warnings: &'a [String],
    routers: usize,
    instance_groups: usize,
    units: u32,
}

#[derive(Serialize)]
struct FragmentsJson<'a> {
    version: &'a str,
    fragments: Vec<&'a str>,
}
