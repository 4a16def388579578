//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::LogFormat;

/// envmap - Planning service for declarative cloud environments.
#[derive(Parser, Debug)]
#[command(name = "envmap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Directory of workflow templates (defaults to the built-in set).
    #[arg(long, global = true, env = "ENVMAP_WORKFLOWS")]
    pub workflows: Option<PathBuf>,

    /// Log format (text, json); overrides `LOG_FORMAT`.
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve planning requests on the message bus.
    Serve,

    /// Plan the creation or update of an environment.
    Plan {
        /// Definition file (YAML or JSON).
        #[arg(short, long)]
        definition: PathBuf,

        /// Previously realized message to diff against.
        #[arg(short, long)]
        previous: Option<PathBuf>,

        /// Datacenter metadata file (YAML or JSON).
        #[arg(long)]
        datacenter: Option<PathBuf>,

        /// Service identifier.
        #[arg(long, default_value = "local")]
        service_id: String,
    },

    /// Plan the removal of a realized environment.
    Destroy {
        /// Realized message of the environment.
        #[arg(short, long)]
        previous: PathBuf,
    },

    /// Show the changes a definition would make.
    Diff {
        /// Definition file (YAML or JSON).
        #[arg(short, long)]
        definition: PathBuf,

        /// Previously realized message to diff against.
        #[arg(short, long)]
        previous: Option<PathBuf>,
    },

    /// Validate a definition.
    Validate {
        /// Definition file (YAML or JSON).
        #[arg(short, long)]
        definition: PathBuf,

        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// List the workflow templates in use.
    Fragments,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
