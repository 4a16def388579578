//! CLI module for the envmap planning service.
//!
//! This module provides the command-line interface for serving planning
//! requests and running them offline.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
