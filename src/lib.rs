// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # envmap planner
//!
//! The planning stage of a declarative environment orchestration pipeline.
//!
//! ## Overview
//!
//! Given a desired-state definition of a cloud environment (routers,
//! networks, instances, firewall and NAT rules, provisioning scripts) and,
//! when the environment already exists, its last realized state, the planner
//! produces:
//!
//! - the fully normalized **target state**
//! - the minimal per-kind **change sets** between realized and target state
//! - an ordered, deduplicated **workflow graph** for the execution fleet
//!
//! ## Architecture
//!
//! 1. **Definition**: parsed from YAML or JSON and validated
//! 2. **Normalizer**: resolves names and addresses into target-state records
//! 3. **Diff engine**: partitions records into create, update and delete sets
//! 4. **Graph builder**: selects workflow fragments from an immutable registry
//! 5. **Assembler**: packs everything into one outbound message
//!
//! ## Modules
//!
//! - [`definition`]: Definition parsing, validation, hashing and derivation
//! - [`model`]: Target and previous state records
//! - [`normalizer`]: Definition to target-state normalization
//! - [`planner`]: Diff computation
//! - [`workflow`]: Fragment registry and graph building
//! - [`message`]: Requests and outbound messages
//! - [`mapper`]: The per-operation planning pipeline
//! - [`store`]: Build storage backends (local, memory)
//! - [`service`]: Message bus handlers and server
//! - [`config`]: Process settings
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! name: demo
//! bootstrapping: none
//! routers:
//!   - name: gw
//!     networks:
//!       - name: web
//!         subnet: 10.1.0.0/24
//! instances:
//!   - name: web
//!     image: ubuntu-1404
//!     count: 2
//!     memory: 1GB
//!     networks:
//!       name: web
//!       start: 10.1.0.11
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod definition;
pub mod error;
pub mod mapper;
pub mod message;
pub mod model;
pub mod normalizer;
pub mod planner;
pub mod service;
pub mod store;
pub mod workflow;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::Settings;
pub use definition::{Definition, DefinitionParser, DefinitionValidator};
pub use error::{EnvmapError, Result};
pub use mapper::Mapper;
pub use message::{OutboundMessage, Request};
pub use model::{Previous, PreviousState, TargetState};
pub use normalizer::Normalizer;
pub use planner::{ChangeSet, DiffEngine};
pub use service::{BusServer, CompletionHandler, RequestHandler};
pub use store::{BuildStore, LocalBuildStore, MemoryBuildStore};
pub use workflow::{GraphBuilder, TemplateRegistry, WorkflowGraph};
