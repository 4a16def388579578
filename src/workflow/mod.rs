//! Workflow graphs.
//!
//! This module holds the fragment model, the immutable template registry
//! fragments are drawn from, and the builder that turns change sets into
//! ordered graphs.

mod builder;
mod fragment;
mod graph;
mod registry;

pub use builder::{BuildKind, Gate, GraphBuilder, Stage, CREATE_STAGES, DELETE_STAGES, UPDATE_STAGES};
pub use fragment::{Subject, WorkflowArc, WorkflowFragment};
pub use graph::{FragmentRef, WorkflowGraph};
pub use registry::TemplateRegistry;
