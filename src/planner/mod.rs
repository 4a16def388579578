//! Change planning.
//!
//! This module compares a target state with the previous state of the same
//! environment and produces the per-kind change sets the workflow builder
//! turns into a graph.

mod diff;
pub mod identity;
mod jobs;

pub use diff::{Baseline, ChangeCounts, ChangeSet, DiffEngine, DiffSet};
pub use identity::{fold_into_updates, partition, IdentityIndex, Keyed};
