//! Target and previous state model.
//!
//! This module holds the normalized records the diff engine compares and the
//! explicit baseline type that tells it whether an environment already exists.

mod previous;
mod state;
mod types;

pub use previous::{Previous, PreviousState};
pub use state::{ServiceIdentity, TargetState};
pub use types::{
    Bootstrapping, Datacenter, Execution, ExecutionPurpose, Firewall, FirewallRule, Instance,
    Nat, NatKind, NatRule, Network, Router, RouterStatus,
};
