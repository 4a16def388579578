//! Build persistence.
//!
//! One record per service holds the latest realized build, its status, the
//! endpoint and the last reported error. Backends:
//!
//! - `local`: JSON files on disk
//! - `memory`: process memory, for tests and ephemeral runs

mod backend;
mod local;
mod memory;
mod types;

pub use local::LocalBuildStore;
pub use memory::MemoryBuildStore;
pub use backend::BuildStore;
#[cfg(test)]
pub use backend::MockBuildStore;
pub use types::{BuildRecord, BuildStatus};
