//! Bus-facing service.
//!
//! - [`RequestHandler`] answers `mapping.get.<op>` requests
//! - [`CompletionHandler`] records `service.<op>.done|error` notifications
//! - [`BusServer`] wires both to an injected bus client

mod bus;
mod completion;
mod handler;

pub use bus::{connect, subscriptions, BusServer, Inbound};
pub use completion::{parse_completion_subject, CompletionHandler, Outcome, Publication};
pub use handler::{error_body, RequestHandler};

/// Completion notification patterns.
pub const COMPLETION_SUBJECTS: [&str; 2] = ["service.*.done", "service.*.error"];

/// Subject an imported mapping is re-published on.
pub const MAPPING_SUBJECT: &str = "build.set.mapping";

/// Subject an imported service's derived definition is re-published on.
pub const DEFINITION_SUBJECT: &str = "definition.set.definition";

/// Subject used to fetch store settings when they are not configured locally.
pub const STORE_CONFIG_SUBJECT: &str = "config.get.store";
