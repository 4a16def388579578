//! Outbound messages and inbound requests.
//!
//! An [`OutboundMessage`] is the single artifact a planning request
//! produces. It is built fresh per request and never modified afterwards.

mod assembler;
mod request;

pub use assembler::MessageAssembler;
pub use request::{Operation, Request};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BusError, Result};
use crate::model::{Bootstrapping, Datacenter, TargetState};
use crate::planner::ChangeSet;
use crate::workflow::{BuildKind, WorkflowGraph};

/// The result of a planning request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Message identifier.
    pub id: Uuid,
    /// Service identifier.
    pub service_id: String,
    /// Owning client identifier.
    pub client_id: String,
    /// Owning client name.
    pub client_name: String,
    /// Service name.
    pub service_name: String,
    /// Kind of graph the message carries.
    pub kind: BuildKind,
    /// Datacenter metadata.
    pub datacenter: Datacenter,
    /// Provisioning mechanism.
    pub bootstrapping: Bootstrapping,
    /// Public, service-facing address.
    pub service_ip: Option<String>,
    /// Address of the bootstrapping master.
    pub management_ip: Option<String>,
    /// Externally visible endpoint, once known.
    pub endpoint: Option<String>,
    /// Fingerprint of the definition the message was planned from.
    pub definition_hash: String,
    /// Normalized target state.
    pub state: TargetState,
    /// Per-kind changes.
    pub changes: ChangeSet,
    /// Graph to execute.
    pub workflow: WorkflowGraph,
    /// Serialized previous message, on update and delete.
    #[serde(default)]
    pub previous: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl OutboundMessage {
    /// Parses a message from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a valid message.
    pub fn from_json(subject: &str, payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| BusError::invalid_payload(subject, e.to_string()).into())
    }

    /// Serializes the message to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            crate::error::StoreError::serialization(format!("Failed to encode message: {e}"))
                .into()
        })
    }
}
