//! Completion notifications from the execution fleet.
//!
//! `service.<op>.done` and `service.<op>.error` update the service's build
//! record after a settling delay. A completed import additionally yields the
//! realized mapping and a definition derived from it, to be re-published.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::definition::derive_definition;
use crate::error::{BusError, Result, StoreError};
use crate::message::{Operation, OutboundMessage};
use crate::store::BuildStore;

use super::{DEFINITION_SUBJECT, MAPPING_SUBJECT};

/// Outcome carried by a completion subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The build was realized.
    Done,
    /// The build failed.
    Error,
}

/// A message to publish once a completion has been recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    /// Target subject.
    pub subject: String,
    /// Message body.
    pub payload: Vec<u8>,
}

/// Parses `service.<op>.done|error`.
#[must_use]
pub fn parse_completion_subject(subject: &str) -> Option<(Operation, Outcome)> {
    let rest = subject.strip_prefix("service.")?;
    let (op, outcome) = rest.split_once('.')?;
    let operation = Operation::ALL.into_iter().find(|o| o.as_str() == op)?;
    let outcome = match outcome {
        "done" => Outcome::Done,
        "error" => Outcome::Error,
        _ => return None,
    };
    Some((operation, outcome))
}

/// Records completion notifications in the build store.
#[derive(Clone)]
pub struct CompletionHandler {
    /// Realized builds.
    store: Arc<dyn BuildStore>,
    /// Delay before a notification is recorded.
    settle: Duration,
}

impl std::fmt::Debug for CompletionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHandler")
            .field("store", &self.store.backend_type())
            .field("settle", &self.settle)
            .finish()
    }
}

impl CompletionHandler {
    /// Creates a new completion handler.
    #[must_use]
    pub fn new(store: Arc<dyn BuildStore>, settle: Duration) -> Self {
        Self { store, settle }
    }

    /// Handles one notification and returns what must be re-published.
    ///
    /// # Errors
    ///
    /// Returns an error if the subject or body is malformed, or the store
    /// cannot be updated.
    pub async fn handle(&self, subject: &str, payload: &[u8]) -> Result<Vec<Publication>> {
        let (operation, outcome) = parse_completion_subject(subject)
            .ok_or_else(|| BusError::invalid_payload(subject, "not a completion subject"))?;

        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        match outcome {
            Outcome::Error => {
                self.record_error(subject, payload).await?;
                Ok(Vec::new())
            }
            Outcome::Done => self.record_done(subject, operation, payload).await,
        }
    }

    async fn record_error(&self, subject: &str, payload: &[u8]) -> Result<()> {
        let body: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| BusError::invalid_payload(subject, e.to_string()))?;

        let service_id = body
            .get("service_id")
            .or_else(|| body.get("id"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| BusError::invalid_payload(subject, "missing service id"))?;
        let error = body
            .get("error")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown error");

        warn!("Build of service {service_id} failed: {error}");
        self.store
            .mark_errored(service_id, error.to_string())
            .await?;
        Ok(())
    }

    async fn record_done(
        &self,
        subject: &str,
        operation: Operation,
        payload: &[u8],
    ) -> Result<Vec<Publication>> {
        let message = OutboundMessage::from_json(subject, payload)?;
        let service_id = message.service_id.clone();

        if operation == Operation::Delete {
            info!("Service {service_id} removed");
            self.store.delete(&service_id).await?;
            return Ok(Vec::new());
        }

        let endpoint = message
            .endpoint
            .clone()
            .or_else(|| message.service_ip.clone());
        let record = self
            .store
            .mark_done(&service_id, endpoint, Some(message))
            .await?;
        info!(
            "Service {service_id} realized (endpoint: {})",
            record.endpoint.as_deref().unwrap_or("-")
        );

        if operation != Operation::Import {
            return Ok(Vec::new());
        }

        let Some(build) = record.build else {
            return Ok(Vec::new());
        };
        let definition = derive_definition(&build.state);
        debug!("Re-publishing imported service {service_id}");

        Ok(vec![
            publication(
                MAPPING_SUBJECT,
                &serde_json::json!({ "id": service_id, "mapping": build }),
            )?,
            publication(
                DEFINITION_SUBJECT,
                &serde_json::json!({ "id": service_id, "definition": definition }),
            )?,
        ])
    }
}

fn publication(subject: &str, body: &serde_json::Value) -> Result<Publication> {
    let payload = serde_json::to_vec(body)
        .map_err(|e| StoreError::serialization(format!("Failed to encode {subject}: {e}")))?;
    Ok(Publication {
        subject: subject.to_string(),
        payload,
    })
}
