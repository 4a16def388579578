//! Planning request handling.
//!
//! The handler turns one request body into one response body. Failures are
//! reported in the body as `{"error": "..."}`; the caller never has to
//! distinguish transport from planning errors.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{BusError, Result, StoreError};
use crate::mapper::Mapper;
use crate::message::{Operation, Request};
use crate::model::Previous;
use crate::store::BuildStore;

/// Handles planning requests against the build store.
#[derive(Clone)]
pub struct RequestHandler {
    /// Planning pipeline.
    mapper: Mapper,
    /// Realized builds.
    store: Arc<dyn BuildStore>,
}

impl std::fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandler")
            .field("mapper", &self.mapper)
            .field("store", &self.store.backend_type())
            .finish()
    }
}

impl RequestHandler {
    /// Creates a new handler.
    #[must_use]
    pub fn new(mapper: Mapper, store: Arc<dyn BuildStore>) -> Self {
        Self { mapper, store }
    }

    /// Handles a request and always produces a response body.
    pub async fn handle(&self, operation: Operation, payload: &[u8]) -> Vec<u8> {
        match self.process(operation, payload).await {
            Ok(body) => body.into_bytes(),
            Err(e) => {
                warn!("Request on {} failed: {e}", operation.subject());
                error_body(&e.to_string())
            }
        }
    }

    /// Runs a request and returns the serialized result.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is malformed, the baseline cannot be
    /// loaded, or planning fails.
    pub async fn process(&self, operation: Operation, payload: &[u8]) -> Result<String> {
        let request: Request = serde_json::from_slice(payload)
            .map_err(|e| BusError::invalid_payload(operation.subject(), e.to_string()))?;

        info!("Received {operation} request for service {}", request.id);

        let previous = self.previous(&request).await?;
        debug!(
            "Baseline for {}: {}",
            request.id,
            if previous.is_present() { "existing" } else { "none" }
        );

        match operation {
            Operation::Create | Operation::Update => {
                self.mapper.create(&request, &previous)?.to_json()
            }
            Operation::Delete => match previous {
                Previous::Present(previous) => self.mapper.delete(&request, *previous)?.to_json(),
                Previous::Absent => Err(StoreError::NotFound {
                    service_id: request.baseline_id().to_string(),
                }
                .into()),
            },
            Operation::Import => self.mapper.import(&request)?.to_json(),
            Operation::Diff => {
                let changes = self.mapper.diff(&request, &previous)?;
                serde_json::to_string(&changes).map_err(|e| {
                    StoreError::serialization(format!("Failed to encode changes: {e}")).into()
                })
            }
        }
    }

    /// Loads the baseline of a request.
    async fn previous(&self, request: &Request) -> Result<Previous> {
        let latest = self.store.latest(request.baseline_id()).await?;
        Previous::from_message(latest.as_ref())
    }
}

/// Builds an error response body.
#[must_use]
pub fn error_body(message: &str) -> Vec<u8> {
    serde_json::json!({ "error": message }).to_string().into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnvmapError;
    use crate::message::OutboundMessage;
    use crate::planner::ChangeSet;
    use crate::store::{MemoryBuildStore, MockBuildStore};
    use crate::workflow::{BuildKind, TemplateRegistry};

    const DEFINITION: &str = "name: demo\nrouters:\n  - name: gw\n    networks:\n      - name: web\n        subnet: 10.1.0.0/24\ninstances:\n  - name: web\n    image: ubuntu-1404\n    count: 1\n    memory: 1GB\n    networks:\n      name: web\n      start: 10.1.0.11\n";

    fn mapper() -> Mapper {
        Mapper::new(Arc::new(TemplateRegistry::builtin().unwrap()))
    }

    fn body(definition: &str) -> Vec<u8> {
        serde_json::json!({
            "id": "svc-1",
            "client_id": "client-1",
            "client_name": "acme",
            "name": "demo",
            "datacenter": { "name": "dc1", "type": "fake" },
            "definition": definition,
        })
        .to_string()
        .into_bytes()
    }

    fn error_of(response: &[u8]) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(response).unwrap();
        value.get("error").and_then(|e| e.as_str()).map(String::from)
    }

    #[tokio::test]
    async fn test_create_without_baseline() {
        let handler = RequestHandler::new(mapper(), Arc::new(MemoryBuildStore::new()));

        let response = handler.handle(Operation::Create, &body(DEFINITION)).await;
        let message = OutboundMessage::from_json("test", &response).unwrap();

        assert_eq!(message.kind, BuildKind::Create);
        assert_eq!(message.service_id, "svc-1");
        assert!(message.previous.is_none());
    }

    #[tokio::test]
    async fn test_update_uses_realized_build() {
        let store = Arc::new(MemoryBuildStore::new());
        let handler = RequestHandler::new(mapper(), store.clone());

        let first = handler.handle(Operation::Create, &body(DEFINITION)).await;
        let first = OutboundMessage::from_json("test", &first).unwrap();
        store
            .mark_done("svc-1", Some(String::from("172.16.0.10")), Some(first))
            .await
            .unwrap();

        let response = handler.handle(Operation::Update, &body(DEFINITION)).await;
        let message = OutboundMessage::from_json("test", &response).unwrap();

        assert!(!message.changes.has_changes());
        assert_eq!(message.endpoint.as_deref(), Some("172.16.0.10"));
        assert!(message.previous.is_some());
    }

    #[tokio::test]
    async fn test_delete_without_baseline_fails() {
        let handler = RequestHandler::new(mapper(), Arc::new(MemoryBuildStore::new()));

        let err = handler
            .process(Operation::Delete, &body(""))
            .await
            .unwrap_err();
        assert!(matches!(err, EnvmapError::Store(StoreError::NotFound { .. })));

        let response = handler.handle(Operation::Delete, &body("")).await;
        assert!(error_of(&response).unwrap().contains("svc-1"));
    }

    #[tokio::test]
    async fn test_diff_returns_change_set() {
        let handler = RequestHandler::new(mapper(), Arc::new(MemoryBuildStore::new()));

        let response = handler.handle(Operation::Diff, &body(DEFINITION)).await;
        let changes: ChangeSet = serde_json::from_slice(&response).unwrap();
        assert_eq!(changes.counts().creates, 3);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let handler = RequestHandler::new(mapper(), Arc::new(MemoryBuildStore::new()));

        let response = handler.handle(Operation::Create, b"not json").await;
        assert!(error_of(&response).unwrap().contains("mapping.get.create"));
    }

    #[tokio::test]
    async fn test_invalid_definition_reported_once() {
        let handler = RequestHandler::new(mapper(), Arc::new(MemoryBuildStore::new()));

        let response = handler
            .handle(Operation::Create, &body(&DEFINITION.replace("count: 1", "count: 0")))
            .await;
        assert!(error_of(&response).is_some());
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let mut store = MockBuildStore::new();
        store.expect_latest().returning(|_| {
            Err(StoreError::Corrupted {
                message: String::from("disk gone"),
            }
            .into())
        });

        let handler = RequestHandler::new(mapper(), Arc::new(store));
        let response = handler.handle(Operation::Create, &body(DEFINITION)).await;
        assert!(error_of(&response).unwrap().contains("disk gone"));
    }
}
