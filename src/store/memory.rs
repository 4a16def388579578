//! In-memory build storage for tests and ephemeral runs.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::Result;

use super::backend::BuildStore;
use super::types::BuildRecord;

/// Build store that keeps records in process memory.
#[derive(Debug, Default)]
pub struct MemoryBuildStore {
    records: RwLock<HashMap<String, BuildRecord>>,
}

impl MemoryBuildStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if no record is stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl BuildStore for MemoryBuildStore {
    async fn get(&self, service_id: &str) -> Result<Option<BuildRecord>> {
        Ok(self.records.read().await.get(service_id).cloned())
    }

    async fn save(&self, record: &BuildRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.service_id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, service_id: &str) -> Result<()> {
        self.records.write().await.remove(service_id);
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
