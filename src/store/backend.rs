//! Build store trait definition.
//!
//! This module defines the common interface for build storage backends.

use async_trait::async_trait;

use super::types::BuildRecord;
use crate::error::Result;
use crate::message::OutboundMessage;

/// Trait for build storage backends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BuildStore: Send + Sync {
    /// Loads the record of a service.
    ///
    /// Returns `None` if the service has no record yet.
    async fn get(&self, service_id: &str) -> Result<Option<BuildRecord>>;

    /// Saves a record, replacing any previous one.
    async fn save(&self, record: &BuildRecord) -> Result<()>;

    /// Deletes the record of a service.
    async fn delete(&self, service_id: &str) -> Result<()>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;

    /// Records a successful build.
    async fn mark_done(
        &self,
        service_id: &str,
        endpoint: Option<String>,
        build: Option<OutboundMessage>,
    ) -> Result<BuildRecord> {
        let mut record = self
            .get(service_id)
            .await?
            .unwrap_or_else(|| BuildRecord::new(service_id));
        record.record_done(endpoint, build);
        self.save(&record).await?;
        Ok(record)
    }

    /// Records a failed build.
    async fn mark_errored(&self, service_id: &str, error: String) -> Result<BuildRecord> {
        let mut record = self
            .get(service_id)
            .await?
            .unwrap_or_else(|| BuildRecord::new(service_id));
        record.record_error(error);
        self.save(&record).await?;
        Ok(record)
    }

    /// Returns the latest realized build of a service.
    async fn latest(&self, service_id: &str) -> Result<Option<OutboundMessage>> {
        Ok(self
            .get(service_id)
            .await?
            .and_then(|record| record.realized().cloned()))
    }
}

#[async_trait]
impl BuildStore for Box<dyn BuildStore> {
    async fn get(&self, service_id: &str) -> Result<Option<BuildRecord>> {
        (**self).get(service_id).await
    }

    async fn save(&self, record: &BuildRecord) -> Result<()> {
        (**self).save(record).await
    }

    async fn delete(&self, service_id: &str) -> Result<()> {
        (**self).delete(service_id).await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}
