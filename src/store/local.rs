//! Local file-based build storage backend.
//!
//! Records live at `<base>/<namespace>/<service_id>.json`, one file per
//! service.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{Result, StoreError};

use super::backend::BuildStore;
use super::types::BuildRecord;

/// Local file-based build store.
#[derive(Debug, Clone)]
pub struct LocalBuildStore {
    /// Directory holding the namespace's records.
    dir: PathBuf,
}

impl LocalBuildStore {
    /// Creates a store rooted at `base`, scoped to `namespace`.
    #[must_use]
    pub fn new(base: impl AsRef<Path>, namespace: &str) -> Self {
        Self {
            dir: base.as_ref().join(namespace),
        }
    }

    /// Returns the directory holding the records.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolves the file path of a service's record.
    fn record_path(&self, service_id: &str) -> Result<PathBuf> {
        let valid = !service_id.is_empty()
            && service_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey {
                service_id: service_id.to_string(),
            }
            .into());
        }
        Ok(self.dir.join(format!("{service_id}.json")))
    }

    /// Ensures the namespace directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if !fs::try_exists(&self.dir).await.unwrap_or(false) {
            debug!("Creating build directory: {}", self.dir.display());
            fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| StoreError::write(format!("Failed to create build directory: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl BuildStore for LocalBuildStore {
    async fn get(&self, service_id: &str) -> Result<Option<BuildRecord>> {
        let path = self.record_path(service_id)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            debug!("No build record at {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await.map_err(|e| StoreError::Corrupted {
            message: format!("Failed to read build record: {e}"),
        })?;

        let record: BuildRecord =
            serde_json::from_str(&content).map_err(|e| StoreError::Corrupted {
                message: format!("Failed to parse build record: {e}"),
            })?;

        Ok(Some(record))
    }

    async fn save(&self, record: &BuildRecord) -> Result<()> {
        let path = self.record_path(&record.service_id)?;
        self.ensure_dir().await?;

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| StoreError::serialization(format!("Failed to serialize record: {e}")))?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| StoreError::write(format!("Failed to create temp record file: {e}")))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StoreError::write(format!("Failed to write record file: {e}")))?;

        file.sync_all()
            .await
            .map_err(|e| StoreError::write(format!("Failed to sync record file: {e}")))?;

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| StoreError::write(format!("Failed to rename record file: {e}")))?;

        info!(
            "Saved build record for {} ({})",
            record.service_id, record.status
        );
        Ok(())
    }

    async fn delete(&self, service_id: &str) -> Result<()> {
        let path = self.record_path(service_id)?;
        if fs::try_exists(&path).await.unwrap_or(false) {
            info!("Deleting build record: {}", path.display());
            fs::remove_file(&path)
                .await
                .map_err(|e| StoreError::write(format!("Failed to delete record file: {e}")))?;
        }
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnvmapError;
    use crate::store::BuildStatus;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_record_is_none() {
        let dir = TempDir::new().unwrap();
        let store = LocalBuildStore::new(dir.path(), "envmap");
        assert!(store.get("svc-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = LocalBuildStore::new(dir.path(), "envmap");

        store
            .mark_done("svc-1", Some(String::from("172.16.0.10")), None)
            .await
            .unwrap();

        let record = store.get("svc-1").await.unwrap().unwrap();
        assert_eq!(record.status, BuildStatus::Done);
        assert_eq!(record.endpoint.as_deref(), Some("172.16.0.10"));
        assert!(dir.path().join("envmap").join("svc-1.json").exists());
        assert!(!dir.path().join("envmap").join("svc-1.tmp").exists());
    }

    #[tokio::test]
    async fn test_error_keeps_endpoint() {
        let dir = TempDir::new().unwrap();
        let store = LocalBuildStore::new(dir.path(), "envmap");

        store
            .mark_done("svc-1", Some(String::from("172.16.0.10")), None)
            .await
            .unwrap();
        store
            .mark_errored("svc-1", String::from("boom"))
            .await
            .unwrap();

        let record = store.get("svc-1").await.unwrap().unwrap();
        assert_eq!(record.status, BuildStatus::Errored);
        assert_eq!(record.endpoint.as_deref(), Some("172.16.0.10"));
        assert_eq!(record.last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = TempDir::new().unwrap();
        let store = LocalBuildStore::new(dir.path(), "envmap");
        store.save(&BuildRecord::new("svc-1")).await.unwrap();

        store.delete("svc-1").await.unwrap();
        assert!(store.get("svc-1").await.unwrap().is_none());
        store.delete("svc-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = TempDir::new().unwrap();
        let store = LocalBuildStore::new(dir.path(), "envmap");

        let err = store.get("../escape").await.unwrap_err();
        assert!(matches!(
            err,
            EnvmapError::Store(StoreError::InvalidKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_corrupted_record() {
        let dir = TempDir::new().unwrap();
        let store = LocalBuildStore::new(dir.path(), "envmap");
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.dir().join("svc-1.json"), "not json").unwrap();

        let err = store.get("svc-1").await.unwrap_err();
        assert!(matches!(err, EnvmapError::Store(StoreError::Corrupted { .. })));
    }
}
