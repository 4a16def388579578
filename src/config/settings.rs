//! Process settings.
//!
//! Settings come from the environment, optionally seeded from a `.env` file.
//! Store settings may be absent locally; the service then asks the bus for
//! them once at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{BusError, ConfigError, EnvmapError, Result};
use crate::service::STORE_CONFIG_SUBJECT;

/// Default bus address.
pub const DEFAULT_NATS_URI: &str = "nats://127.0.0.1:4222";

/// Default store namespace.
pub const DEFAULT_DB_NAME: &str = "envmap";

/// Default settling delay for completion updates, in milliseconds.
pub const DEFAULT_SETTLE_MS: u64 = 200;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Build store location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Directory the store writes to.
    pub uri: String,
    /// Namespace inside the directory.
    #[serde(default = "default_db_name")]
    pub name: String,
}

fn default_db_name() -> String {
    String::from(DEFAULT_DB_NAME)
}

/// Settings for the planning service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Bus address.
    pub nats_uri: String,
    /// Store location, when configured locally.
    pub store: Option<StoreSettings>,
    /// Template directory; built-in templates when unset.
    pub workflows: Option<PathBuf>,
    /// Delay before completion notifications are recorded.
    pub settle: Duration,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            nats_uri: String::from(DEFAULT_NATS_URI),
            store: None,
            workflows: None,
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            log_format: LogFormat::Text,
        }
    }
}

impl Settings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable has an unusable value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through a variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable has an unusable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(uri) = lookup("NATS_URI") {
            settings.nats_uri = uri;
        }

        if let Some(uri) = lookup("DB_URI") {
            settings.store = Some(StoreSettings {
                uri,
                name: lookup("DB_NAME").unwrap_or_else(default_db_name),
            });
        }

        settings.workflows = lookup("ENVMAP_WORKFLOWS").map(PathBuf::from);

        if let Some(ms) = lookup("ENVMAP_SETTLE_MS") {
            let ms: u64 = ms.trim().parse().map_err(|e| ConfigError::InvalidValue {
                name: String::from("ENVMAP_SETTLE_MS"),
                message: format!("{e}"),
            })?;
            settings.settle = Duration::from_millis(ms);
        }

        if let Some(format) = lookup("LOG_FORMAT") {
            settings.log_format = match format.to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                other => {
                    return Err(ConfigError::InvalidValue {
                        name: String::from("LOG_FORMAT"),
                        message: format!("expected 'text' or 'json', got '{other}'"),
                    }
                    .into());
                }
            };
        }

        Ok(settings)
    }

    /// Returns the store settings, asking the bus when none are configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus request fails or its reply is unusable.
    pub async fn resolve_store(&self, client: &async_nats::Client) -> Result<StoreSettings> {
        if let Some(store) = &self.store {
            return Ok(store.clone());
        }

        info!("DB_URI not set, requesting store settings on {STORE_CONFIG_SUBJECT}");
        let reply = client
            .request(STORE_CONFIG_SUBJECT, Vec::<u8>::new().into())
            .await
            .map_err(|e| BusError::RequestFailed {
                subject: String::from(STORE_CONFIG_SUBJECT),
                message: e.to_string(),
            })?;

        parse_store_reply(&reply.payload)
    }
}

/// Parses a `config.get.store` reply.
///
/// # Errors
///
/// Returns an error if the reply is not a store settings object.
pub fn parse_store_reply(payload: &[u8]) -> Result<StoreSettings> {
    serde_json::from_slice(payload)
        .map_err(|e| BusError::invalid_payload(STORE_CONFIG_SUBJECT, e.to_string()).into())
}

/// Loads a `.env` file if present.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be loaded.
pub fn load_dotenv(base: Option<&Path>) -> Result<()> {
    let env_path = base.map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

    if env_path.exists() {
        info!("Loading environment from: {}", env_path.display());
        dotenvy::from_path(&env_path).map_err(|e| {
            EnvmapError::Config(ConfigError::LoadFailed {
                path: env_path.clone(),
                message: e.to_string(),
            })
        })?;
    } else {
        debug!(".env file not found at: {}", env_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.settle, Duration::from_millis(200));
        assert!(settings.store.is_none());
    }

    #[test]
    fn test_full_environment() {
        let settings = Settings::from_lookup(lookup(&[
            ("NATS_URI", "nats://bus:4222"),
            ("DB_URI", "/var/lib/envmap"),
            ("DB_NAME", "prod"),
            ("ENVMAP_WORKFLOWS", "/etc/envmap/workflows"),
            ("ENVMAP_SETTLE_MS", "50"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(settings.nats_uri, "nats://bus:4222");
        assert_eq!(
            settings.store,
            Some(StoreSettings {
                uri: String::from("/var/lib/envmap"),
                name: String::from("prod"),
            })
        );
        assert_eq!(settings.workflows, Some(PathBuf::from("/etc/envmap/workflows")));
        assert_eq!(settings.settle, Duration::from_millis(50));
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn test_db_name_defaults() {
        let settings = Settings::from_lookup(lookup(&[("DB_URI", "/tmp/envmap")])).unwrap();
        assert_eq!(settings.store.unwrap().name, "envmap");
    }

    #[test]
    fn test_invalid_values() {
        assert!(Settings::from_lookup(lookup(&[("ENVMAP_SETTLE_MS", "soon")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).is_err());
    }

    #[test]
    fn test_store_reply() {
        let store = parse_store_reply(br#"{"uri":"/data"}"#).unwrap();
        assert_eq!(store.name, "envmap");
        assert!(parse_store_reply(b"[]").is_err());
    }

    #[test]
    fn test_dotenv_missing_is_ok() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(load_dotenv(Some(dir.path())).is_ok());
    }
}
