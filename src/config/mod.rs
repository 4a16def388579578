//! Process configuration.
//!
//! This module handles the settings the planning service runs with:
//! - Bus address and build store location
//! - Workflow template directory
//! - Completion settling delay and log format

mod settings;

pub use settings::{
    load_dotenv, parse_store_reply, LogFormat, Settings, StoreSettings, DEFAULT_DB_NAME,
    DEFAULT_NATS_URI, DEFAULT_SETTLE_MS,
};
