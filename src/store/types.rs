//! Build record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::OutboundMessage;

/// Status of the latest build of a service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    /// No outcome reported yet.
    #[default]
    Pending,
    /// Realized successfully.
    Done,
    /// Failed during execution.
    Errored,
}

/// One row per service: the latest build and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Service identifier.
    pub service_id: String,
    /// Status of the latest build.
    pub status: BuildStatus,
    /// Externally visible endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Latest build message.
    #[serde(default)]
    pub build: Option<OutboundMessage>,
    /// Last error reported for the service.
    #[serde(default)]
    pub last_error: Option<String>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl BuildRecord {
    /// Creates an empty pending record.
    #[must_use]
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            status: BuildStatus::Pending,
            endpoint: None,
            build: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    /// Records a successful build.
    ///
    /// The endpoint is kept when the notification does not carry one.
    pub fn record_done(&mut self, endpoint: Option<String>, build: Option<OutboundMessage>) {
        self.status = BuildStatus::Done;
        if endpoint.is_some() {
            self.endpoint = endpoint;
        }
        if let Some(mut build) = build {
            build.endpoint.clone_from(&self.endpoint);
            self.build = Some(build);
        }
        self.last_error = None;
        self.updated_at = Utc::now();
    }

    /// Records a failed build.
    pub fn record_error(&mut self, error: impl Into<String>) {
        self.status = BuildStatus::Errored;
        self.last_error = Some(error.into());
        self.updated_at = Utc::now();
    }

    /// Returns the latest realized build.
    ///
    /// Builds are only recorded on success, so a later failure leaves the
    /// last realized build in place.
    #[must_use]
    pub const fn realized(&self) -> Option<&OutboundMessage> {
        self.build.as_ref()
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Errored => "errored",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_done_keeps_endpoint_when_missing() {
        let mut record = BuildRecord::new("svc-1");
        record.record_done(Some(String::from("172.16.0.10")), None);
        record.record_done(None, None);
        assert_eq!(record.endpoint.as_deref(), Some("172.16.0.10"));
        assert_eq!(record.status, BuildStatus::Done);
    }

    #[test]
    fn test_error_then_done_clears_error() {
        let mut record = BuildRecord::new("svc-1");
        record.record_error("boom");
        assert_eq!(record.status, BuildStatus::Errored);
        assert!(record.realized().is_none());
        assert_eq!(record.last_error.as_deref(), Some("boom"));

        record.record_done(None, None);
        assert!(record.last_error.is_none());
    }
}
