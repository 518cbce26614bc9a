//! Status payload reported back to callers of `download_paper`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{LifecycleRecord, LifecycleState};

/// Status as seen by a caller; `Unknown` means nothing is tracked or stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Downloading,
    Converting,
    Success,
    Error,
    Unknown,
}

impl From<LifecycleState> for StatusKind {
    fn from(state: LifecycleState) -> Self {
        match state {
            LifecycleState::Downloading => StatusKind::Downloading,
            LifecycleState::Converting => StatusKind::Converting,
            LifecycleState::Success => StatusKind::Success,
            LifecycleState::Error => StatusKind::Error,
        }
    }
}

/// Result of an acquisition request or status poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionStatus {
    pub status: StatusKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AcquisitionStatus {
    fn bare(status: StatusKind, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            resource_uri: None,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Converted text is on disk
    pub fn ready(message: impl Into<String>, text_path: &Path) -> Self {
        Self::bare(StatusKind::Success, message).resource(text_path)
    }

    /// Nothing tracked and nothing stored
    pub fn unknown() -> Self {
        Self::bare(StatusKind::Unknown, "No download or conversion in progress")
    }

    /// The request failed before any state was kept
    pub fn failed(message: impl Into<String>) -> Self {
        Self::bare(StatusKind::Error, message)
    }

    /// Lookup of a paper that another request is already resolving
    pub fn pending_lookup() -> Self {
        Self::bare(StatusKind::Downloading, "Paper lookup already in progress")
    }

    /// Report a tracked record verbatim
    pub fn from_record(record: &LifecycleRecord) -> Self {
        let mut status = Self::bare(
            record.state.into(),
            format!("Paper conversion {}", record.state),
        );
        status.started_at = Some(record.started_at);
        status.completed_at = record.completed_at;
        status.error = record.error.clone();
        status
    }

    /// Attach the location of the text artifact
    pub fn resource(mut self, text_path: &Path) -> Self {
        self.resource_uri = Some(format!("file://{}", text_path.display()));
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}
