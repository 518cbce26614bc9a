//! Acquisition lifecycle state and records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage of a paper's download and conversion
///
/// `downloading → converting → {success | error}`. There is no way back out
/// of a terminal state; a fresh acquisition starts from a new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Downloading,
    Converting,
    Success,
    Error,
}

impl LifecycleState {
    /// Whether the state is final
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Success | LifecycleState::Error)
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// Same-state transitions are accepted as no-ops.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Downloading, Converting | Success | Error) => true,
            (Converting, Success | Error) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Downloading => "downloading",
            LifecycleState::Converting => "converting",
            LifecycleState::Success => "success",
            LifecycleState::Error => "error",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracked acquisition state of one paper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleRecord {
    pub paper_id: String,
    pub state: LifecycleState,
    /// Human-readable title, known once the repository returned metadata
    pub title: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Set once, on entering `success` or `error`
    pub completed_at: Option<DateTime<Utc>>,
    /// Set only on entering `error`
    pub error: Option<String>,
}

impl LifecycleRecord {
    /// A fresh record in `downloading`
    pub fn new(paper_id: impl Into<String>, title: Option<String>) -> Self {
        Self {
            paper_id: paper_id.into(),
            state: LifecycleState::Downloading,
            title,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }
}
