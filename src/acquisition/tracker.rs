//! Lifecycle Tracker: the single authority on what is happening with each paper.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::models::{LifecycleRecord, LifecycleState};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Paper {0} is already tracked")]
    AlreadyTracked(String),

    #[error("Paper {0} is not tracked")]
    NotTracked(String),

    #[error("Paper {paper_id} cannot move from {from} to {to}")]
    InvalidTransition {
        paper_id: String,
        from: LifecycleState,
        to: LifecycleState,
    },
}

/// In-process map from paper identifier to its lifecycle record.
///
/// Every operation holds the map lock for its whole duration, so `create` is
/// an atomic check-and-insert and at most one record exists per identifier.
/// Callers get clones; records are only mutated through this type.
#[derive(Debug, Default)]
pub struct LifecycleTracker {
    records: Mutex<HashMap<String, LifecycleRecord>>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, LifecycleRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, paper_id: &str) -> Option<LifecycleRecord> {
        self.records().get(paper_id).cloned()
    }

    /// Register a new record in `downloading`
    pub fn create(
        &self,
        paper_id: &str,
        title: Option<String>,
    ) -> Result<LifecycleRecord, TrackerError> {
        let mut records = self.records();
        if records.contains_key(paper_id) {
            return Err(TrackerError::AlreadyTracked(paper_id.to_string()));
        }

        let record = LifecycleRecord::new(paper_id, title);
        records.insert(paper_id.to_string(), record.clone());
        tracing::info!(paper_id, "Acquisition started");
        Ok(record)
    }

    /// Move a record to `state`.
    ///
    /// Entering `success` or `error` stamps `completed_at`; `error_detail` is
    /// kept only when entering `error`.
    pub fn transition(
        &self,
        paper_id: &str,
        state: LifecycleState,
        error_detail: Option<String>,
    ) -> Result<LifecycleRecord, TrackerError> {
        let mut records = self.records();
        let record = records
            .get_mut(paper_id)
            .ok_or_else(|| TrackerError::NotTracked(paper_id.to_string()))?;

        if !record.state.can_transition_to(state) {
            return Err(TrackerError::InvalidTransition {
                paper_id: paper_id.to_string(),
                from: record.state,
                to: state,
            });
        }

        if record.state != state {
            record.state = state;
            if state.is_terminal() {
                record.completed_at = Some(Utc::now());
            }
            if state == LifecycleState::Error {
                record.error = error_detail;
            }
            tracing::info!(paper_id, state = %state, "Lifecycle transition");
        }

        Ok(record.clone())
    }

    /// Drop a record so that a fresh acquisition can start
    pub fn remove(&self, paper_id: &str) -> Option<LifecycleRecord> {
        self.records().remove(paper_id)
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_starts_downloading() {
        let tracker = LifecycleTracker::new();
        let record = tracker.create("1", Some("Title".to_string())).unwrap();

        assert_eq!(record.state, LifecycleState::Downloading);
        assert_eq!(record.title.as_deref(), Some("Title"));
        assert!(record.completed_at.is_none());
        assert_eq!(tracker.get("1"), Some(record));
    }

    #[test]
    fn test_duplicate_create_fails() {
        let tracker = LifecycleTracker::new();
        tracker.create("1", None).unwrap();

        assert_eq!(
            tracker.create("1", None),
            Err(TrackerError::AlreadyTracked("1".to_string()))
        );
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_transition_to_success_stamps_completion() {
        let tracker = LifecycleTracker::new();
        let created = tracker.create("1", None).unwrap();

        let converting = tracker.transition("1", LifecycleState::Converting, None).unwrap();
        assert!(converting.completed_at.is_none());

        let done = tracker
            .transition("1", LifecycleState::Success, Some("ignored".to_string()))
            .unwrap();
        assert!(done.completed_at.is_some());
        assert!(done.error.is_none());
        assert_eq!(done.started_at, created.started_at);
    }

    #[test]
    fn test_transition_to_error_keeps_detail() {
        let tracker = LifecycleTracker::new();
        tracker.create("1", None).unwrap();
        tracker.transition("1", LifecycleState::Converting, None).unwrap();

        let failed = tracker
            .transition("1", LifecycleState::Error, Some("corrupt pdf".to_string()))
            .unwrap();
        assert_eq!(failed.error.as_deref(), Some("corrupt pdf"));
        assert!(failed.completed_at.is_some());
    }

    #[test]
    fn test_same_state_transition_is_noop() {
        let tracker = LifecycleTracker::new();
        tracker.create("1", None).unwrap();
        tracker.transition("1", LifecycleState::Converting, None).unwrap();
        tracker.transition("1", LifecycleState::Success, None).unwrap();
        let first = tracker.get("1").unwrap();

        let again = tracker.transition("1", LifecycleState::Success, None).unwrap();
        assert_eq!(again.completed_at, first.completed_at);
    }

    #[test]
    fn test_terminal_state_is_final() {
        let tracker = LifecycleTracker::new();
        tracker.create("1", None).unwrap();
        tracker
            .transition("1", LifecycleState::Error, Some("x".to_string()))
            .unwrap();

        let err = tracker
            .transition("1", LifecycleState::Converting, None)
            .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidTransition { .. }));
    }

    #[test]
    fn test_transition_unknown_paper() {
        let tracker = LifecycleTracker::new();
        assert_eq!(
            tracker.transition("nope", LifecycleState::Converting, None),
            Err(TrackerError::NotTracked("nope".to_string()))
        );
    }

    #[test]
    fn test_remove() {
        let tracker = LifecycleTracker::new();
        tracker.create("1", None).unwrap();

        assert!(tracker.remove("1").is_some());
        assert!(tracker.remove("1").is_none());
        assert!(tracker.is_empty());
    }
}
