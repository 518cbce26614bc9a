//! Acquisition Orchestrator: resolves, fetches and hands off papers for conversion.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::converter::DocumentConverter;
use super::tracker::{LifecycleTracker, TrackerError};
use super::worker::{ConversionHandle, ConversionJob, ConversionWorker};
use crate::models::{AcquisitionStatus, LifecycleState, StatusKind};
use crate::sources::{Source, SourceError};
use crate::store::{ArtifactKind, PaperStore, StoreError};

/// Failures that end an acquisition before conversion is handed off
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("Paper {paper_id} not found on {source_name}")]
    NotFound {
        paper_id: String,
        source_name: String,
    },

    #[error("Error: {0}")]
    Fetch(SourceError),

    #[error("Error: {0} timed out after {1}s")]
    Timeout(&'static str, u64),

    #[error("Error: {0}")]
    Store(#[from] StoreError),

    #[error("Error: {0}")]
    Tracker(#[from] TrackerError),
}

/// Tuning knobs for an orchestrator and its conversion worker
#[derive(Debug, Clone)]
pub struct AcquisitionOptions {
    /// Bound on the metadata lookup and, separately, on the document download
    pub request_timeout: Duration,
    pub conversion_timeout: Duration,
    pub max_concurrent_conversions: usize,
}

impl Default for AcquisitionOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            conversion_timeout: Duration::from_secs(300),
            max_concurrent_conversions: 2,
        }
    }
}

/// Releases an identifier's in-flight claim when dropped
struct InFlightClaim<'a> {
    claims: &'a Mutex<HashSet<String>>,
    paper_id: String,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        self.claims
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.paper_id);
    }
}

/// Coordinates store lookups, the remote fetch, lifecycle registration and
/// the conversion hand-off for each requested paper.
#[derive(Debug)]
pub struct AcquisitionOrchestrator {
    source: Arc<dyn Source>,
    store: Arc<PaperStore>,
    tracker: Arc<LifecycleTracker>,
    conversions: ConversionHandle,
    request_timeout: Duration,
    // identifiers between claim and conversion hand-off
    in_flight: Mutex<HashSet<String>>,
}

impl AcquisitionOrchestrator {
    /// Build an orchestrator over an already running conversion queue
    pub fn new(
        source: Arc<dyn Source>,
        store: Arc<PaperStore>,
        tracker: Arc<LifecycleTracker>,
        conversions: ConversionHandle,
    ) -> Self {
        Self {
            source,
            store,
            tracker,
            conversions,
            request_timeout: AcquisitionOptions::default().request_timeout,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Build an orchestrator with a fresh tracker and spawn its conversion worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        source: Arc<dyn Source>,
        store: Arc<PaperStore>,
        converter: Arc<dyn DocumentConverter>,
        options: AcquisitionOptions,
    ) -> Self {
        let tracker = Arc::new(LifecycleTracker::new());
        let conversions = ConversionWorker::new(tracker.clone(), store.clone(), converter)
            .with_timeout(options.conversion_timeout)
            .with_max_concurrent(options.max_concurrent_conversions)
            .spawn();

        Self::new(source, store, tracker, conversions).with_request_timeout(options.request_timeout)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn source(&self) -> &Arc<dyn Source> {
        &self.source
    }

    pub fn store(&self) -> &Arc<PaperStore> {
        &self.store
    }

    pub fn tracker(&self) -> &Arc<LifecycleTracker> {
        &self.tracker
    }

    /// The key a caller-supplied identifier is tracked and stored under
    pub fn canonical_id(&self, paper_id: &str) -> Result<String, SourceError> {
        self.source.normalize_id(paper_id)
    }

    /// Acquire a paper, or only report on it when `check_status_only` is set.
    ///
    /// Never waits for conversion. Failures come back as an `error` status;
    /// a failed fetch leaves no record and no document behind.
    pub async fn acquire(&self, paper_id: &str, check_status_only: bool) -> AcquisitionStatus {
        let paper_id = paper_id.trim();
        if paper_id.is_empty() {
            return AcquisitionStatus::failed("Error: paper_id must not be empty");
        }

        if check_status_only {
            return self.status(paper_id);
        }

        let paper_id = match self.canonical_id(paper_id) {
            Ok(id) => id,
            Err(e) => return AcquisitionStatus::failed(format!("Error: {}", e)),
        };
        let paper_id = paper_id.as_str();

        match self.store.find_text_artifact(paper_id, None) {
            Ok(Some(path)) => return AcquisitionStatus::ready("Paper already available", &path),
            Ok(None) => {}
            Err(e) => return AcquisitionStatus::failed(format!("Error: {}", e)),
        }

        let Some(_claim) = self.claim(paper_id) else {
            tracing::debug!(paper_id, "Joining acquisition in flight");
            return self
                .tracker
                .get(paper_id)
                .map(|record| AcquisitionStatus::from_record(&record))
                .unwrap_or_else(AcquisitionStatus::pending_lookup);
        };

        if let Some(record) = self.tracker.get(paper_id) {
            if !record.state.is_terminal() {
                return AcquisitionStatus::from_record(&record);
            }
            // a terminal record without text: error, or success whose text was removed
            tracing::info!(paper_id, state = %record.state, "Clearing settled record to retry");
            self.tracker.remove(paper_id);
        }

        match self.fetch_and_hand_off(paper_id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(paper_id, "Acquisition failed: {}", e);
                self.rollback(paper_id);
                AcquisitionStatus::failed(e.to_string())
            }
        }
    }

    /// Current state of a paper without starting anything
    pub fn status(&self, paper_id: &str) -> AcquisitionStatus {
        let paper_id = match self.canonical_id(paper_id) {
            Ok(id) => id,
            Err(e) => return AcquisitionStatus::failed(format!("Error: {}", e)),
        };
        let paper_id = paper_id.as_str();

        if let Some(record) = self.tracker.get(paper_id) {
            let status = AcquisitionStatus::from_record(&record);
            if record.state != LifecycleState::Success {
                return status;
            }
            // a success record only stands while its text does
            return match self.store.find_text_artifact(paper_id, record.title.as_deref()) {
                Ok(Some(path)) => status.resource(&path),
                Ok(None) => AcquisitionStatus::unknown().with_message(format!(
                    "Converted text of {} is no longer in storage; download it again",
                    paper_id
                )),
                Err(e) => AcquisitionStatus::failed(format!("Error: {}", e)),
            };
        }

        if self.is_claimed(paper_id) {
            return AcquisitionStatus::pending_lookup();
        }

        match self.store.find_text_artifact(paper_id, None) {
            Ok(Some(path)) => AcquisitionStatus::ready("Paper is ready", &path),
            Ok(None) => AcquisitionStatus::unknown(),
            Err(e) => AcquisitionStatus::failed(format!("Error: {}", e)),
        }
    }

    /// Poll until the paper settles or `deadline` elapses, returning the last status seen
    pub async fn wait_until_settled(
        &self,
        paper_id: &str,
        poll_interval: Duration,
        deadline: Duration,
    ) -> AcquisitionStatus {
        let started = Instant::now();
        loop {
            let status = self.status(paper_id);
            let settled = matches!(
                status.status,
                StatusKind::Success | StatusKind::Error | StatusKind::Unknown
            );
            if settled || started.elapsed() >= deadline {
                return status;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn fetch_and_hand_off(&self, paper_id: &str) -> Result<AcquisitionStatus, AcquireError> {
        let paper = tokio::time::timeout(self.request_timeout, self.source.get_by_id(paper_id))
            .await
            .map_err(|_| AcquireError::Timeout("Metadata lookup", self.request_timeout.as_secs()))?
            .map_err(|e| self.classify(paper_id, e))?;

        let title = paper.display_title();

        // the text may exist under a title-derived name from an earlier run
        if let Some(path) = self.store.find_text_artifact(paper_id, title.as_deref())? {
            return Ok(AcquisitionStatus::ready("Paper already available", &path));
        }

        let document = self
            .store
            .artifact_path(paper_id, title.as_deref(), ArtifactKind::Document)?;
        let text = self
            .store
            .artifact_path(paper_id, title.as_deref(), ArtifactKind::Text)?;

        self.tracker.create(paper_id, title)?;

        let bytes = tokio::time::timeout(self.request_timeout, self.source.download(&paper, &document))
            .await
            .map_err(|_| AcquireError::Timeout("Download", self.request_timeout.as_secs()))?
            .map_err(|e| self.classify(paper_id, e))?;
        tracing::info!(paper_id, bytes, "Downloaded {}", document.display());

        let record = self
            .tracker
            .transition(paper_id, LifecycleState::Converting, None)?;

        let job = ConversionJob {
            paper_id: paper_id.to_string(),
            paper,
            document,
            text: text.clone(),
        };
        if let Err(job) = self.conversions.submit(job) {
            self.discard_document(&job.document);
            let record = self.tracker.transition(
                paper_id,
                LifecycleState::Error,
                Some("Conversion worker is not running".to_string()),
            )?;
            return Ok(AcquisitionStatus::from_record(&record));
        }

        Ok(AcquisitionStatus::from_record(&record)
            .with_message("Paper downloaded, conversion started")
            .resource(&text))
    }

    fn classify(&self, paper_id: &str, err: SourceError) -> AcquireError {
        if err.is_not_found() {
            AcquireError::NotFound {
                paper_id: paper_id.to_string(),
                source_name: self.source.name().to_string(),
            }
        } else {
            AcquireError::Fetch(err)
        }
    }

    /// Undo a failed fetch: drop the record and any document written for it
    fn rollback(&self, paper_id: &str) {
        let title = self.tracker.remove(paper_id).and_then(|record| record.title);

        let mut candidates: Vec<PathBuf> = Vec::new();
        for title in [title.as_deref(), None] {
            if let Ok(path) = self.store.artifact_path(paper_id, title, ArtifactKind::Document) {
                if !candidates.contains(&path) {
                    candidates.push(path);
                }
            }
        }
        for path in &candidates {
            self.discard_document(path);
        }
    }

    fn discard_document(&self, path: &std::path::Path) {
        match self.store.remove_artifact(path) {
            Ok(true) => tracing::debug!("Removed {}", path.display()),
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }

    fn claim(&self, paper_id: &str) -> Option<InFlightClaim<'_>> {
        let mut claims = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !claims.insert(paper_id.to_string()) {
            return None;
        }
        Some(InFlightClaim {
            claims: &self.in_flight,
            paper_id: paper_id.to_string(),
        })
    }

    fn is_claimed(&self, paper_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(paper_id)
    }
}
