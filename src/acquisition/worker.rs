//! Conversion Worker: turns downloaded documents into stored text off the request path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

use super::converter::DocumentConverter;
use super::tracker::LifecycleTracker;
use crate::models::{LifecycleState, Paper};
use crate::store::{PaperStore, StoredPaper};

/// One unit of conversion work handed over by the orchestrator
#[derive(Debug, Clone)]
pub struct ConversionJob {
    /// Canonical identifier the record and index entry are keyed by
    pub paper_id: String,
    pub paper: Paper,
    /// Downloaded document; removed once the job settles
    pub document: PathBuf,
    /// Where the converted text goes
    pub text: PathBuf,
}

/// Sending side of the conversion queue.
///
/// The orchestrator only submits; it never waits on a job.
#[derive(Debug, Clone)]
pub struct ConversionHandle {
    tx: mpsc::UnboundedSender<ConversionJob>,
}

impl ConversionHandle {
    /// Queue a job; hands it back if the worker has stopped
    pub fn submit(&self, job: ConversionJob) -> Result<(), ConversionJob> {
        self.tx.send(job).map_err(|e| e.0)
    }
}

/// Consumes queued jobs, running at most `max_concurrent` conversions at once.
///
/// The worker owns its own tracker and store handles and is the only writer
/// of a record once it has reached `converting`.
#[derive(Debug)]
pub struct ConversionWorker {
    tracker: Arc<LifecycleTracker>,
    store: Arc<PaperStore>,
    converter: Arc<dyn DocumentConverter>,
    timeout: Duration,
    max_concurrent: usize,
}

impl ConversionWorker {
    pub fn new(
        tracker: Arc<LifecycleTracker>,
        store: Arc<PaperStore>,
        converter: Arc<dyn DocumentConverter>,
    ) -> Self {
        Self {
            tracker,
            store,
            converter,
            timeout: Duration::from_secs(300),
            max_concurrent: 2,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Start the worker loop on the current runtime.
    ///
    /// The loop ends once every [`ConversionHandle`] has been dropped.
    pub fn spawn(self) -> ConversionHandle {
        let (tx, mut rx) = mpsc::unbounded_channel::<ConversionJob>();
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let worker = Arc::new(self);

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let Ok(permit) = permits.clone().acquire_owned().await else {
                    break;
                };
                let worker = worker.clone();
                tokio::spawn(async move {
                    worker.process(job).await;
                    drop(permit);
                });
            }
            tracing::debug!("Conversion queue closed");
        });

        ConversionHandle { tx }
    }

    /// Run one job to a terminal state.
    ///
    /// The text artifact and its index entry are written before the record
    /// reaches `success`, and the document is gone before either terminal
    /// transition, so pollers never see a terminal state with a stale document.
    async fn process(&self, job: ConversionJob) {
        let paper_id = job.paper_id.clone();
        tracing::info!(paper_id = %paper_id, "Converting {}", job.document.display());

        let outcome = match self.convert(&job).await {
            Ok(text) => self.persist(&job, &text).await,
            Err(detail) => Err(detail),
        };

        if let Err(e) = self.store.remove_artifact(&job.document) {
            tracing::warn!(paper_id = %paper_id, "Failed to remove {}: {}", job.document.display(), e);
        }

        let transition = match outcome {
            Ok(()) => self.tracker.transition(&paper_id, LifecycleState::Success, None),
            Err(detail) => {
                tracing::warn!(paper_id = %paper_id, "Conversion failed: {}", detail);
                self.tracker
                    .transition(&paper_id, LifecycleState::Error, Some(detail))
            }
        };
        if let Err(e) = transition {
            tracing::error!(paper_id = %paper_id, "Could not record conversion outcome: {}", e);
        }
    }

    /// Convert in a task of its own so that a panic or a timeout still ends in a terminal state
    async fn convert(&self, job: &ConversionJob) -> Result<String, String> {
        let converter = self.converter.clone();
        let document = job.document.clone();
        let task = tokio::spawn(async move { converter.convert(&document).await });
        let abort = task.abort_handle();

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(text))) if text.trim().is_empty() => {
                Err("Conversion produced no text".to_string())
            }
            Ok(Ok(Ok(text))) => Ok(text),
            Ok(Ok(Err(e))) => Err(e.to_string()),
            Ok(Err(e)) => Err(format!("Conversion task failed: {}", e)),
            Err(_) => {
                abort.abort();
                Err(format!(
                    "Conversion timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            }
        }
    }

    async fn persist(&self, job: &ConversionJob, text: &str) -> Result<(), String> {
        self.store
            .write_text(&job.text, text)
            .await
            .map_err(|e| format!("Failed to store converted text: {}", e))?;

        let file = job
            .text
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let entry = StoredPaper {
            paper_id: job.paper_id.clone(),
            ..StoredPaper::from_paper(&job.paper, file)
        };
        if let Err(e) = self.store.record_stored(entry) {
            tracing::warn!(paper_id = %job.paper_id, "Index update failed: {}", e);
        }
        Ok(())
    }
}
