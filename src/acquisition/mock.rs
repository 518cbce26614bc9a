//! Mock converter for testing purposes.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use super::converter::{ConversionError, DocumentConverter};

#[derive(Debug, Clone)]
enum Outcome {
    Text(String),
    Fail(String),
    Hang,
}

/// A converter that returns a fixed outcome, optionally held until released.
#[derive(Debug, Clone)]
pub struct MockConverter {
    outcome: Outcome,
    gate: Option<Arc<Notify>>,
    calls: Arc<AtomicUsize>,
}

impl MockConverter {
    /// Convert every document to `text`.
    pub fn returning(text: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Text(text.into()),
            gate: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail every conversion with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Fail(message.into()),
            gate: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Never finish a conversion.
    pub fn hanging() -> Self {
        Self {
            outcome: Outcome::Hang,
            gate: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Hold each conversion until the returned handle is notified.
    pub fn gated(self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        (
            Self {
                gate: Some(gate.clone()),
                ..self
            },
            gate,
        )
    }

    /// Number of conversions started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentConverter for MockConverter {
    async fn convert(&self, document: &Path) -> Result<String, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        if !document.exists() {
            return Err(ConversionError::Other(format!(
                "document missing: {}",
                document.display()
            )));
        }

        match &self.outcome {
            Outcome::Text(text) => Ok(text.clone()),
            Outcome::Fail(message) => Err(ConversionError::Other(message.clone())),
            Outcome::Hang => std::future::pending().await,
        }
    }
}
