//! Document-to-text conversion seam.

use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::utils::{extract_text, PdfExtractError};

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error(transparent)]
    Pdf(#[from] PdfExtractError),

    #[error("Conversion task failed: {0}")]
    Task(String),

    #[error("{0}")]
    Other(String),
}

/// Converts a downloaded document into the stored text form
#[async_trait]
pub trait DocumentConverter: Send + Sync + std::fmt::Debug {
    async fn convert(&self, document: &Path) -> Result<String, ConversionError>;
}

/// Plain-text extraction from PDF, run on the blocking pool
#[derive(Debug, Default, Clone)]
pub struct PdfTextConverter;

impl PdfTextConverter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentConverter for PdfTextConverter {
    async fn convert(&self, document: &Path) -> Result<String, ConversionError> {
        let path: PathBuf = document.to_path_buf();
        let text = tokio::task::spawn_blocking(move || extract_text(&path))
            .await
            .map_err(|e| ConversionError::Task(e.to_string()))??;
        Ok(tidy_text(&text))
    }
}

/// Clean up raw extracted text.
///
/// Words hyphenated across a line break are rejoined, page breaks become
/// blank lines, trailing whitespace is dropped and runs of blank lines are
/// squeezed to one.
pub fn tidy_text(raw: &str) -> String {
    let mut text = raw.replace("\r\n", "\n").replace('\u{c}', "\n\n");

    for (pattern, replacement) in [
        (r"(\p{L})-\n(\p{Ll})", "${1}${2}"),
        (r"[ \t]+\n", "\n"),
        (r"\n{3,}", "\n\n"),
    ] {
        if let Ok(re) = Regex::new(pattern) {
            text = re.replace_all(&text, replacement).into_owned();
        }
    }

    text.trim().to_string()
}
