//! PDF text extraction utilities.
//!
//! Extraction goes through the pdf-extract crate. Malformed documents can make
//! the parser panic, so extraction runs under `catch_unwind` and a panic is
//! reported as an ordinary extraction failure.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during PDF extraction
#[derive(Debug, Error)]
pub enum PdfExtractError {
    #[error("Failed to extract text from PDF: {0}")]
    ExtractionFailed(String),

    #[error("File not found or not a valid PDF: {0}")]
    InvalidFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extract text from a PDF file.
///
/// This is blocking; call it from `spawn_blocking` inside async code.
pub fn extract_text(path: &Path) -> Result<String, PdfExtractError> {
    if !path.is_file() {
        return Err(PdfExtractError::InvalidFile(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let bytes = std::fs::read(path)?;
    if !bytes.starts_with(b"%PDF") {
        return Err(PdfExtractError::InvalidFile(format!(
            "Missing PDF header: {}",
            path.display()
        )));
    }

    let extracted = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(&bytes)));

    match extracted {
        Ok(Ok(text)) => {
            if text.trim().is_empty() {
                // Scanned or image-only documents come back empty
                tracing::debug!("Extracted empty text from PDF: {}", path.display());
            }
            Ok(text)
        }
        Ok(Err(e)) => Err(PdfExtractError::ExtractionFailed(e.to_string())),
        Err(_) => Err(PdfExtractError::ExtractionFailed(format!(
            "parser panicked on {}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_nonexistent_file() {
        let result = extract_text(Path::new("/nonexistent/file.pdf"));
        assert!(matches!(result, Err(PdfExtractError::InvalidFile(_))));
    }

    #[test]
    fn test_rejects_non_pdf_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, "<html>not a pdf</html>").unwrap();

        let result = extract_text(&path);
        assert!(matches!(result, Err(PdfExtractError::InvalidFile(_))));
    }

    #[test]
    fn test_truncated_pdf_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truncated.pdf");
        std::fs::write(&path, "%PDF-1.4\n1 0 obj").unwrap();

        assert!(extract_text(&path).is_err());
    }
}
