//! The external paper repository behind search and acquisition.
//!
//! This module defines the [`Source`] trait the rest of the crate talks to.
//! [`ArxivSource`] is the production implementation over the arXiv Atom API;
//! [`MockSource`] serves canned papers for tests and offline use.
//!
//! A source answers three questions:
//!
//! - which papers match a query ([`Source::search`])
//! - does this identifier exist, and what is its metadata ([`Source::get_by_id`])
//! - write the paper's document to a local path ([`Source::download`])

mod arxiv;
pub mod mock;

pub use arxiv::{parse_date, ArxivSource};
pub use mock::MockSource;

use crate::models::{Paper, SearchQuery, SearchResponse};
use async_trait::async_trait;
use std::path::Path;

/// The Source trait defines the interface to a remote paper repository.
///
/// # Implementing a New Source
///
/// 1. Create a new struct that implements `Source`
/// 2. Report unknown identifiers from `get_by_id` as [`SourceError::NotFound`];
///    the orchestrator relies on that to tell "no such paper" from a failed fetch
/// 3. Make `download` remove any partially written file before returning an error
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g., "arxiv")
    fn id(&self) -> &str;

    /// Human-readable name of this source, used in user-facing messages
    fn name(&self) -> &str;

    /// Search for papers matching the query
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError>;

    /// Canonical form of a caller-supplied identifier.
    ///
    /// Every record, artifact and index entry of a paper is keyed by this form.
    fn normalize_id(&self, id: &str) -> Result<String, SourceError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(SourceError::InvalidRequest("Empty paper ID".to_string()));
        }
        Ok(id.to_string())
    }

    /// Look up exactly one paper by identifier
    async fn get_by_id(&self, id: &str) -> Result<Paper, SourceError>;

    /// Download the paper's document to `dest`, returning the number of bytes written
    async fn download(&self, paper: &Paper, dest: &Path) -> Result<u64, SourceError>;
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Parsing error (Atom feed, JSON)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Paper not found
    #[error("Paper not found: {0}")]
    NotFound(String),

    /// API error from the source
    #[error("API error: {0}")]
    Api(String),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(SourceError::NotFound("x".to_string()).is_not_found());
        assert!(!SourceError::Network("x".to_string()).is_not_found());
    }

    #[test]
    fn test_io_conversion() {
        let err: SourceError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert!(err.to_string().contains("disk"));
    }
}
