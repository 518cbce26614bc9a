//! Search request and response models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sort field for search results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Relevance,
    Date,
}

/// Search query parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Main search query string
    pub query: String,

    /// Maximum number of results to return
    pub max_results: usize,

    /// Categories, any of which may match (e.g. "cs.AI")
    pub categories: Vec<String>,

    /// Earliest submission date, inclusive
    pub date_from: Option<NaiveDate>,

    /// Latest submission date, inclusive
    pub date_to: Option<NaiveDate>,

    /// Sort by field
    pub sort_by: SortBy,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: 10,
            categories: Vec::new(),
            date_from: None,
            date_to: None,
            sort_by: SortBy::Relevance,
        }
    }
}

impl SearchQuery {
    /// Create a new search query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set maximum results
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Add a category filter
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    /// Set the submission date window
    pub fn dates(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    /// Set sort by
    pub fn sort_by(mut self, sort: SortBy) -> Self {
        self.sort_by = sort;
        self
    }
}

/// Search response containing papers and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Number of papers returned
    pub total_results: usize,

    /// Papers found
    pub papers: Vec<crate::models::Paper>,
}

impl SearchResponse {
    /// Create a new search response
    pub fn new(papers: Vec<crate::models::Paper>) -> Self {
        Self {
            total_results: papers.len(),
            papers,
        }
    }
}
