//! Mock source for testing purposes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::models::{Paper, PaperBuilder, SearchQuery, SearchResponse};
use crate::sources::{ArxivSource, Source, SourceError};

/// How the mock behaves when asked to download
#[derive(Debug, Clone, Default)]
pub enum DownloadBehavior {
    /// Write these bytes to the destination
    #[default]
    Succeed,
    /// Write some bytes, then fail as a dropped connection would
    FailMidway,
    /// Fail before writing anything
    Fail,
}

/// A mock source for testing that serves papers from memory.
///
/// Identifiers are canonicalized the way arXiv does (`arXiv:` prefix, abs
/// URLs and version suffixes are stripped) before any lookup.
///
/// Lookups of identifiers that were never added return
/// [`SourceError::NotFound`]. Identifiers added with
/// [`MockSource::fail_lookup`] return a network error instead.
#[derive(Debug, Default)]
pub struct MockSource {
    papers: Mutex<HashMap<String, Paper>>,
    failing: Mutex<HashMap<String, String>>,
    download: Mutex<DownloadBehavior>,
    lookups: AtomicUsize,
    downloads: AtomicUsize,
}

impl MockSource {
    /// Create a new mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a paper known to the mock.
    pub fn add_paper(&self, paper: Paper) {
        let mut guard = self.papers.lock().unwrap();
        guard.insert(paper.paper_id.clone(), paper);
    }

    /// Builder-style variant of [`MockSource::add_paper`].
    pub fn with_paper(self, paper: Paper) -> Self {
        self.add_paper(paper);
        self
    }

    /// Make lookups of `id` fail with a network error.
    pub fn fail_lookup(&self, id: &str, message: &str) {
        let mut guard = self.failing.lock().unwrap();
        guard.insert(id.to_string(), message.to_string());
    }

    /// Change what downloads do.
    pub fn set_download_behavior(&self, behavior: DownloadBehavior) {
        let mut guard = self.download.lock().unwrap();
        *guard = behavior;
    }

    /// Number of `get_by_id` calls so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of `download` calls so far.
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    fn normalize_id(&self, id: &str) -> Result<String, SourceError> {
        ArxivSource::parse_id(id)
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        let needle = query.query.to_lowercase();
        let guard = self.papers.lock().unwrap();
        let mut papers: Vec<Paper> = guard
            .values()
            .filter(|p| p.title.to_lowercase().contains(&needle))
            .filter(|p| {
                query.categories.is_empty()
                    || p.categories.iter().any(|c| query.categories.contains(c))
            })
            .cloned()
            .collect();
        papers.sort_by(|a, b| a.paper_id.cmp(&b.paper_id));
        papers.truncate(query.max_results);
        Ok(SearchResponse::new(papers))
    }

    async fn get_by_id(&self, id: &str) -> Result<Paper, SourceError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let id = self.normalize_id(id)?;

        if let Some(message) = self.failing.lock().unwrap().get(&id) {
            return Err(SourceError::Network(message.clone()));
        }

        self.papers
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(SourceError::NotFound(id))
    }

    async fn download(&self, paper: &Paper, dest: &Path) -> Result<u64, SourceError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let behavior = self.download.lock().unwrap().clone();
        let body = format!("%PDF-1.4 mock document for {}", paper.paper_id);

        match behavior {
            DownloadBehavior::Succeed => {
                tokio::fs::write(dest, &body).await?;
                Ok(body.len() as u64)
            }
            DownloadBehavior::FailMidway => {
                tokio::fs::write(dest, &body.as_bytes()[..8]).await?;
                Err(SourceError::Network("connection reset".to_string()))
            }
            DownloadBehavior::Fail => Err(SourceError::Network("connection refused".to_string())),
        }
    }
}

/// Helper function to create a mock paper for testing.
pub fn make_paper(paper_id: &str, title: &str) -> Paper {
    PaperBuilder::new(paper_id, title, format!("https://arxiv.org/abs/{}", paper_id))
        .authors(["Ada Lovelace"])
        .abstract_text(format!("Abstract of {}", title))
        .categories(["cs.AI"])
        .published("2023-01-15T10:00:00+00:00")
        .pdf_url(format!("https://arxiv.org/pdf/{}.pdf", paper_id))
        .build()
}
