//! Sidecar index of converted papers (`index.json` in the storage root).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::StoreError;
use crate::models::Paper;

const INDEX_FILE: &str = "index.json";

/// Metadata of a paper whose text is in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPaper {
    #[serde(rename = "id")]
    pub paper_id: String,
    /// Text artifact file name, relative to the storage root
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub r#abstract: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_at: Option<DateTime<Utc>>,
}

impl StoredPaper {
    pub fn from_paper(paper: &Paper, file: impl Into<String>) -> Self {
        Self {
            paper_id: paper.paper_id.clone(),
            file: file.into(),
            title: paper.display_title(),
            authors: paper.authors.clone(),
            r#abstract: Some(paper.r#abstract.clone()).filter(|a| !a.is_empty()),
            categories: paper.categories.clone(),
            published: paper.published.clone(),
            url: Some(paper.url.clone()).filter(|u| !u.is_empty()),
            converted_at: Some(Utc::now()),
        }
    }

    /// An entry known only by identifier and file
    pub fn bare(paper_id: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            paper_id: paper_id.into(),
            file: file.into(),
            title: None,
            authors: Vec::new(),
            r#abstract: None,
            categories: Vec::new(),
            published: None,
            url: None,
            converted_at: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(super) struct PaperIndex {
    papers: BTreeMap<String, StoredPaper>,
}

impl PaperIndex {
    fn path(root: &Path) -> PathBuf {
        root.join(INDEX_FILE)
    }

    /// Load the index; a missing file is an empty index, an unreadable one is discarded
    pub(super) fn load(root: &Path) -> Result<Self, StoreError> {
        let path = Self::path(root);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&raw) {
            Ok(index) => Ok(index),
            Err(e) => {
                tracing::warn!("Ignoring unreadable index {}: {}", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    /// Replace the index file atomically
    pub(super) fn save(&self, root: &Path) -> Result<(), StoreError> {
        std::fs::create_dir_all(root)?;
        let json = serde_json::to_vec_pretty(self).map_err(|e| StoreError::Index(e.to_string()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(root)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(Self::path(root)).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    pub(super) fn insert(&mut self, entry: StoredPaper) {
        self.papers.insert(entry.paper_id.clone(), entry);
    }

    pub(super) fn get(&self, paper_id: &str) -> Option<&StoredPaper> {
        self.papers.get(paper_id)
    }

    pub(super) fn into_entries(self) -> impl Iterator<Item = StoredPaper> {
        self.papers.into_values()
    }
}
