//! Local paper cache.
//!
//! The store owns the storage root and answers three things: where an
//! artifact for a paper lives, whether it is there, and what is known about
//! the papers already converted. Two artifacts exist per paper: the
//! downloaded document (`.pdf`, transient) and the converted text (`.md`,
//! kept indefinitely).
//!
//! Artifacts are keyed by identifier unless [`ArtifactNaming::Title`] is
//! configured. Lookups check the index entry, the identifier path and the
//! title path, so a cache written under either scheme stays readable.

mod index;

pub use index::StoredPaper;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use index::PaperIndex;

/// Longest stem produced from a title
const MAX_TITLE_STEM: usize = 100;

/// Artifact produced or consumed during acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Downloaded binary document
    Document,
    /// Converted text
    Text,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Document => "pdf",
            ArtifactKind::Text => "md",
        }
    }
}

/// How new artifacts are named on disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactNaming {
    /// `<identifier>.<ext>`
    #[default]
    Identifier,
    /// `<sanitized title>.<ext>` when a title is known
    Title,
}

/// Errors from the local cache
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Paper {0} not found in storage")]
    NotFound(String),
}

/// Turn a paper title into a file stem.
///
/// Characters unsafe on common filesystems are dropped, spaces become
/// underscores and the result is capped at 100 characters.
pub fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_control())
        .map(|c| if c == ' ' { '_' } else { c })
        .take(MAX_TITLE_STEM)
        .collect()
}

/// File stem for an identifier; old-style ids like `math.GT/0104020` contain a slash
pub fn identifier_stem(paper_id: &str) -> String {
    paper_id.trim().replace(['/', '\\'], "_")
}

/// Paper Store over a storage root directory
#[derive(Debug)]
pub struct PaperStore {
    root: PathBuf,
    naming: ArtifactNaming,
    // serializes read-modify-write cycles of the index file
    index_lock: Mutex<()>,
}

impl PaperStore {
    pub fn new(root: impl Into<PathBuf>, naming: ArtifactNaming) -> Self {
        Self {
            root: root.into(),
            naming,
            index_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an artifact for `paper_id`, named after `title` when one is given.
    ///
    /// Creates the storage root if needed. Otherwise a pure function of its inputs.
    pub fn resolve_artifact_path(
        &self,
        paper_id: &str,
        title: Option<&str>,
        kind: ArtifactKind,
    ) -> Result<PathBuf, StoreError> {
        std::fs::create_dir_all(&self.root)?;

        let stem = title
            .map(sanitize_filename)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| identifier_stem(paper_id));

        Ok(self.root.join(format!("{}.{}", stem, kind.extension())))
    }

    /// Where a new artifact is written under the configured naming scheme
    pub fn artifact_path(
        &self,
        paper_id: &str,
        title: Option<&str>,
        kind: ArtifactKind,
    ) -> Result<PathBuf, StoreError> {
        match self.naming {
            ArtifactNaming::Identifier => self.resolve_artifact_path(paper_id, None, kind),
            ArtifactNaming::Title => self.resolve_artifact_path(paper_id, title, kind),
        }
    }

    pub fn artifact_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Locate the converted text of a paper, whichever scheme it was written under
    pub fn find_text_artifact(
        &self,
        paper_id: &str,
        title: Option<&str>,
    ) -> Result<Option<PathBuf>, StoreError> {
        if let Some(entry) = self.index_entry(paper_id)? {
            let path = self.root.join(&entry.file);
            if self.artifact_exists(&path) {
                return Ok(Some(path));
            }
        }

        let by_id = self.resolve_artifact_path(paper_id, None, ArtifactKind::Text)?;
        if self.artifact_exists(&by_id) {
            return Ok(Some(by_id));
        }

        if let Some(title) = title {
            let by_title = self.resolve_artifact_path(paper_id, Some(title), ArtifactKind::Text)?;
            if self.artifact_exists(&by_title) {
                return Ok(Some(by_title));
            }
        }

        Ok(None)
    }

    /// Remove an artifact; returns whether anything was deleted
    pub fn remove_artifact(&self, path: &Path) -> Result<bool, StoreError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Write converted text so that readers never observe a partial file
    pub async fn write_text(&self, path: &Path, text: &str) -> Result<(), StoreError> {
        let partial = path.with_extension("md.part");
        tokio::fs::write(&partial, text).await?;
        if let Err(e) = tokio::fs::rename(&partial, path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Read the converted text of a stored paper
    pub fn read_paper(&self, paper_id: &str) -> Result<String, StoreError> {
        let path = self
            .find_text_artifact(paper_id, None)?
            .ok_or_else(|| StoreError::NotFound(paper_id.to_string()))?;
        Ok(std::fs::read_to_string(path)?)
    }

    /// Record metadata of a converted paper in the sidecar index
    pub fn record_stored(&self, entry: StoredPaper) -> Result<(), StoreError> {
        let _guard = self.index_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut index = PaperIndex::load(&self.root)?;
        index.insert(entry);
        index.save(&self.root)
    }

    /// Index entry for a paper, if one was recorded
    pub fn index_entry(&self, paper_id: &str) -> Result<Option<StoredPaper>, StoreError> {
        let _guard = self.index_lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(PaperIndex::load(&self.root)?.get(paper_id).cloned())
    }

    /// All converted papers on disk, joined with their index metadata
    pub fn list_papers(&self) -> Result<Vec<StoredPaper>, StoreError> {
        std::fs::create_dir_all(&self.root)?;

        let by_file: HashMap<String, StoredPaper> = {
            let _guard = self.index_lock.lock().unwrap_or_else(|e| e.into_inner());
            PaperIndex::load(&self.root)?
                .into_entries()
                .map(|entry| (entry.file.clone(), entry))
                .collect()
        };

        let mut papers = Vec::new();
        for dir_entry in std::fs::read_dir(&self.root)? {
            let path = dir_entry?.path();
            if !path.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(ArtifactKind::Text.extension())
            {
                continue;
            }
            let (Some(file), Some(stem)) = (
                path.file_name().and_then(|f| f.to_str()),
                path.file_stem().and_then(|s| s.to_str()),
            ) else {
                continue;
            };

            papers.push(
                by_file
                    .get(file)
                    .cloned()
                    .unwrap_or_else(|| StoredPaper::bare(stem, file)),
            );
        }

        papers.sort_by(|a, b| a.paper_id.cmp(&b.paper_id));
        Ok(papers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::make_paper;

    fn store_in(dir: &tempfile::TempDir, naming: ArtifactNaming) -> PaperStore {
        PaperStore::new(dir.path().join("papers"), naming)
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename("Attention Is All You Need"),
            "Attention_Is_All_You_Need"
        );
        assert_eq!(sanitize_filename("A/B: <C>? \"D\"|*\\"), "AB_C_D");
        assert_eq!(sanitize_filename("line\nbreak"), "linebreak");
        assert_eq!(sanitize_filename(&"x".repeat(300)).len(), 100);
    }

    #[test]
    fn test_identifier_stem() {
        assert_eq!(identifier_stem("2301.12345"), "2301.12345");
        assert_eq!(identifier_stem("math.GT/0104020"), "math.GT_0104020");
    }

    #[test]
    fn test_resolve_creates_root_and_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, ArtifactNaming::Identifier);
        assert!(!store.root().exists());

        let first = store
            .resolve_artifact_path("2301.12345", None, ArtifactKind::Document)
            .unwrap();
        let second = store
            .resolve_artifact_path("2301.12345", None, ArtifactKind::Document)
            .unwrap();

        assert!(store.root().is_dir());
        assert_eq!(first, second);
        assert_eq!(first, store.root().join("2301.12345.pdf"));
    }

    #[test]
    fn test_resolve_uses_title_when_given() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, ArtifactNaming::Identifier);

        let path = store
            .resolve_artifact_path("2301.12345", Some("Deep Nets"), ArtifactKind::Text)
            .unwrap();
        assert_eq!(path, store.root().join("Deep_Nets.md"));

        // a title with nothing usable falls back to the identifier
        let path = store
            .resolve_artifact_path("2301.12345", Some("???"), ArtifactKind::Text)
            .unwrap();
        assert_eq!(path, store.root().join("2301.12345.md"));
    }

    #[test]
    fn test_artifact_path_follows_naming_scheme() {
        let dir = tempfile::tempdir().unwrap();

        let by_id = store_in(&dir, ArtifactNaming::Identifier);
        assert_eq!(
            by_id
                .artifact_path("1", Some("Some Title"), ArtifactKind::Text)
                .unwrap()
                .file_name()
                .unwrap(),
            "1.md"
        );

        let by_title = store_in(&dir, ArtifactNaming::Title);
        assert_eq!(
            by_title
                .artifact_path("1", Some("Some Title"), ArtifactKind::Text)
                .unwrap()
                .file_name()
                .unwrap(),
            "Some_Title.md"
        );
    }

    #[test]
    fn test_find_text_artifact_checks_both_schemes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, ArtifactNaming::Identifier);

        assert!(store.find_text_artifact("1", Some("Old Title")).unwrap().is_none());

        let legacy = store
            .resolve_artifact_path("1", Some("Old Title"), ArtifactKind::Text)
            .unwrap();
        std::fs::write(&legacy, "legacy").unwrap();
        assert_eq!(store.find_text_artifact("1", Some("Old Title")).unwrap(), Some(legacy));
        assert!(store.find_text_artifact("1", None).unwrap().is_none());

        let by_id = store.resolve_artifact_path("1", None, ArtifactKind::Text).unwrap();
        std::fs::write(&by_id, "current").unwrap();
        assert_eq!(store.find_text_artifact("1", Some("Old Title")).unwrap(), Some(by_id));
    }

    #[test]
    fn test_find_text_artifact_prefers_index_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, ArtifactNaming::Title);
        let paper = make_paper("2301.00001", "Indexed Paper");

        let path = store
            .artifact_path(&paper.paper_id, Some(&paper.title), ArtifactKind::Text)
            .unwrap();
        std::fs::write(&path, "text").unwrap();
        store
            .record_stored(StoredPaper::from_paper(&paper, "Indexed_Paper.md"))
            .unwrap();

        // found without knowing the title
        assert_eq!(store.find_text_artifact("2301.00001", None).unwrap(), Some(path));
        assert_eq!(store.read_paper("2301.00001").unwrap(), "text");
    }

    #[test]
    fn test_remove_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, ArtifactNaming::Identifier);
        let path = store.resolve_artifact_path("1", None, ArtifactKind::Document).unwrap();

        assert!(!store.remove_artifact(&path).unwrap());
        std::fs::write(&path, "%PDF").unwrap();
        assert!(store.remove_artifact(&path).unwrap());
        assert!(!store.artifact_exists(&path));
    }

    #[tokio::test]
    async fn test_write_text_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, ArtifactNaming::Identifier);
        let path = store.resolve_artifact_path("1", None, ArtifactKind::Text).unwrap();

        store.write_text(&path, "# Converted").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Converted");
        assert!(!path.with_extension("md.part").exists());
    }

    #[test]
    fn test_read_paper_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, ArtifactNaming::Identifier);
        assert!(matches!(store.read_paper("missing"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_list_papers_joins_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, ArtifactNaming::Identifier);
        let paper = make_paper("2301.00002", "Listed Paper");

        let indexed = store.resolve_artifact_path("2301.00002", None, ArtifactKind::Text).unwrap();
        std::fs::write(&indexed, "text").unwrap();
        store
            .record_stored(StoredPaper::from_paper(&paper, "2301.00002.md"))
            .unwrap();

        let stray = store.resolve_artifact_path("2301.00001", None, ArtifactKind::Text).unwrap();
        std::fs::write(&stray, "text").unwrap();

        // documents and index entries without a file are not listed
        std::fs::write(store.root().join("2301.00003.pdf"), "%PDF").unwrap();
        store
            .record_stored(StoredPaper::bare("2301.00004", "2301.00004.md"))
            .unwrap();

        let papers = store.list_papers().unwrap();
        let ids: Vec<&str> = papers.iter().map(|p| p.paper_id.as_str()).collect();
        assert_eq!(ids, vec!["2301.00001", "2301.00002"]);
        assert_eq!(papers[0].title, None);
        assert_eq!(papers[1].title.as_deref(), Some("Listed Paper"));
    }
}
