//! Paper model representing an arXiv paper.

use serde::{Deserialize, Serialize};

/// A research paper as returned by the external repository
///
/// The same shape is used in search results, in the sidecar index of stored
/// papers, and as the metadata handed to the conversion worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Canonical identifier without version suffix (e.g. "2301.12345")
    #[serde(rename = "id")]
    pub paper_id: String,

    /// Paper title
    pub title: String,

    /// Author names in listing order
    #[serde(default)]
    pub authors: Vec<String>,

    /// Abstract text
    #[serde(rename = "abstract", default)]
    pub r#abstract: String,

    /// arXiv categories (e.g. "cs.AI")
    #[serde(default)]
    pub categories: Vec<String>,

    /// Publication date (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,

    /// Last updated date (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,

    /// Abstract page URL
    pub url: String,

    /// Direct PDF URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

impl Paper {
    /// Create a new paper with required fields
    pub fn new(paper_id: String, title: String, url: String) -> Self {
        Self {
            paper_id,
            title,
            authors: Vec::new(),
            r#abstract: String::new(),
            categories: Vec::new(),
            published: None,
            updated: None,
            url,
            pdf_url: None,
        }
    }

    /// Title with whitespace collapsed, or `None` when the feed had no usable title.
    ///
    /// arXiv titles frequently contain hard line breaks and double spaces.
    pub fn display_title(&self) -> Option<String> {
        let collapsed = self.title.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            None
        } else {
            Some(collapsed)
        }
    }
}

/// Builder for constructing Paper objects
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: Paper,
}

impl PaperBuilder {
    /// Create a new builder with required fields
    pub fn new(paper_id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            paper: Paper::new(paper_id.into(), title.into(), url.into()),
        }
    }

    /// Set authors
    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    /// Set abstract
    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.paper.r#abstract = abstract_text.into();
        self
    }

    /// Set categories
    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Set publication date
    pub fn published(mut self, date: impl Into<String>) -> Self {
        self.paper.published = Some(date.into());
        self
    }

    /// Set updated date
    pub fn updated(mut self, date: impl Into<String>) -> Self {
        self.paper.updated = Some(date.into());
        self
    }

    /// Set PDF URL
    pub fn pdf_url(mut self, url: impl Into<String>) -> Self {
        self.paper.pdf_url = Some(url.into());
        self
    }

    /// Build the Paper
    pub fn build(self) -> Paper {
        self.paper
    }
}
