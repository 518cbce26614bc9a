//! arXiv research source implementation.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use feed_rs::parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{Paper, PaperBuilder, SearchQuery, SearchResponse, SortBy};
use crate::sources::{Source, SourceError};
use crate::utils::{api_retry_config, with_retry, HttpClient, RetryConfig};

/// Base URL for arXiv API
const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";
/// Base URL for arXiv PDFs
const ARXIV_PDF_URL: &str = "https://arxiv.org/pdf";
/// Marker in the entry id of the pseudo-entry arXiv returns for malformed ids
const ARXIV_ERROR_MARKER: &str = "/api/errors";
/// First day of arXiv submissions, used as the open lower date bound
const ARXIV_EPOCH: &str = "19910801";

/// arXiv research source
///
/// Supports:
/// - Search by query, categories and submission date window
/// - Metadata lookup by identifier
/// - PDF download
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: Arc<HttpClient>,
    api_url: String,
    pdf_url: String,
    retry: RetryConfig,
}

impl ArxivSource {
    /// Create a new arXiv source
    pub fn new() -> Result<Self, SourceError> {
        Ok(Self::with_client(Arc::new(HttpClient::new()?)))
    }

    /// Create a new arXiv source whose requests time out after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self::with_client(Arc::new(HttpClient::with_timeout(timeout)?)))
    }

    /// Create with a custom HTTP client
    pub fn with_client(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            api_url: ARXIV_API_URL.to_string(),
            pdf_url: ARXIV_PDF_URL.to_string(),
            retry: api_retry_config(),
        }
    }

    /// Point the source at different endpoints (for testing against a mock server)
    pub fn with_endpoints(mut self, api_url: impl Into<String>, pdf_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self.pdf_url = pdf_url.into();
        self
    }

    /// Override the retry policy
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Parse an arXiv ID from various formats
    ///
    /// Handles formats like:
    /// - "2301.12345"
    /// - "2301.12345v1" (version is stripped)
    /// - "arXiv:2301.12345"
    /// - "https://arxiv.org/abs/2301.12345v1"
    /// - "math.GT/0104020" (old style, kept as is)
    pub fn parse_id(id: &str) -> Result<String, SourceError> {
        let id = id.trim();

        let id = match id.to_ascii_lowercase().find("/abs/") {
            Some(pos) => &id[pos + 5..],
            None => id,
        };

        let id = match id.get(..6) {
            Some(prefix) if prefix.eq_ignore_ascii_case("arxiv:") => &id[6..],
            _ => id,
        };

        let id = strip_version(id.trim_end_matches('/'));

        if id.is_empty() {
            return Err(SourceError::InvalidRequest("Empty arXiv ID".to_string()));
        }

        Ok(id.to_string())
    }

    /// Build the `search_query` expression for the arXiv API
    fn build_search_query(query: &SearchQuery) -> String {
        let mut parts = Vec::new();

        let terms = query.query.trim();
        if !terms.is_empty() {
            parts.push(format!("({})", terms));
        }

        if !query.categories.is_empty() {
            let cats = query
                .categories
                .iter()
                .map(|c| format!("cat:{}", c.trim()))
                .collect::<Vec<_>>()
                .join(" OR ");
            parts.push(format!("({})", cats));
        }

        if query.date_from.is_some() || query.date_to.is_some() {
            let from = query
                .date_from
                .map(|d| d.format("%Y%m%d").to_string())
                .unwrap_or_else(|| ARXIV_EPOCH.to_string());
            let to = query
                .date_to
                .unwrap_or_else(|| Utc::now().date_naive())
                .format("%Y%m%d")
                .to_string();
            parts.push(format!("submittedDate:[{}0000 TO {}2359]", from, to));
        }

        parts.join(" AND ")
    }

    /// Parse arXiv Atom feed entry into Paper
    fn parse_entry(entry: &feed_rs::model::Entry, pdf_base: &str) -> Result<Paper, SourceError> {
        let paper_id = entry
            .id
            .rsplit_once("/abs/")
            .map(|(_, id)| strip_version(id))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SourceError::Parse(format!("Unexpected entry id: {}", entry.id)))?
            .to_string();

        let title = entry
            .title
            .as_ref()
            .map(|t| collapse_whitespace(&t.content))
            .unwrap_or_default();

        let abstract_text = entry
            .summary
            .as_ref()
            .map(|s| collapse_whitespace(&s.content))
            .unwrap_or_default();

        let mut builder = PaperBuilder::new(
            paper_id.clone(),
            title,
            format!("https://arxiv.org/abs/{}", paper_id),
        )
        .authors(entry.authors.iter().map(|a| a.name.clone()))
        .abstract_text(abstract_text)
        .categories(entry.categories.iter().map(|c| c.term.clone()))
        .pdf_url(format!("{}/{}.pdf", pdf_base, paper_id));

        if let Some(published) = entry.published {
            builder = builder.published(published.to_rfc3339());
        }
        if let Some(updated) = entry.updated {
            builder = builder.updated(updated.to_rfc3339());
        }

        Ok(builder.build())
    }

    /// Fetch and parse an Atom feed, retrying transient failures
    async fn fetch_feed(&self, url: String) -> Result<feed_rs::model::Feed, SourceError> {
        let client = Arc::clone(&self.client);

        with_retry(self.retry, || {
            let client = Arc::clone(&client);
            let url = url.clone();
            async move {
                let response = client
                    .get(&url)
                    .header("Accept", "application/atom+xml")
                    .send()
                    .await?;

                let status = response.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(SourceError::RateLimit);
                }
                if !status.is_success() {
                    return Err(SourceError::Api(format!(
                        "arXiv API returned status: {}",
                        status
                    )));
                }

                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| SourceError::Network(format!("Failed to read response: {}", e)))?;

                parser::parse(bytes.as_ref())
                    .map_err(|e| SourceError::Parse(format!("Failed to parse Atom feed: {}", e)))
            }
        })
        .await
    }
}

/// Drop a trailing `vN` version suffix
fn strip_version(id: &str) -> &str {
    match id.rfind('v') {
        Some(pos)
            if pos > 0
                && pos + 1 < id.len()
                && id[pos + 1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            &id[..pos]
        }
        _ => id,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a `YYYY-MM-DD` date parameter
pub fn parse_date(value: &str) -> Result<NaiveDate, SourceError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| SourceError::InvalidRequest(format!("Invalid date '{}': {}", value, e)))
}

#[async_trait]
impl Source for ArxivSource {
    fn id(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    fn normalize_id(&self, id: &str) -> Result<String, SourceError> {
        Self::parse_id(id)
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        let search_query = Self::build_search_query(query);
        if search_query.is_empty() {
            return Err(SourceError::InvalidRequest("Empty search query".to_string()));
        }

        let sort_by = match query.sort_by {
            SortBy::Relevance => "relevance",
            SortBy::Date => "submittedDate",
        };

        let url = format!(
            "{}?search_query={}&start=0&max_results={}&sortBy={}&sortOrder=descending",
            self.api_url,
            urlencoding::encode(&search_query),
            query.max_results.min(200), // arXiv max is 200 per page
            sort_by
        );

        tracing::debug!("arXiv search: {}", search_query);
        let feed = self.fetch_feed(url).await?;

        let papers = feed
            .entries
            .iter()
            .filter(|e| !e.id.contains(ARXIV_ERROR_MARKER))
            .map(|e| Self::parse_entry(e, &self.pdf_url))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SearchResponse::new(papers))
    }

    async fn get_by_id(&self, id: &str) -> Result<Paper, SourceError> {
        let paper_id = Self::parse_id(id)?;
        let url = format!(
            "{}?id_list={}&max_results=1",
            self.api_url,
            urlencoding::encode(&paper_id)
        );

        let feed = self.fetch_feed(url).await?;

        match feed.entries.first() {
            Some(entry) if !entry.id.contains(ARXIV_ERROR_MARKER) => {
                Self::parse_entry(entry, &self.pdf_url)
            }
            _ => Err(SourceError::NotFound(paper_id)),
        }
    }

    async fn download(&self, paper: &Paper, dest: &Path) -> Result<u64, SourceError> {
        let url = paper
            .pdf_url
            .clone()
            .unwrap_or_else(|| format!("{}/{}.pdf", self.pdf_url, paper.paper_id));

        tracing::debug!("Downloading {} to {}", url, dest.display());
        self.client.download_to(&url, dest).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_ENTRY_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>arXiv Query Results</title>
  <id>http://arxiv.org/api/query</id>
  <updated>2023-01-16T00:00:00-05:00</updated>
  <entry>
    <id>http://arxiv.org/abs/2301.12345v2</id>
    <updated>2023-02-01T10:00:00Z</updated>
    <published>2023-01-15T10:00:00Z</published>
    <title>Test Paper
      Title</title>
    <summary>Test abstract</summary>
    <author><name>Test Author</name></author>
    <author><name>Second Author</name></author>
    <category term="cs.AI" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    <link href="http://arxiv.org/abs/2301.12345v2" rel="alternate" type="text/html"/>
  </entry>
</feed>"#;

    const EMPTY_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>arXiv Query Results</title>
  <id>http://arxiv.org/api/query</id>
  <updated>2023-01-16T00:00:00-05:00</updated>
</feed>"#;

    const ERROR_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>arXiv Query Results</title>
  <id>http://arxiv.org/api/query</id>
  <updated>2023-01-16T00:00:00-05:00</updated>
  <entry>
    <id>http://arxiv.org/api/errors#incorrect_id_format_for_nonsense</id>
    <title>Error</title>
    <summary>incorrect id format for nonsense</summary>
    <updated>2023-01-16T00:00:00-05:00</updated>
  </entry>
</feed>"#;

    fn source_for(server: &mockito::ServerGuard) -> ArxivSource {
        ArxivSource::new()
            .unwrap()
            .with_endpoints(format!("{}/api/query", server.url()), format!("{}/pdf", server.url()))
            .with_retry_config(RetryConfig::default().max_attempts(1))
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(ArxivSource::parse_id("2301.12345").unwrap(), "2301.12345");
        assert_eq!(ArxivSource::parse_id("arXiv:2301.12345").unwrap(), "2301.12345");
        assert_eq!(
            ArxivSource::parse_id("https://arxiv.org/abs/2301.12345v1").unwrap(),
            "2301.12345"
        );
        assert_eq!(ArxivSource::parse_id("2301.12345v2").unwrap(), "2301.12345");
        assert_eq!(ArxivSource::parse_id("math.GT/0104020").unwrap(), "math.GT/0104020");
        assert_eq!(ArxivSource::parse_id("solv-int/9901001v1").unwrap(), "solv-int/9901001");
    }

    #[test]
    fn test_normalize_id_is_lookup_key() {
        let source: Box<dyn Source> = Box::new(ArxivSource::new().unwrap());
        assert_eq!(source.normalize_id(" arXiv:2301.12345v2 ").unwrap(), "2301.12345");
        assert_eq!(
            source.normalize_id("http://arxiv.org/abs/2301.12345v3").unwrap(),
            "2301.12345"
        );
        assert!(source.normalize_id("").is_err());
    }

    #[test]
    fn test_parse_id_errors() {
        assert!(ArxivSource::parse_id("").is_err());
        assert!(ArxivSource::parse_id("   ").is_err());
    }

    #[test]
    fn test_build_search_query() {
        let query = SearchQuery::new("machine learning")
            .category("cs.AI")
            .category("cs.LG");

        let search = ArxivSource::build_search_query(&query);
        assert_eq!(search, "(machine learning) AND (cat:cs.AI OR cat:cs.LG)");
    }

    #[test]
    fn test_build_search_query_with_dates() {
        let query = SearchQuery::new("neural networks").dates(
            NaiveDate::from_ymd_opt(2020, 1, 1),
            NaiveDate::from_ymd_opt(2020, 12, 31),
        );
        let search = ArxivSource::build_search_query(&query);
        assert!(search.ends_with("submittedDate:[202001010000 TO 202012312359]"));
    }

    #[test]
    fn test_build_search_query_empty() {
        assert!(ArxivSource::build_search_query(&SearchQuery::new("  ")).is_empty());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2023-01-15").unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 15).unwrap()
        );
        assert!(parse_date("15/01/2023").is_err());
    }

    #[tokio::test]
    async fn test_get_by_id_parses_entry() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/query")
            .match_query(mockito::Matcher::UrlEncoded(
                "id_list".into(),
                "2301.12345".into(),
            ))
            .with_status(200)
            .with_body(ONE_ENTRY_FEED)
            .create_async()
            .await;

        let paper = source_for(&server).get_by_id("2301.12345").await.unwrap();

        assert_eq!(paper.paper_id, "2301.12345");
        assert_eq!(paper.title, "Test Paper Title");
        assert_eq!(paper.authors, vec!["Test Author", "Second Author"]);
        assert_eq!(paper.categories, vec!["cs.AI", "cs.LG"]);
        assert_eq!(
            paper.pdf_url.as_deref(),
            Some(format!("{}/pdf/2301.12345.pdf", server.url()).as_str())
        );
        assert!(paper.published.is_some());
    }

    #[tokio::test]
    async fn test_get_by_id_empty_feed_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/query")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(EMPTY_FEED)
            .create_async()
            .await;

        let err = source_for(&server).get_by_id("9999.00000").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_by_id_error_entry_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/query")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(ERROR_FEED)
            .create_async()
            .await;

        let err = source_for(&server).get_by_id("nonsense").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_server_error_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/query")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let err = source_for(&server).get_by_id("2301.12345").await.unwrap_err();
        assert!(matches!(err, SourceError::Api(_)));
    }

    #[tokio::test]
    async fn test_search_returns_papers() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/query")
            .match_query(mockito::Matcher::UrlEncoded(
                "search_query".into(),
                "(attention) AND (cat:cs.AI)".into(),
            ))
            .with_status(200)
            .with_body(ONE_ENTRY_FEED)
            .create_async()
            .await;

        let query = SearchQuery::new("attention").category("cs.AI").max_results(5);
        let response = source_for(&server).search(&query).await.unwrap();

        assert_eq!(response.total_results, 1);
        assert_eq!(response.papers[0].paper_id, "2301.12345");
    }

    #[tokio::test]
    async fn test_download_writes_pdf() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/pdf/2301.12345.pdf")
            .with_status(200)
            .with_body("%PDF-1.5 body")
            .create_async()
            .await;

        let source = source_for(&server);
        let paper = PaperBuilder::new("2301.12345", "T", "u").build();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("2301.12345.pdf");

        let bytes = source.download(&paper, &dest).await.unwrap();
        assert_eq!(bytes, 13);
        assert!(dest.exists());
    }
}
