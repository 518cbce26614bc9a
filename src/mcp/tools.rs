//! Tool catalog and dispatch for MCP tools.
//!
//! Every tool the server offers is a [`ToolName`] variant; a call is parsed
//! into a [`ToolCall`] carrying typed parameters and then matched
//! exhaustively by [`ToolDispatcher::dispatch`]. Tool-level failures (paper
//! not found, search failed, ...) come back inside the result payload as
//! `{"status": "error", "message": ...}`; only unknown tools and malformed
//! parameters are reported as [`ToolError`].

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::prompts::PromptCatalog;
use crate::acquisition::{AcquisitionOrchestrator, DocumentConverter, PdfTextConverter};
use crate::config::Settings;
use crate::models::{LifecycleState, SearchQuery, SortBy};
use crate::sources::{parse_date, ArxivSource, Source, SourceError};
use crate::store::{PaperStore, StoreError};

/// Errors reported at the dispatch boundary
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    MalformedRequest { tool: &'static str, message: String },
}

/// The tools offered by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    SearchPapers,
    DownloadPaper,
    ListPapers,
    ReadPaper,
    ListTools,
    ListPrompts,
    GetPrompt,
}

impl ToolName {
    pub const ALL: [ToolName; 7] = [
        ToolName::SearchPapers,
        ToolName::DownloadPaper,
        ToolName::ListPapers,
        ToolName::ReadPaper,
        ToolName::ListTools,
        ToolName::ListPrompts,
        ToolName::GetPrompt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::SearchPapers => "search_papers",
            ToolName::DownloadPaper => "download_paper",
            ToolName::ListPapers => "list_papers",
            ToolName::ReadPaper => "read_paper",
            ToolName::ListTools => "list_tools",
            ToolName::ListPrompts => "list_prompts",
            ToolName::GetPrompt => "get_prompt",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolName::SearchPapers => {
                "Search for papers on arXiv with advanced filtering. \
                 Supports category filters, a submission date window and sorting by relevance or date."
            }
            ToolName::DownloadPaper => {
                "Download a paper and convert it to text for reading. \
                 Returns immediately; poll with check_status to follow the conversion."
            }
            ToolName::ListPapers => {
                "List all papers stored in the local library. \
                 Includes the metadata recorded when each paper was converted."
            }
            ToolName::ReadPaper => {
                "Read the full text of a downloaded paper. \
                 The paper must have been downloaded with download_paper first."
            }
            ToolName::ListTools => "List all available tools in the arXiv MCP server.",
            ToolName::ListPrompts => "List the research prompts offered by the server.",
            ToolName::GetPrompt => {
                "Render a research prompt. \
                 Pass the prompt name and its arguments."
            }
        }
    }

    /// Text before the first period of the description
    pub fn summary(self) -> &'static str {
        let description = self.description();
        description.split('.').next().unwrap_or(description)
    }

    /// JSON Schema of the tool's parameters
    pub fn input_schema(self) -> Value {
        match self {
            ToolName::SearchPapers => json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query string"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of results to return",
                        "default": 10
                    },
                    "categories": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "arXiv categories to filter by (e.g. ['cs.AI', 'cs.LG'])"
                    },
                    "date_from": {
                        "type": "string",
                        "description": "Earliest submission date (YYYY-MM-DD)"
                    },
                    "date_to": {
                        "type": "string",
                        "description": "Latest submission date (YYYY-MM-DD)"
                    },
                    "sort_by": {
                        "type": "string",
                        "enum": ["relevance", "date"],
                        "default": "relevance"
                    }
                },
                "required": ["query"]
            }),
            ToolName::DownloadPaper => json!({
                "type": "object",
                "properties": {
                    "paper_id": {
                        "type": "string",
                        "description": "The arXiv ID of the paper (e.g. '2301.12345')"
                    },
                    "check_status": {
                        "type": "boolean",
                        "description": "Only report the status of an earlier request",
                        "default": false
                    }
                },
                "required": ["paper_id"]
            }),
            ToolName::ReadPaper => json!({
                "type": "object",
                "properties": {
                    "paper_id": {
                        "type": "string",
                        "description": "The arXiv ID of the paper to read"
                    }
                },
                "required": ["paper_id"]
            }),
            ToolName::GetPrompt => json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Name of the prompt"
                    },
                    "arguments": {
                        "type": "object",
                        "additionalProperties": {"type": "string"},
                        "description": "Prompt arguments"
                    }
                },
                "required": ["name"]
            }),
            ToolName::ListPapers | ToolName::ListTools | ToolName::ListPrompts => json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    /// Parse raw arguments into a typed call
    pub fn parse_call(self, args: Value) -> Result<ToolCall, ToolError> {
        let call = match self {
            ToolName::SearchPapers => {
                let raw: RawSearchParams = self.params(args)?;
                ToolCall::SearchPapers(raw.validate(self)?)
            }
            ToolName::DownloadPaper => {
                let mut params: DownloadParams = self.params(args)?;
                params.paper_id = self.required(&params.paper_id, "paper_id")?;
                ToolCall::DownloadPaper(params)
            }
            ToolName::ReadPaper => {
                let mut params: ReadParams = self.params(args)?;
                params.paper_id = self.required(&params.paper_id, "paper_id")?;
                ToolCall::ReadPaper(params)
            }
            ToolName::GetPrompt => {
                let mut params: GetPromptParams = self.params(args)?;
                params.name = self.required(&params.name, "name")?;
                ToolCall::GetPrompt(params)
            }
            ToolName::ListPapers => ToolCall::ListPapers,
            ToolName::ListTools => ToolCall::ListTools,
            ToolName::ListPrompts => ToolCall::ListPrompts,
        };
        Ok(call)
    }

    fn params<T: DeserializeOwned>(self, args: Value) -> Result<T, ToolError> {
        let args = if args.is_null() { json!({}) } else { args };
        serde_json::from_value(args).map_err(|e| self.malformed(e.to_string()))
    }

    fn required(self, value: &str, field: &str) -> Result<String, ToolError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(self.malformed(format!("'{}' must not be empty", field)));
        }
        Ok(value.to_string())
    }

    fn malformed(self, message: String) -> ToolError {
        ToolError::MalformedRequest {
            tool: self.as_str(),
            message,
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    SearchPapers(SearchParams),
    DownloadPaper(DownloadParams),
    ListPapers,
    ReadPaper(ReadParams),
    ListTools,
    ListPrompts,
    GetPrompt(GetPromptParams),
}

#[derive(Debug, Deserialize)]
struct RawSearchParams {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    date_from: Option<String>,
    #[serde(default)]
    date_to: Option<String>,
    #[serde(default)]
    sort_by: SortBy,
}

impl RawSearchParams {
    fn validate(self, tool: ToolName) -> Result<SearchParams, ToolError> {
        let date = |value: Option<String>| -> Result<Option<NaiveDate>, ToolError> {
            value
                .filter(|v| !v.trim().is_empty())
                .map(|v| parse_date(&v).map_err(|e| tool.malformed(e.to_string())))
                .transpose()
        };

        let params = SearchParams {
            query: tool.required(&self.query, "query")?,
            max_results: self.max_results,
            categories: self
                .categories
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            date_from: date(self.date_from)?,
            date_to: date(self.date_to)?,
            sort_by: self.sort_by,
        };

        if let (Some(from), Some(to)) = (params.date_from, params.date_to) {
            if from > to {
                return Err(tool.malformed(format!("date_from {} is after date_to {}", from, to)));
            }
        }
        Ok(params)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub query: String,
    pub max_results: Option<usize>,
    pub categories: Vec<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub sort_by: SortBy,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DownloadParams {
    pub paper_id: String,
    #[serde(default)]
    pub check_status: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadParams {
    pub paper_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GetPromptParams {
    pub name: String,
    #[serde(default)]
    pub arguments: HashMap<String, String>,
}

const DEFAULT_SEARCH_RESULTS: usize = 10;

fn error_payload(message: impl Into<String>) -> Value {
    json!({"status": "error", "message": message.into()})
}

/// Executes tool calls against the acquisition subsystem and prompt catalog
#[derive(Debug)]
pub struct ToolDispatcher {
    orchestrator: AcquisitionOrchestrator,
    prompts: PromptCatalog,
    max_results: usize,
}

impl ToolDispatcher {
    pub fn new(orchestrator: AcquisitionOrchestrator, max_results: usize) -> Self {
        Self {
            orchestrator,
            prompts: PromptCatalog::new(),
            max_results: max_results.max(1),
        }
    }

    /// Wire up the production stack: arXiv source, PDF text converter and the
    /// store at the resolved storage root.
    ///
    /// Spawns the conversion worker, so it must run inside a Tokio runtime.
    pub fn from_settings(
        settings: &Settings,
        storage_override: Option<&Path>,
    ) -> Result<Self, SourceError> {
        let source: Arc<dyn Source> = Arc::new(ArxivSource::with_timeout(settings.request_timeout())?);
        let converter: Arc<dyn DocumentConverter> = Arc::new(PdfTextConverter::new());
        let root = settings.resolve_storage_path(storage_override);
        tracing::info!("Storing papers in {}", root.display());
        let store = Arc::new(PaperStore::new(root, settings.artifact_naming));

        let orchestrator = AcquisitionOrchestrator::start(
            source,
            store,
            converter,
            settings.acquisition_options(),
        );
        Ok(Self::new(orchestrator, settings.max_results))
    }

    pub fn orchestrator(&self) -> &AcquisitionOrchestrator {
        &self.orchestrator
    }

    /// Call a tool by name
    pub async fn call(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = ToolName::from_name(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let call = tool.parse_call(args)?;
        Ok(self.dispatch(call).await)
    }

    pub async fn dispatch(&self, call: ToolCall) -> Value {
        tracing::debug!(?call, "Dispatching tool call");
        match call {
            ToolCall::SearchPapers(params) => self.search(params).await,
            ToolCall::DownloadPaper(params) => self.download(params).await,
            ToolCall::ListPapers => self.list_papers(),
            ToolCall::ReadPaper(params) => self.read_paper(&params.paper_id),
            ToolCall::ListTools => Value::String(self.list_tools()),
            ToolCall::ListPrompts => Value::String(format!(
                "Available prompts: {}",
                self.prompts.names().join(", ")
            )),
            ToolCall::GetPrompt(params) => match self.prompts.render(&params.name, &params.arguments) {
                Ok(text) => Value::String(text),
                Err(e) => error_payload(e.to_string()),
            },
        }
    }

    async fn search(&self, params: SearchParams) -> Value {
        let max_results = params
            .max_results
            .unwrap_or(DEFAULT_SEARCH_RESULTS)
            .clamp(1, self.max_results);

        let mut query = SearchQuery::new(params.query)
            .max_results(max_results)
            .dates(params.date_from, params.date_to)
            .sort_by(params.sort_by);
        for category in params.categories {
            query = query.category(category);
        }

        match self.orchestrator.source().search(&query).await {
            Ok(response) => json!({
                "total_results": response.total_results,
                "papers": response.papers,
            }),
            Err(e) => {
                tracing::warn!("Search failed: {}", e);
                error_payload(format!("Error: {}", e))
            }
        }
    }

    async fn download(&self, params: DownloadParams) -> Value {
        let status = self
            .orchestrator
            .acquire(&params.paper_id, params.check_status)
            .await;
        serde_json::to_value(status).unwrap_or_else(|e| error_payload(format!("Error: {}", e)))
    }

    fn list_papers(&self) -> Value {
        match self.orchestrator.store().list_papers() {
            Ok(papers) => json!({
                "total_papers": papers.len(),
                "papers": papers,
            }),
            Err(e) => error_payload(format!("Error: {}", e)),
        }
    }

    fn read_paper(&self, paper_id: &str) -> Value {
        let paper_id = match self.orchestrator.canonical_id(paper_id) {
            Ok(id) => id,
            Err(e) => return error_payload(format!("Error: {}", e)),
        };
        let paper_id = paper_id.as_str();

        match self.orchestrator.store().read_paper(paper_id) {
            Ok(content) => json!({
                "status": "success",
                "paper_id": paper_id,
                "content": content,
            }),
            Err(StoreError::NotFound(_)) => error_payload(self.unreadable_reason(paper_id)),
            Err(e) => error_payload(format!("Error: {}", e)),
        }
    }

    fn unreadable_reason(&self, paper_id: &str) -> String {
        match self.orchestrator.tracker().get(paper_id) {
            Some(record) if !record.state.is_terminal() => format!(
                "Paper {} is still {}. Check progress with download_paper and check_status.",
                paper_id, record.state
            ),
            Some(record) if record.state == LifecycleState::Error => format!(
                "Paper {} could not be converted: {}",
                paper_id,
                record.error.as_deref().unwrap_or("unknown error")
            ),
            _ => format!(
                "Paper {} not found in storage. You may need to download it first using download_paper.",
                paper_id
            ),
        }
    }

    fn list_tools(&self) -> String {
        ToolName::ALL
            .iter()
            .map(|tool| format!("{}: {}", tool.as_str(), tool.summary()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_round_trip() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::from_name(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolName::from_name("fetch_everything"), None);
    }

    #[test]
    fn test_summary_is_first_sentence() {
        assert_eq!(
            ToolName::DownloadPaper.summary(),
            "Download a paper and convert it to text for reading"
        );
    }

    #[test]
    fn test_parse_download() {
        let call = ToolName::DownloadPaper
            .parse_call(json!({"paper_id": " 2301.12345 ", "check_status": true}))
            .unwrap();
        assert_eq!(
            call,
            ToolCall::DownloadPaper(DownloadParams {
                paper_id: "2301.12345".to_string(),
                check_status: true,
            })
        );
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let err = ToolName::DownloadPaper.parse_call(json!({})).unwrap_err();
        assert!(matches!(
            err,
            ToolError::MalformedRequest { tool: "download_paper", .. }
        ));

        let err = ToolName::ReadPaper
            .parse_call(json!({"paper_id": "  "}))
            .unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn test_parse_search() {
        let call = ToolName::SearchPapers
            .parse_call(json!({
                "query": "graph neural networks",
                "categories": ["cs.LG", " "],
                "date_from": "2023-01-01",
                "sort_by": "date"
            }))
            .unwrap();

        let ToolCall::SearchPapers(params) = call else {
            panic!("expected a search call");
        };
        assert_eq!(params.categories, vec!["cs.LG"]);
        assert_eq!(params.date_from, NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(params.date_to, None);
        assert_eq!(params.sort_by, SortBy::Date);
    }

    #[test]
    fn test_search_rejects_bad_dates() {
        let bad_format = ToolName::SearchPapers
            .parse_call(json!({"query": "x", "date_from": "01/02/2023"}))
            .unwrap_err();
        assert!(matches!(bad_format, ToolError::MalformedRequest { .. }));

        let inverted = ToolName::SearchPapers
            .parse_call(json!({"query": "x", "date_from": "2024-01-01", "date_to": "2023-01-01"}))
            .unwrap_err();
        assert!(inverted.to_string().contains("after"));
    }

    #[test]
    fn test_parameterless_tools_accept_null() {
        assert_eq!(ToolName::ListPapers.parse_call(Value::Null), Ok(ToolCall::ListPapers));
        assert_eq!(ToolName::ListTools.parse_call(json!({"extra": 1})), Ok(ToolCall::ListTools));
    }

    #[test]
    fn test_schemas_are_objects() {
        for tool in ToolName::ALL {
            assert_eq!(tool.input_schema()["type"], "object", "{}", tool);
        }
    }
}
