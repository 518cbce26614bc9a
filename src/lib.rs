//! # arXiv MCP
//!
//! A Model Context Protocol (MCP) server that lets an agent search arXiv,
//! download papers, convert them to text and read them back from a local
//! library.
//!
//! ## Architecture
//!
//! - [`models`]: Core data structures (Paper, SearchQuery, lifecycle records, status payloads)
//! - [`sources`]: The remote paper repository behind a trait (arXiv, mock)
//! - [`store`]: Local paper cache and its metadata index
//! - [`acquisition`]: Download lifecycle, tracker and background conversion
//! - [`mcp`]: Tool catalog, dispatcher, prompts and the pmcp server
//! - [`utils`]: HTTP client, retry, PDF text extraction
//! - [`config`]: Configuration management

pub mod acquisition;
pub mod config;
pub mod mcp;
pub mod models;
pub mod sources;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use models::Paper;
pub use sources::Source;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
