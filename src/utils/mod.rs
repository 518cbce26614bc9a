//! Utility modules supporting repository access and conversion.
//!
//! - [`HttpClient`]: shared reqwest client with streaming downloads
//! - [`extract_text`]: extract text content from PDF files
//! - [`with_retry`]: execute an operation with automatic retry on transient errors
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use arxiv_mcp::sources::SourceError;
//! use arxiv_mcp::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_data() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let config = RetryConfig::default().max_attempts(3);
//! let data = with_retry(config, || fetch_data()).await?;
//! # Ok(())
//! # }
//! ```

mod http;
mod pdf;
mod retry;

pub use http::HttpClient;
pub use pdf::{extract_text, PdfExtractError};
pub use retry::{api_retry_config, with_retry, RetryConfig, TransientError};
