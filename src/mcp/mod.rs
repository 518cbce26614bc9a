//! MCP (Model Context Protocol) implementation.

mod prompts;
pub mod server;
mod tools;

pub use prompts::{Prompt, PromptCatalog, PromptError};
pub use server::McpServer;
pub use tools::{
    DownloadParams, GetPromptParams, ReadParams, SearchParams, ToolCall, ToolDispatcher,
    ToolError, ToolName,
};
