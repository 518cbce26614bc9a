//! MCP server implementation using pmcp (Pragmatic AI's rust-mcp-sdk).
//!
//! Serves the tool catalog over stdio or streamable HTTP. Each tool is
//! registered as its own pmcp handler that forwards to the shared
//! [`ToolDispatcher`].

use async_trait::async_trait;
use pmcp::{
    server::streamable_http_server::StreamableHttpServer, Error, RequestHandlerExtra, Server,
    ServerCapabilities, ToolHandler, ToolInfo,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::tools::{ToolDispatcher, ToolError, ToolName};

/// The MCP server for arXiv papers
#[derive(Debug)]
pub struct McpServer {
    server: Server,
}

impl McpServer {
    /// Create a new MCP server over the given dispatcher
    pub fn new(dispatcher: Arc<ToolDispatcher>) -> Result<Self, pmcp::Error> {
        let mut builder = Server::builder()
            .name("arxiv-mcp")
            .version(env!("CARGO_PKG_VERSION"))
            .capabilities(ServerCapabilities::default());

        for name in ToolName::ALL {
            builder = builder.tool(
                name.as_str().to_string(),
                ToolWrapper {
                    name,
                    dispatcher: dispatcher.clone(),
                },
            );
        }

        Ok(Self {
            server: builder.build()?,
        })
    }

    /// Run the server in stdio mode (for Claude Desktop and other MCP clients)
    pub async fn run(self) -> Result<(), pmcp::Error> {
        tracing::info!("Starting MCP server in stdio mode");
        self.server.run_stdio().await
    }

    /// Run the server in streamable HTTP mode
    pub async fn run_http(self, addr: &str) -> Result<(SocketAddr, JoinHandle<()>), pmcp::Error> {
        tracing::info!("Starting MCP server in HTTP mode on {}", addr);

        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::invalid_params(format!("Invalid address: {}", e)))?;

        StreamableHttpServer::new(socket_addr, Arc::new(Mutex::new(self.server)))
            .start()
            .await
    }
}

/// Adapts one [`ToolName`] to pmcp's ToolHandler
#[derive(Debug, Clone)]
struct ToolWrapper {
    name: ToolName,
    dispatcher: Arc<ToolDispatcher>,
}

#[async_trait]
impl ToolHandler for ToolWrapper {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> Result<Value, Error> {
        let name = self.name;
        let dispatcher = self.dispatcher.clone();

        // a panicking handler fails this call only
        let outcome = tokio::spawn(async move {
            let call = name.parse_call(args)?;
            Ok::<_, ToolError>(dispatcher.dispatch(call).await)
        })
        .await;

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e @ ToolError::MalformedRequest { .. })) => Err(Error::invalid_params(e.to_string())),
            Ok(Err(e)) => Err(Error::internal(e.to_string())),
            Err(e) => {
                tracing::error!(tool = %name, "Tool handler failed: {}", e);
                Err(Error::internal(format!("Tool {} failed: {}", name, e)))
            }
        }
    }

    fn metadata(&self) -> Option<ToolInfo> {
        Some(ToolInfo::new(
            self.name.as_str().to_string(),
            Some(self.name.description().to_string()),
            self.name.input_schema(),
        ))
    }
}
