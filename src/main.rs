use anyhow::{Context, Result};
use arxiv_mcp::config::{load_settings, Settings, ENV_PREFIX, STORAGE_PATH_ENV};
use arxiv_mcp::mcp::{McpServer, ToolDispatcher, ToolName};
use arxiv_mcp::models::{SortBy, StatusKind};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// arXiv MCP - search, download and read arXiv papers from MCP clients
#[derive(Parser, Debug)]
#[command(name = "arxiv-mcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search, download and read arXiv papers over the Model Context Protocol", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding downloaded and converted papers
    #[arg(long, global = true, env = STORAGE_PATH_ENV)]
    storage_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Sort field for search results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SortField {
    /// Sort by relevance
    Relevance,
    /// Sort by submission date
    Date,
}

impl From<SortField> for SortBy {
    fn from(field: SortField) -> Self {
        match field {
            SortField::Relevance => SortBy::Relevance,
            SortField::Date => SortBy::Date,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the MCP server (default)
    Serve {
        /// Serve streamable HTTP instead of stdio
        #[arg(long)]
        http: bool,

        /// Port for HTTP mode
        #[arg(long, short, default_value_t = 3000)]
        port: u16,

        /// Host to bind to for HTTP mode
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Search arXiv
    #[command(alias = "s")]
    Search {
        /// Search query string
        query: String,

        /// Maximum number of results
        #[arg(long, short, default_value_t = 10)]
        max_results: usize,

        /// Category filter, may be repeated (e.g. -c cs.AI -c cs.LG)
        #[arg(long = "category", short)]
        categories: Vec<String>,

        /// Earliest submission date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Latest submission date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Sort order of the results
        #[arg(long, value_enum, default_value_t = SortField::Relevance)]
        sort_by: SortField,
    },

    /// Download a paper and convert it to text
    #[command(alias = "d")]
    Download {
        /// arXiv identifier (e.g. 2301.12345)
        paper_id: String,

        /// Only report the current status
        #[arg(long)]
        check_status: bool,

        /// Seconds to wait for the conversion to finish (0 returns immediately)
        #[arg(long, default_value_t = 300)]
        wait: u64,
    },

    /// List stored papers
    #[command(alias = "ls")]
    List,

    /// Print the text of a stored paper
    Read {
        /// arXiv identifier
        paper_id: String,
    },

    /// List the tools offered over MCP
    Tools,

    /// Show recognized environment variables
    Env,
}

fn print_env_vars() {
    println!("arXiv MCP - Environment Variables");
    println!("=================================");
    println!();
    println!("Storage:");
    println!(
        "  {:<40} Paper storage directory (default: ~/.arxiv-mcp-server/papers)",
        STORAGE_PATH_ENV
    );
    println!();
    println!("Settings (override the config file):");
    for (key, help) in [
        ("MAX_RESULTS", "Upper bound on search results (default: 50)"),
        ("REQUEST_TIMEOUT_SECS", "Timeout of each arXiv request (default: 60)"),
        ("CONVERSION_TIMEOUT_SECS", "Timeout of each PDF conversion (default: 300)"),
        ("MAX_CONCURRENT_CONVERSIONS", "Conversions running at once (default: 2)"),
        ("ARTIFACT_NAMING", "identifier or title (default: identifier)"),
    ] {
        println!("  {:<40} {}", format!("{}_{}", ENV_PREFIX, key), help);
    }
    println!();
    println!("Other Settings:");
    println!("  {:<40} Rust logging level (e.g., debug, info, warn, error)", "RUST_LOG");
    println!();
    println!("Example:");
    println!("  export {}=\"$HOME/papers\"", STORAGE_PATH_ENV);
    println!("  export {}_MAX_RESULTS=\"20\"", ENV_PREFIX);
}

fn init_tracing(verbose: u8, quiet: bool) {
    let log_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = if quiet { "error" } else { log_level };

    // stdout carries the MCP protocol in stdio mode
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("arxiv_mcp={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn call(dispatcher: &ToolDispatcher, tool: ToolName, args: Value) -> Result<Value> {
    dispatcher
        .call(tool.as_str(), args)
        .await
        .with_context(|| format!("{} failed", tool))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Some(Commands::Env)) {
        print_env_vars();
        return Ok(());
    }

    init_tracing(cli.verbose, cli.quiet);

    let settings: Settings = load_settings(cli.config.as_deref()).context("Failed to load configuration")?;
    let dispatcher = Arc::new(ToolDispatcher::from_settings(&settings, cli.storage_path.as_deref())?);

    match cli.command.unwrap_or(Commands::Serve {
        http: false,
        port: 3000,
        host: "127.0.0.1".to_string(),
    }) {
        Commands::Serve { http, port, host } => {
            let server = McpServer::new(dispatcher)?;

            if http {
                let addr = format!("{}:{}", host, port);
                let (bound_addr, handle) = server.run_http(&addr).await?;
                tracing::info!("MCP server listening on {}", bound_addr);

                tokio::select! {
                    joined = handle => joined.map_err(|e| anyhow::anyhow!("Server task failed: {}", e))?,
                    _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
                }
            } else {
                server.run().await?;
            }
        }

        Commands::Search {
            query,
            max_results,
            categories,
            from,
            to,
            sort_by,
        } => {
            let args = json!({
                "query": query,
                "max_results": max_results,
                "categories": categories,
                "date_from": from,
                "date_to": to,
                "sort_by": SortBy::from(sort_by),
            });
            print_json(&call(&dispatcher, ToolName::SearchPapers, args).await?)?;
        }

        Commands::Download {
            paper_id,
            check_status,
            wait,
        } => {
            let args = json!({"paper_id": paper_id, "check_status": check_status});
            let mut result = call(&dispatcher, ToolName::DownloadPaper, args).await?;

            let in_progress = matches!(
                serde_json::from_value::<StatusKind>(result["status"].clone()),
                Ok(StatusKind::Downloading | StatusKind::Converting)
            );
            if in_progress && !check_status && wait > 0 {
                tracing::info!("Waiting up to {}s for {} to convert", wait, paper_id);
                let status = dispatcher
                    .orchestrator()
                    .wait_until_settled(&paper_id, Duration::from_millis(500), Duration::from_secs(wait))
                    .await;
                result = serde_json::to_value(status)?;
            }
            print_json(&result)?;
        }

        Commands::List => {
            print_json(&call(&dispatcher, ToolName::ListPapers, Value::Null).await?)?;
        }

        Commands::Read { paper_id } => {
            let result = call(&dispatcher, ToolName::ReadPaper, json!({"paper_id": paper_id})).await?;
            match result.get("content").and_then(Value::as_str) {
                Some(content) => println!("{}", content),
                None => {
                    print_json(&result)?;
                    std::process::exit(1);
                }
            }
        }

        Commands::Tools => {
            let result = call(&dispatcher, ToolName::ListTools, Value::Null).await?;
            println!("{}", result.as_str().unwrap_or_default());
        }

        Commands::Env => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_version() {
        let version = env!("CARGO_PKG_VERSION");
        let parts: Vec<&str> = version.split('.').collect();
        assert!(parts.len() >= 2);
        assert!(parts[0].parse::<u32>().is_ok());
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["arxiv-mcp"]);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        assert!(cli.config.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::parse_from(["arxiv-mcp", "-v"]);
        assert_eq!(cli.verbose, 1);

        let cli = Cli::parse_from(["arxiv-mcp", "-vv"]);
        assert_eq!(cli.verbose, 2);

        let cli = Cli::parse_from(["arxiv-mcp", "list", "--verbose"]);
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_cli_storage_path_flag() {
        let cli = Cli::parse_from(["arxiv-mcp", "--storage-path", "/tmp/papers", "list"]);
        assert_eq!(cli.storage_path, Some(PathBuf::from("/tmp/papers")));
        assert!(matches!(cli.command, Some(Commands::List)));
    }

    #[test]
    fn test_cli_search_command() {
        let cli = Cli::parse_from([
            "arxiv-mcp",
            "search",
            "diffusion models",
            "-m",
            "5",
            "-c",
            "cs.CV",
            "-c",
            "cs.LG",
            "--sort-by",
            "date",
        ]);
        match cli.command {
            Some(Commands::Search {
                query,
                max_results,
                categories,
                sort_by,
                from,
                ..
            }) => {
                assert_eq!(query, "diffusion models");
                assert_eq!(max_results, 5);
                assert_eq!(categories, vec!["cs.CV", "cs.LG"]);
                assert_eq!(sort_by, SortField::Date);
                assert!(from.is_none());
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_download_command() {
        let cli = Cli::parse_from(["arxiv-mcp", "download", "2301.12345", "--check-status"]);
        match cli.command {
            Some(Commands::Download {
                paper_id,
                check_status,
                wait,
            }) => {
                assert_eq!(paper_id, "2301.12345");
                assert!(check_status);
                assert_eq!(wait, 300);
            }
            _ => panic!("Expected Download command"),
        }
    }

    #[test]
    fn test_cli_serve_command() {
        let cli = Cli::parse_from(["arxiv-mcp", "serve"]);
        match &cli.command {
            Some(Commands::Serve { http, port, host }) => {
                assert!(!*http);
                assert_eq!(*port, 3000);
                assert_eq!(host, "127.0.0.1");
            }
            _ => panic!("Expected Serve command"),
        }

        let cli = Cli::parse_from(["arxiv-mcp", "serve", "--http", "-p", "8080"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Serve { http: true, port: 8080, .. })
        ));
    }

    #[test]
    fn test_sort_field_maps_to_sort_by() {
        assert_eq!(SortBy::from(SortField::Date), SortBy::Date);
        assert_eq!(SortBy::from(SortField::Relevance), SortBy::Relevance);
    }
}
