//! Configuration management.
//!
//! Settings come from built-in defaults, an optional TOML file and
//! `ARXIV_MCP_*` environment variables, later sources winning:
//!
//! ```toml
//! storage_path = "~/papers"
//! max_results = 50
//! request_timeout_secs = 60
//! conversion_timeout_secs = 300
//! max_concurrent_conversions = 2
//! artifact_naming = "identifier"   # or "title"
//! ```
//!
//! The storage root itself is resolved by [`Settings::resolve_storage_path`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::acquisition::AcquisitionOptions;
use crate::store::ArtifactNaming;

/// Environment variable that overrides the configured storage root
pub const STORAGE_PATH_ENV: &str = "ARXIV_STORAGE_PATH";

/// Prefix of environment variables mapped onto [`Settings`] fields
pub const ENV_PREFIX: &str = "ARXIV_MCP";

const APP_DIR: &str = "arxiv-mcp";

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Storage root for documents, converted text and the index
    pub storage_path: Option<PathBuf>,

    /// Upper bound on search results per request
    pub max_results: usize,

    /// Bound on each remote call (metadata lookup, document download)
    pub request_timeout_secs: u64,

    pub conversion_timeout_secs: u64,

    pub max_concurrent_conversions: usize,

    /// How new artifacts are named on disk
    pub artifact_naming: ArtifactNaming,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_path: None,
            max_results: 50,
            request_timeout_secs: 60,
            conversion_timeout_secs: 300,
            max_concurrent_conversions: 2,
            artifact_naming: ArtifactNaming::Identifier,
        }
    }
}

impl Settings {
    /// Storage root, first match wins: `override_path` (the CLI flag, which
    /// also carries `ARXIV_STORAGE_PATH`), configured `storage_path`, then
    /// `~/.arxiv-mcp-server/papers`.
    pub fn resolve_storage_path(&self, override_path: Option<&Path>) -> PathBuf {
        override_path
            .map(Path::to_path_buf)
            .or_else(|| self.storage_path.clone())
            .map(|p| expand_home(&p))
            .unwrap_or_else(default_storage_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn acquisition_options(&self) -> AcquisitionOptions {
        AcquisitionOptions {
            request_timeout: self.request_timeout(),
            conversion_timeout: Duration::from_secs(self.conversion_timeout_secs),
            max_concurrent_conversions: self.max_concurrent_conversions.max(1),
        }
    }
}

/// Load settings from `path` (required to exist) or the default config file
/// (used when present), then apply `ARXIV_MCP_*` environment overrides.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, config::ConfigError> {
    let mut builder = config::Config::builder();

    match path {
        Some(path) => {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        None => {
            if let Some(default) = find_config_file() {
                tracing::debug!("Using config file {}", default.display());
                builder = builder.add_source(config::File::from(default).required(false));
            }
        }
    }

    builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()?
        .try_deserialize()
}

/// `<config dir>/arxiv-mcp/config.toml`, if it exists
pub fn find_config_file() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join(APP_DIR).join("config.toml");
    path.is_file().then_some(path)
}

/// `~/.arxiv-mcp-server/papers`
pub fn default_storage_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".arxiv-mcp-server")
        .join("papers")
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
