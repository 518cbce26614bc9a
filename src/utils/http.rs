//! HTTP client utilities.

use reqwest::{Client, RequestBuilder, StatusCode};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::sources::SourceError;

/// Default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a new HTTP client whose requests give up after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Start a GET request
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Stream the body at `url` into `dest`.
    ///
    /// A partially written file is removed before an error is returned.
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, SourceError> {
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(url.to_string()));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimit);
        }
        if !status.is_success() {
            return Err(SourceError::Api(format!(
                "Download of {} returned status: {}",
                url, status
            )));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let written: Result<u64, SourceError> = async {
            let mut file = tokio::fs::File::create(dest).await?;
            let mut bytes = 0u64;
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
                bytes += chunk.len() as u64;
            }
            file.flush().await?;
            if bytes == 0 {
                return Err(SourceError::Api(format!("Empty document at {}", url)));
            }
            Ok(bytes)
        }
        .await;

        if written.is_err() {
            if let Err(e) = tokio::fs::remove_file(dest).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove partial download {}: {}", dest.display(), e);
                }
            }
        }

        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_download_to_writes_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/pdf/1.pdf")
            .with_status(200)
            .with_body("%PDF-1.4 test")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("1.pdf");
        let client = HttpClient::new().unwrap();

        let bytes = client
            .download_to(&format!("{}/pdf/1.pdf", server.url()), &dest)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, 13);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "%PDF-1.4 test");
    }

    #[tokio::test]
    async fn test_download_to_not_found_leaves_nothing() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/pdf/missing.pdf")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing.pdf");
        let client = HttpClient::new().unwrap();

        let err = client
            .download_to(&format!("{}/pdf/missing.pdf", server.url()), &dest)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_download_to_empty_body_is_removed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/pdf/empty.pdf")
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("empty.pdf");
        let client = HttpClient::new().unwrap();

        let result = client
            .download_to(&format!("{}/pdf/empty.pdf", server.url()), &dest)
            .await;

        assert!(matches!(result, Err(SourceError::Api(_))));
        assert!(!dest.exists());
    }
}
