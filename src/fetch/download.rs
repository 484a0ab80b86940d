//! HTTP downloads into temporary files.

use crate::error::{InstallerError, Result};
use crate::ui::StatusSink;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempPath;
use tracing::debug;

/// Fetches a URL into a temporary file.
///
/// The returned [`TempPath`] removes the file when dropped, so a
/// downloaded archive or installer is cleaned up on every exit path.
pub trait Downloader: Send + Sync {
    fn download<'a>(
        &'a self,
        url: &'a str,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<TempPath>>;
}

/// Downloads over HTTP(S) with reqwest.
pub struct HttpDownloader {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpDownloader {
    /// Create a downloader with a 5-minute timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(300))
    }

    /// Create a downloader with a custom timeout.
    ///
    /// Fails if the TLS backend cannot be initialised.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("deckhand/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self { client, timeout })
    }

    /// Get the configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, url: &str, sink: &dyn StatusSink) -> Result<TempPath> {
        let network = |message: String| InstallerError::Network {
            url: url.to_string(),
            message,
        };

        debug!(url, "Downloading");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(network(format!("HTTP {}", status)));
        }

        let bytes = response.bytes().await.map_err(|e| network(e.to_string()))?;
        sink.on_log_line(&format!("Downloaded {} bytes from {}", bytes.len(), url));

        let path = write_temp(url, &bytes).map_err(|e| network(e.to_string()))?;
        Ok(path)
    }
}

impl Downloader for HttpDownloader {
    fn download<'a>(
        &'a self,
        url: &'a str,
        sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<TempPath>> {
        Box::pin(self.fetch(url, sink))
    }
}

/// Serves fixed bodies from memory, for tests and offline runs.
#[derive(Debug, Default)]
pub struct MemoryDownloader {
    bodies: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`. Unknown URLs fail with `Network`.
    pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_string(), body.into());
        self
    }

    /// URLs requested so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Downloader for MemoryDownloader {
    fn download<'a>(
        &'a self,
        url: &'a str,
        _sink: &'a dyn StatusSink,
    ) -> BoxFuture<'a, Result<TempPath>> {
        Box::pin(async move {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(url.to_string());
            }
            let body = self.bodies.get(url).ok_or_else(|| InstallerError::Network {
                url: url.to_string(),
                message: "HTTP 404 Not Found".to_string(),
            })?;
            write_temp(url, body).map_err(|e| InstallerError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })
        })
    }
}

/// Write `bytes` to a fresh temp file whose extension follows the URL.
fn write_temp(url: &str, bytes: &[u8]) -> std::io::Result<TempPath> {
    use std::io::Write;

    let suffix = url_extension(url)
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    let mut file = tempfile::Builder::new()
        .prefix("deckhand-")
        .suffix(&suffix)
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file.into_temp_path())
}

/// Extension of the last URL path segment (`msi`, `zip`, ...).
///
/// Installers such as `msiexec` refuse files without the right extension.
pub fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    (!ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())).then_some(ext)
}
