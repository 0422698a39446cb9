//! Pluggable payload transport.
//!
//! Adapters fetch through a [`Transport`] so the core treats a live HTTP
//! endpoint and a local mock file identically. Classification of failures
//! into retryable vs terminal happens in [`FetchError`], not here.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::FetchError;

/// Returns raw payload bytes for a source location.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, location: &str) -> Result<Vec<u8>, FetchError>;
}

/// Live HTTP transport backed by reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sanctions-watch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Other(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        debug!(url = location, "fetching payload");
        let response = self.client.get(location).send().await?;

        let status = response.status().as_u16();
        if status == 429 {
            return Err(FetchError::RateLimited);
        }
        if status >= 400 {
            return Err(FetchError::Status(status));
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Offline transport reading payloads from local files. `location` is a
/// path, optionally resolved relative to a base directory.
pub struct FileTransport {
    base: Option<PathBuf>,
}

impl FileTransport {
    pub fn new(base: Option<PathBuf>) -> Self {
        Self { base }
    }

    fn resolve(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        match (&self.base, path.is_absolute()) {
            (Some(base), false) => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn get(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.resolve(location);
        debug!(path = %path.display(), "reading mock payload");
        tokio::fs::read(&path)
            .await
            .map_err(|_| FetchError::NotFound(path.display().to_string()))
    }
}

/// Dispatches on the location scheme: http(s) URLs go over the wire,
/// anything else is treated as a file path. Lets a run mix mocked and
/// remote sources.
pub struct AutoTransport {
    http: HttpTransport,
    file: FileTransport,
}

impl AutoTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            http: HttpTransport::new(timeout)?,
            file: FileTransport::new(None),
        })
    }
}

#[async_trait]
impl Transport for AutoTransport {
    async fn get(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            self.http.get(location).await
        } else {
            self.file.get(location).await
        }
    }
}
