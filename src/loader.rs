//! Document loading from files, strings, and HTTP URLs.
//!
//! Remote retrieval is a capability: everything that needs a remote schema
//! goes through a [`SchemaFetcher`], so callers can swap the network for a
//! stub or a local mirror.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{FetchError, LoadError};

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_document(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| LoadError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Retrieves schema documents by absolute URI.
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<Value, FetchError>;
}

#[async_trait]
impl<T: SchemaFetcher + ?Sized> SchemaFetcher for std::sync::Arc<T> {
    async fn fetch(&self, uri: &str) -> Result<Value, FetchError> {
        (**self).fetch(uri).await
    }
}

/// Fetches schemas over HTTP(S).
///
/// Requires the `remote` feature (enabled by default).
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "remote")]
impl HttpFetcher {
    /// Build a fetcher with the default request timeout.
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|source| FetchError::Network {
                uri: String::new(),
                source,
            })?;
        Ok(Self { client })
    }
}

#[cfg(feature = "remote")]
#[async_trait]
impl SchemaFetcher for HttpFetcher {
    async fn fetch(&self, uri: &str) -> Result<Value, FetchError> {
        tracing::debug!(uri, "fetching remote schema");
        let response =
            self.client
                .get(uri)
                .send()
                .await
                .map_err(|source| FetchError::Network {
                    uri: uri.to_string(),
                    source,
                })?;

        // Check for HTTP errors before parsing
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                uri: uri.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|source| FetchError::Network {
                uri: uri.to_string(),
                source,
            })
    }
}

/// Refuses every fetch. Used when the `remote` feature is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

#[async_trait]
impl SchemaFetcher for OfflineFetcher {
    async fn fetch(&self, uri: &str) -> Result<Value, FetchError> {
        Err(FetchError::Disabled {
            uri: uri.to_string(),
        })
    }
}

/// Serves URIs under `remote_base` from files under `local_base`, falling
/// back to `inner` when no mirrored file exists.
///
/// ```text
/// remote_base = "https://spec.example.com/v1"
/// local_base  = "docs"
/// https://spec.example.com/v1/schemas/app.json -> docs/schemas/app.json
/// ```
pub struct MirrorFetcher<F> {
    remote_base: String,
    local_base: PathBuf,
    inner: F,
}

impl<F: SchemaFetcher> MirrorFetcher<F> {
    pub fn new(remote_base: impl Into<String>, local_base: impl Into<PathBuf>, inner: F) -> Self {
        Self {
            remote_base: remote_base.into(),
            local_base: local_base.into(),
            inner,
        }
    }

    /// Local path a URI maps to, if it falls under the remote base.
    ///
    /// The base only matches whole path segments, and remainders that would
    /// leave `local_base` are refused.
    pub fn mirror_path(&self, uri: &str) -> Option<PathBuf> {
        let base = self.remote_base.trim_end_matches('/');
        let remainder = uri.strip_prefix(base)?;
        let remainder = remainder.split('#').next().unwrap_or_default();
        if !remainder.is_empty() && !remainder.starts_with('/') {
            return None;
        }

        let relative = Path::new(remainder.trim_start_matches('/'));
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            return None;
        }
        Some(self.local_base.join(relative))
    }
}

#[async_trait]
impl<F: SchemaFetcher> SchemaFetcher for MirrorFetcher<F> {
    async fn fetch(&self, uri: &str) -> Result<Value, FetchError> {
        if let Some(path) = self.mirror_path(uri).filter(|path| path.is_file()) {
            tracing::debug!(uri, path = %path.display(), "serving schema from local mirror");
            return load_document(&path).map_err(|source| FetchError::Mirror {
                uri: uri.to_string(),
                source,
            });
        }
        self.inner.fetch(uri).await
    }
}
