//! Ordered, named places a catalog document can be read from.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::client::{ClientError, ProxyClient};
use crate::object_store::{validate_key, ObjectStore, ObjectStoreError};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Fetch failed: {0}")]
    Fetch(String),
    #[error("Unparseable document from {source_name}: {message}")]
    Parse { source_name: String, message: String },
}

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &str;
    async fn fetch(&self, key: &str) -> Result<Bytes, SourceError>;
}

/// Reads through the object store proxy.
pub struct ProxySource {
    client: ProxyClient,
}

impl ProxySource {
    pub fn new(client: ProxyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for ProxySource {
    fn name(&self) -> &str {
        "proxy"
    }

    async fn fetch(&self, key: &str) -> Result<Bytes, SourceError> {
        self.client.fetch(key).await.map_err(|e| match e {
            ClientError::NotFound(key) => SourceError::NotFound(key),
            other => SourceError::Fetch(other.to_string()),
        })
    }
}

/// Reads the static site's own copy from disk, e.g. `<root>/data/gallery.json`.
pub struct StaticDirSource {
    root: PathBuf,
}

impl StaticDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DataSource for StaticDirSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, key: &str) -> Result<Bytes, SourceError> {
        validate_key(key).map_err(|e| SourceError::Fetch(e.to_string()))?;
        match tokio::fs::read(self.root.join(key)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SourceError::NotFound(key.to_string()))
            }
            Err(e) => Err(SourceError::Fetch(e.to_string())),
        }
    }
}

/// Reads straight from a storage backend.
pub struct StoreSource {
    store: Arc<dyn ObjectStore>,
}

impl StoreSource {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DataSource for StoreSource {
    fn name(&self) -> &str {
        "store"
    }

    async fn fetch(&self, key: &str) -> Result<Bytes, SourceError> {
        match self.store.get(key).await {
            Ok(object) => Ok(object.data),
            Err(ObjectStoreError::NotFound(key)) => Err(SourceError::NotFound(key)),
            Err(e) => Err(SourceError::Fetch(e.to_string())),
        }
    }
}

/// Sources tried in order. A source that has no copy hands over to the next one.
#[derive(Default)]
pub struct SourceChain {
    sources: Vec<Box<dyn DataSource>>,
}

impl SourceChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl DataSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Load and parse the document at `key`.
    ///
    /// Only a miss falls through. A source that fails or holds an unparseable
    /// document ends the chain with that error.
    pub async fn load<D: DeserializeOwned>(&self, key: &str) -> Result<D, SourceError> {
        for source in &self.sources {
            let data = match source.fetch(key).await {
                Ok(data) => data,
                Err(SourceError::NotFound(_)) => {
                    tracing::debug!(source = source.name(), key = %key, "Document not found");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), key = %key, error = %e, "Source failed");
                    return Err(e);
                }
            };

            return match serde_json::from_slice(&data) {
                Ok(document) => {
                    tracing::debug!(source = source.name(), key = %key, "Loaded document");
                    Ok(document)
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), key = %key, error = %e, "Unparseable document");
                    Err(SourceError::Parse {
                        source_name: source.name().to_string(),
                        message: e.to_string(),
                    })
                }
            };
        }

        Err(SourceError::NotFound(key.to_string()))
    }

    /// Like [`SourceChain::load`], but a document no source has yet starts out empty.
    pub async fn load_or_empty<D: DeserializeOwned + Default>(
        &self,
        key: &str,
    ) -> Result<D, SourceError> {
        match self.load(key).await {
            Err(SourceError::NotFound(_)) => {
                tracing::info!(key = %key, "Starting from an empty document");
                Ok(D::default())
            }
            other => other,
        }
    }

    /// First copy any source can produce, for read-only pages.
    ///
    /// Failing sources are skipped so an unreachable proxy still leaves the
    /// static copy. Never use the result as a base for a save.
    pub async fn load_best_effort<D: DeserializeOwned + Default>(&self, key: &str) -> D {
        for source in &self.sources {
            let parsed = match source.fetch(key).await {
                Ok(data) => serde_json::from_slice(&data).map_err(|e| e.to_string()),
                Err(SourceError::NotFound(_)) => continue,
                Err(e) => Err(e.to_string()),
            };
            match parsed {
                Ok(document) => return document,
                Err(error) => {
                    tracing::warn!(source = source.name(), key = %key, error = %error, "Skipping source");
                }
            }
        }

        tracing::info!(key = %key, "No readable copy, showing an empty document");
        D::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::models::{CatalogDocument, GalleryCatalog};

    fn site_with(body: &str) -> tempfile::TempDir {
        let site = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(site.path().join("data")).unwrap();
        std::fs::write(site.path().join(GalleryCatalog::KEY), body).unwrap();
        site
    }

    #[tokio::test]
    async fn falls_through_to_next_source() {
        let empty = tempfile::tempdir().unwrap();
        let site = site_with(r#"{"galleries":[{"id":"nature","name":"Nature","description":""}]}"#);

        let chain = SourceChain::new()
            .with(StaticDirSource::new(empty.path()))
            .with(StaticDirSource::new(site.path()));

        let doc: GalleryCatalog = chain.load(GalleryCatalog::KEY).await.unwrap();
        assert_eq!(doc.galleries.len(), 1);
        assert_eq!(doc.galleries[0].id, "nature");
    }

    #[tokio::test]
    async fn missing_everywhere_starts_empty() {
        let empty = tempfile::tempdir().unwrap();
        let chain = SourceChain::new().with(StaticDirSource::new(empty.path()));

        let result: Result<GalleryCatalog, _> = chain.load(GalleryCatalog::KEY).await;
        assert!(matches!(result, Err(SourceError::NotFound(_))));

        let doc: GalleryCatalog = chain.load_or_empty(GalleryCatalog::KEY).await.unwrap();
        assert!(doc.galleries.is_empty());
    }

    #[tokio::test]
    async fn unparseable_document_stops_the_chain() {
        let broken = site_with("{not json");
        let good = site_with(r#"{"galleries":[]}"#);

        let chain = SourceChain::new()
            .with(StaticDirSource::new(broken.path()))
            .with(StaticDirSource::new(good.path()));

        let result: Result<GalleryCatalog, _> = chain.load_or_empty(GalleryCatalog::KEY).await;
        assert!(matches!(result, Err(SourceError::Parse { .. })));
    }

    #[tokio::test]
    async fn unreachable_proxy_fails_editing_but_not_display() {
        let site = site_with(r#"{"galleries":[{"id":"nature","name":"Nature"}]}"#);

        // Nothing listens on port 9 of the loopback interface
        let chain = SourceChain::new()
            .with(ProxySource::new(ProxyClient::new("http://127.0.0.1:9")))
            .with(StaticDirSource::new(site.path()));

        let result: Result<GalleryCatalog, _> = chain.load_or_empty(GalleryCatalog::KEY).await;
        assert!(matches!(result, Err(SourceError::Fetch(_))));

        let doc: GalleryCatalog = chain.load_best_effort(GalleryCatalog::KEY).await;
        assert_eq!(doc.galleries.len(), 1);
    }
}
