//! Catalog documents and the admin-side sessions that edit them.
//!
//! Two JSON documents describe the portfolio: the image list at
//! `data/gallery.json` and the gallery list at `data/galleries.json`. Sessions
//! hold a working copy, mutate it and write the whole document back. Writes go
//! through the proxy; when that fails the document is written to the manual
//! fallback directory instead.

pub mod models;
mod session;
pub mod source;
pub mod validate;

use std::path::PathBuf;

use bytes::Bytes;
use thiserror::Error;

use crate::admin::ManualFallback;
use crate::client::ProxyClient;
use crate::media::JSON;

pub use models::{CatalogDocument, GalleryCatalog, GalleryRecord, ImageCatalog, ImageRecord};
pub use session::{GallerySession, ImageEdit, ImageSession};
pub use source::{DataSource, ProxySource, SourceChain, SourceError, StaticDirSource, StoreSource};
pub use validate::ValidationError;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("No entry at index {index} (have {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Asks the operator before a destructive change.
pub trait ConfirmGate {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> ConfirmGate for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Where a saved document ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Stored { key: String, url: String },
    Downloaded { path: PathBuf, key: String, reason: String },
}

impl SaveOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, SaveOutcome::Stored { .. })
    }

    /// Operator-facing follow-up for a document that was not stored.
    pub fn instructions(&self) -> Option<String> {
        match self {
            SaveOutcome::Stored { .. } => None,
            SaveOutcome::Downloaded { path, key, reason } => Some(format!(
                "Could not store {key} ({reason}). The file was saved to {} instead; \
                 upload it to {key} manually.",
                path.display()
            )),
        }
    }
}

/// Serializes catalog documents and pushes them to the proxy.
#[derive(Debug, Clone)]
pub struct CatalogWriter {
    client: Option<ProxyClient>,
    fallback: ManualFallback,
}

impl CatalogWriter {
    /// Without a client every save goes to the fallback directory.
    pub fn new(client: Option<ProxyClient>, fallback: ManualFallback) -> Self {
        Self { client, fallback }
    }

    pub async fn save<D: CatalogDocument>(&self, document: &D) -> Result<SaveOutcome, CatalogError> {
        let body = Bytes::from(serde_json::to_vec_pretty(document)?);

        let reason = match &self.client {
            Some(client) => match client.upload(D::KEY, body.clone(), JSON).await {
                Ok(receipt) => {
                    tracing::info!(key = D::KEY, "Saved catalog document");
                    return Ok(SaveOutcome::Stored {
                        key: receipt.key,
                        url: receipt.url,
                    });
                }
                Err(e) => {
                    tracing::warn!(key = D::KEY, error = %e, "Catalog save failed");
                    e.to_string()
                }
            },
            None => "no proxy configured".to_string(),
        };

        let path = self.fallback.write(D::FILE_NAME, &body).await?;
        Ok(SaveOutcome::Downloaded {
            path,
            key: D::KEY.to_string(),
            reason,
        })
    }
}
