//! folio - storage proxy and catalog tooling for a photography portfolio
//!
//! This crate provides:
//! - A stateless HTTP proxy in front of swappable blob storage (local filesystem, GCS)
//! - Three-size image variant derivation (thumbnail, gallery, full)
//! - Read-modify-write editing of the gallery and image catalog documents
//! - Public site helpers: featured selection, gallery filters, image URLs

pub mod admin;
pub mod api;
pub mod catalog;
pub mod client;
pub mod config;
pub mod derive;
pub mod media;
pub mod object_store;
pub mod site;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use config::Config;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub object_store: Arc<dyn object_store::ObjectStore>,
}
