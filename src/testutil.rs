//! Shared test helpers: temporary stores, a live proxy, sample images.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};

use crate::config::{AdminConfig, Config, ServerConfig, SiteConfig, StorageConfig};
use crate::object_store::LocalStore;
use crate::storage::Database;
use crate::AppState;

/// Configuration rooted in `temp_dir`, local backend.
pub fn test_config(temp_dir: &tempfile::TempDir, public_base_url: &str) -> Config {
    let root = temp_dir.path();
    Config {
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: root.join("data").to_string_lossy().to_string(),
        },
        storage: StorageConfig {
            local_storage_path: root.join("files").to_string_lossy().to_string(),
            public_base_url: public_base_url.to_string(),
            ..StorageConfig::default()
        },
        site: SiteConfig {
            static_dir: root.join("site").to_string_lossy().to_string(),
            ..SiteConfig::default()
        },
        admin: AdminConfig {
            proxy_url: None,
            fallback_dir: root.join("downloads").to_string_lossy().to_string(),
        },
        max_upload_size: 10 * 1024 * 1024, // 10MB for tests
    }
}

/// Create a test AppState with a temporary database and local object store.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    state_with_config(test_config(temp_dir, "http://files.test"))
}

pub fn state_with_config(config: Config) -> Arc<AppState> {
    let db = Database::open(&config.server.data_dir).expect("Failed to open test database");
    let object_store = LocalStore::new(&config.storage.local_storage_path, db)
        .expect("Failed to create test object store");

    Arc::new(AppState {
        config,
        object_store: Arc::new(object_store),
    })
}

/// Serve the proxy on an ephemeral loopback port. Returns its endpoint and state.
pub async fn spawn_proxy(temp_dir: &tempfile::TempDir) -> (String, Arc<AppState>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let endpoint = format!("http://{}", listener.local_addr().expect("local addr"));

    let state = state_with_config(test_config(temp_dir, &endpoint));
    let app = crate::api::create_router(Arc::clone(&state));
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test proxy failed");
    });

    (endpoint, state)
}

/// Gradient test image encoded as `format`.
pub fn sample_image(width: u32, height: u32, format: ImageFormat) -> Bytes {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 96])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), format)
        .expect("Failed to encode sample image");
    Bytes::from(buf)
}
