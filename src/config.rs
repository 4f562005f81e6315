use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub site: SiteConfig,
    pub admin: AdminConfig,
    /// Maximum object size in bytes accepted by the proxy
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Directory holding the object metadata index (local backend)
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub enum StorageBackend {
    Gcs,
    Local,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for local storage backend
    pub local_storage_path: String,
    /// GCS bucket name (required when backend is gcs)
    pub gcs_bucket: Option<String>,
    /// Path to GCS service account JSON (optional, defaults to ADC)
    pub gcs_credentials_file: Option<String>,
    /// Base used to build the `url` returned from uploads
    pub public_base_url: String,
}

/// Pixel widths of the three derived variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantWidths {
    pub thumbnail: u32,
    pub gallery: u32,
    pub full: u32,
}

#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Public store path images are served from. `None` means placeholder mode.
    pub base_url: Option<String>,
    pub use_placeholders: bool,
    pub featured_count: usize,
    pub widths: VariantWidths,
    /// Static site root; `data/*.json` under it is the last-resort catalog source
    pub static_dir: String,
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Proxy endpoint the admin tooling talks to
    pub proxy_url: Option<String>,
    /// Where manual-upload fallbacks are written
    pub fallback_dir: String,
}

impl Default for VariantWidths {
    fn default() -> Self {
        Self {
            thumbnail: 400,
            gallery: 800,
            full: 1200,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./files".to_string(),
            gcs_bucket: None,
            gcs_credentials_file: None,
            public_base_url: "http://0.0.0.0:8080".to_string(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            use_placeholders: false,
            featured_count: 6,
            widths: VariantWidths::default(),
            static_dir: ".".to_string(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            fallback_dir: "./downloads".to_string(),
        }
    }
}

impl SiteConfig {
    /// Placeholder imagery is used when no store is configured or it is forced on.
    pub fn placeholder_mode(&self) -> bool {
        self.use_placeholders || self.base_url.is_none()
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let max_upload_size = env_parse("MAX_UPLOAD_SIZE", 50 * 1024 * 1024); // 50MB

        let storage_backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "gcs" => StorageBackend::Gcs,
            _ => StorageBackend::Local,
        };

        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./files".to_string());

        let gcs_bucket = std::env::var("GCS_BUCKET").ok();
        let gcs_credentials_file = std::env::var("GCS_CREDENTIALS_FILE").ok();

        let public_base_url = match std::env::var("PUBLIC_BASE_URL").ok() {
            Some(url) => trim_url(url),
            None => match (&storage_backend, gcs_bucket.as_deref()) {
                (StorageBackend::Gcs, Some(bucket)) => {
                    format!("https://storage.googleapis.com/{bucket}")
                }
                _ => format!("http://{bind_address}"),
            },
        };

        let site = SiteConfig {
            base_url: std::env::var("SITE_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(trim_url),
            use_placeholders: env_flag("USE_PLACEHOLDERS"),
            featured_count: env_parse("FEATURED_COUNT", 6),
            widths: VariantWidths {
                thumbnail: env_parse("THUMBNAIL_WIDTH", 400),
                gallery: env_parse("GALLERY_WIDTH", 800),
                full: env_parse("FULL_WIDTH", 1200),
            },
            static_dir: std::env::var("STATIC_DIR").unwrap_or_else(|_| ".".to_string()),
        };

        let admin = AdminConfig {
            proxy_url: std::env::var("PROXY_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(trim_url),
            fallback_dir: std::env::var("FALLBACK_DIR")
                .unwrap_or_else(|_| "./downloads".to_string()),
        };

        let config = Config {
            server: ServerConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig {
                backend: storage_backend,
                local_storage_path,
                gcs_bucket,
                gcs_credentials_file,
                public_base_url,
            },
            site,
            admin,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if matches!(self.storage.backend, StorageBackend::Gcs) && self.storage.gcs_bucket.is_none()
        {
            return Err(ConfigError::ValidationError(
                "GCS_BUCKET is required when STORAGE_BACKEND=gcs".to_string(),
            ));
        }

        let widths = self.site.widths;
        if widths.thumbnail == 0 || widths.gallery == 0 || widths.full == 0 {
            return Err(ConfigError::ValidationError(
                "variant widths must be greater than 0".to_string(),
            ));
        }

        if self.site.featured_count == 0 {
            return Err(ConfigError::ValidationError(
                "FEATURED_COUNT must be greater than 0".to_string(),
            ));
        }

        if self.site.use_placeholders && self.site.base_url.is_some() {
            tracing::warn!("USE_PLACEHOLDERS is set; SITE_BASE_URL will be ignored");
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

fn trim_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
