use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata recorded alongside a locally stored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub content_type: Option<String>,
    pub byte_size: u64,
    pub updated_at: DateTime<Utc>,
}

impl ObjectMeta {
    pub fn new(content_type: Option<&str>, byte_size: u64) -> Self {
        Self {
            content_type: content_type
                .filter(|ct| !ct.trim().is_empty())
                .map(|ct| ct.to_string()),
            byte_size,
            updated_at: Utc::now(),
        }
    }
}
