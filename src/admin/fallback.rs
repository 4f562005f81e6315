use std::io;
use std::path::PathBuf;

use uuid::Uuid;

/// Directory that receives files the proxy could not accept, for manual upload.
#[derive(Debug, Clone)]
pub struct ManualFallback {
    dir: PathBuf,
}

impl ManualFallback {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `data` as `name`, flattening any `/` so everything lands in one directory.
    pub async fn write(&self, name: &str, data: &[u8]) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(name.replace('/', "-"));
        let temp_path = self.dir.join(format!(".{}.tmp", Uuid::new_v4()));
        tokio::fs::write(&temp_path, data).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }

        tracing::warn!(path = %path.display(), "Wrote file for manual upload");
        Ok(path)
    }
}
