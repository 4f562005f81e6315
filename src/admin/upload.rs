use std::collections::HashSet;
use std::path::PathBuf;

use bytes::Bytes;
use chrono::NaiveDate;
use thiserror::Error;

use super::ManualFallback;
use crate::catalog::ImageRecord;
use crate::client::ProxyClient;
use crate::config::VariantWidths;
use crate::derive::{derive_variants, derived_filename, DerivedSet, ResizeError};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Could not process image: {0}")]
    Resize(#[from] ResizeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Select a gallery before uploading")]
    MissingGallery,
}

/// A file picked for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    fn is_image(&self) -> bool {
        mime_guess::from_path(&self.name)
            .first()
            .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    /// All three variants are stored; URLs in upload order.
    Uploaded { urls: Vec<String> },
    /// The proxy failed part-way. The three variants were written locally.
    PendingManualUpload { error: String, files: Vec<PathBuf> },
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Catalog entry for the image, to be appended whatever the status
    pub record: ImageRecord,
    pub status: UploadStatus,
}

impl UploadOutcome {
    pub fn instructions(&self) -> Option<String> {
        match &self.status {
            UploadStatus::Uploaded { .. } => None,
            UploadStatus::PendingManualUpload { error, files } => {
                let listing: Vec<String> =
                    files.iter().map(|p| p.display().to_string()).collect();
                Some(format!(
                    "Upload of {} failed ({error}). Upload these files to the \
                     thumbnails/, gallery/ and full/ folders manually: {}",
                    self.record.filename,
                    listing.join(", ")
                ))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Duplicate,
    NotAnImage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<UploadOutcome>,
    pub skipped: Vec<Skipped>,
    /// The file whose derivation stopped the batch
    pub failed: Option<(String, UploadError)>,
}

impl BatchReport {
    /// Catalog entries for every processed file, in batch order.
    pub fn records(&self) -> Vec<ImageRecord> {
        self.outcomes.iter().map(|o| o.record.clone()).collect()
    }
}

/// Derives and uploads images one at a time.
#[derive(Debug, Clone)]
pub struct UploadDriver {
    client: Option<ProxyClient>,
    fallback: ManualFallback,
    widths: VariantWidths,
}

impl UploadDriver {
    /// Without a client every upload lands in the fallback directory.
    pub fn new(client: Option<ProxyClient>, fallback: ManualFallback, widths: VariantWidths) -> Self {
        Self {
            client,
            fallback,
            widths,
        }
    }

    pub async fn upload(
        &self,
        name: &str,
        data: Bytes,
        gallery: &str,
        featured: bool,
    ) -> Result<UploadOutcome, UploadError> {
        self.upload_on(name, data, gallery, featured, chrono::Local::now().date_naive())
            .await
    }

    async fn upload_on(
        &self,
        name: &str,
        data: Bytes,
        gallery: &str,
        featured: bool,
        today: NaiveDate,
    ) -> Result<UploadOutcome, UploadError> {
        if gallery.trim().is_empty() {
            return Err(UploadError::MissingGallery);
        }

        let variants = derive_variants(data, self.widths).await?;
        let filename = derived_filename(name);
        let record = ImageRecord::for_upload(&filename, gallery, featured, today);

        let status = match self.push(&filename, &variants).await {
            Ok(urls) => {
                tracing::info!(filename = %filename, gallery = %gallery, "Uploaded image");
                UploadStatus::Uploaded { urls }
            }
            Err(error) => {
                tracing::warn!(filename = %filename, error = %error, "Upload failed, writing files locally");
                let mut files = Vec::with_capacity(3);
                for image in variants.iter() {
                    files.push(self.fallback.write(&image.variant.key(&filename), &image.data).await?);
                }
                UploadStatus::PendingManualUpload { error, files }
            }
        };

        Ok(UploadOutcome { record, status })
    }

    /// Thumbnail, gallery, full. Stops at the first failure; nothing is rolled back.
    async fn push(&self, filename: &str, variants: &DerivedSet) -> Result<Vec<String>, String> {
        let Some(client) = &self.client else {
            return Err("no proxy configured".to_string());
        };

        let mut urls = Vec::with_capacity(3);
        for image in variants.iter() {
            let key = image.variant.key(filename);
            let receipt = client
                .upload(&key, image.data.clone(), image.content_type)
                .await
                .map_err(|e| format!("{key}: {e}"))?;
            urls.push(receipt.url);
        }
        Ok(urls)
    }

    /// Upload `files` in order, skipping repeats and non-images.
    /// A file that cannot be decoded ends the batch.
    pub async fn upload_batch(
        &self,
        files: Vec<UploadFile>,
        gallery: &str,
        featured: bool,
    ) -> Result<BatchReport, UploadError> {
        if gallery.trim().is_empty() {
            return Err(UploadError::MissingGallery);
        }

        let mut report = BatchReport::default();
        let mut seen = HashSet::new();

        for file in files {
            if !seen.insert((file.name.clone(), file.data.len())) {
                report.skipped.push(Skipped {
                    name: file.name,
                    reason: SkipReason::Duplicate,
                });
                continue;
            }
            if !file.is_image() {
                tracing::debug!(name = %file.name, "Skipping non-image file");
                report.skipped.push(Skipped {
                    name: file.name,
                    reason: SkipReason::NotAnImage,
                });
                continue;
            }

            match self.upload(&file.name, file.data, gallery, featured).await {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e @ UploadError::Resize(_)) => {
                    tracing::warn!(name = %file.name, error = %e, "Stopping batch");
                    report.failed = Some((file.name, e));
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use image::{GenericImageView, ImageFormat};

    fn widths() -> VariantWidths {
        VariantWidths::default()
    }

    #[tokio::test]
    async fn uploads_three_variants_through_proxy() {
        let dir = tempfile::tempdir().unwrap();
        let (endpoint, state) = testutil::spawn_proxy(&dir).await;
        let driver = UploadDriver::new(
            Some(ProxyClient::new(&endpoint)),
            ManualFallback::new(dir.path().join("downloads")),
            widths(),
        );

        let source = testutil::sample_image(2000, 1000, ImageFormat::Jpeg);
        let today = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        let outcome = driver
            .upload_on("family.jpg", source, "events", true, today)
            .await
            .unwrap();

        assert_eq!(outcome.record.filename, "family.webp");
        assert_eq!(outcome.record.title, "Family");
        assert_eq!(outcome.record.date, "2024-03-07");
        let UploadStatus::Uploaded { urls } = &outcome.status else {
            panic!("expected upload, got {:?}", outcome.status);
        };
        assert_eq!(urls[0], format!("{endpoint}/thumbnails/family.webp"));

        for (key, width, height) in [
            ("thumbnails/family.webp", 400, 200),
            ("gallery/family.webp", 800, 400),
            ("full/family.webp", 1200, 600),
        ] {
            let object = state.object_store.get(key).await.unwrap();
            assert_eq!(object.content_type.as_deref(), Some("image/jpeg"));
            let decoded = image::load_from_memory(&object.data).unwrap();
            assert_eq!(decoded.dimensions(), (width, height), "{key}");
        }
        assert!(!dir.path().join("downloads").exists());
    }

    #[tokio::test]
    async fn unreachable_proxy_falls_back_to_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = dir.path().join("downloads");
        let driver = UploadDriver::new(
            Some(ProxyClient::new("http://127.0.0.1:9")),
            ManualFallback::new(&downloads),
            widths(),
        );

        let source = testutil::sample_image(900, 600, ImageFormat::Png);
        let outcome = driver.upload("Beach Day.png", source, "travel", false).await.unwrap();

        let UploadStatus::PendingManualUpload { files, .. } = &outcome.status else {
            panic!("expected fallback, got {:?}", outcome.status);
        };
        assert_eq!(
            files,
            &vec![
                downloads.join("thumbnails-beach-day.png"),
                downloads.join("gallery-beach-day.png"),
                downloads.join("full-beach-day.png"),
            ]
        );
        for file in files {
            assert!(file.exists());
        }
        assert_eq!(outcome.record.featured, Some(false));
        assert!(outcome.instructions().unwrap().contains("beach-day.png"));
    }

    #[tokio::test]
    async fn batch_skips_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let driver = UploadDriver::new(None, ManualFallback::new(dir.path().join("out")), widths());

        let image = testutil::sample_image(40, 30, ImageFormat::Png);
        let files = vec![
            UploadFile::new("a.png", image.clone()),
            UploadFile::new("a.png", image.clone()),
            UploadFile::new("notes.txt", Bytes::from_static(b"hello")),
            UploadFile::new("broken.jpg", Bytes::from_static(b"not a jpeg")),
            UploadFile::new("b.png", image),
        ];

        let report = driver.upload_batch(files, "events", true).await.unwrap();

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.records()[0].filename, "a.png");
        assert_eq!(
            report.skipped,
            vec![
                Skipped {
                    name: "a.png".to_string(),
                    reason: SkipReason::Duplicate
                },
                Skipped {
                    name: "notes.txt".to_string(),
                    reason: SkipReason::NotAnImage
                },
            ]
        );
        let (name, error) = report.failed.unwrap();
        assert_eq!(name, "broken.jpg");
        assert!(matches!(error, UploadError::Resize(ResizeError::Decode(_))));
    }

    #[tokio::test]
    async fn gallery_is_required() {
        let dir = tempfile::tempdir().unwrap();
        let driver = UploadDriver::new(None, ManualFallback::new(dir.path()), widths());
        let err = driver
            .upload("a.png", testutil::sample_image(4, 4, ImageFormat::Png), "", true)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::MissingGallery));
    }
}
