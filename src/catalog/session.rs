use super::models::{GalleryCatalog, GalleryRecord, ImageCatalog, ImageRecord};
use super::source::SourceChain;
use super::validate::{validate_gallery, validate_gallery_list, ValidationError};
use super::{CatalogDocument, CatalogError, CatalogWriter, ConfirmGate, SaveOutcome};

fn check_index(index: usize, len: usize) -> Result<(), CatalogError> {
    if index >= len {
        return Err(CatalogError::IndexOutOfRange { index, len });
    }
    Ok(())
}

// ============================================================================
// Galleries
// ============================================================================

/// Working copy of the gallery list. Changes stay local until [`GallerySession::save`].
#[derive(Debug, Clone, Default)]
pub struct GallerySession {
    galleries: Vec<GalleryRecord>,
}

impl GallerySession {
    /// Working copy of the stored document. A document that exists but cannot be
    /// read is an error, never an empty list.
    pub async fn load(chain: &SourceChain) -> Result<Self, CatalogError> {
        let document: GalleryCatalog = chain.load_or_empty(GalleryCatalog::KEY).await?;
        Ok(Self::from_document(document))
    }

    pub fn from_document(document: GalleryCatalog) -> Self {
        Self {
            galleries: document.galleries,
        }
    }

    pub fn galleries(&self) -> &[GalleryRecord] {
        &self.galleries
    }

    /// Replace the gallery with the same id, or append a new one.
    pub fn add_or_update_gallery(&mut self, record: GalleryRecord) -> Result<(), CatalogError> {
        validate_gallery(&record)?;

        if let Some(existing) = self.galleries.iter_mut().find(|g| g.id == record.id) {
            *existing = record;
            return Ok(());
        }

        if self.collides(&record.id, None) {
            return Err(ValidationError::DuplicateId(record.id).into());
        }

        self.galleries.push(record);
        Ok(())
    }

    /// Edit the gallery at `index`; its id may change.
    pub fn update_gallery_at(
        &mut self,
        index: usize,
        record: GalleryRecord,
    ) -> Result<(), CatalogError> {
        check_index(index, self.galleries.len())?;
        validate_gallery(&record)?;

        if self.collides(&record.id, Some(index)) {
            return Err(ValidationError::DuplicateId(record.id).into());
        }

        self.galleries[index] = record;
        Ok(())
    }

    /// Remove the gallery at `index` once `gate` agrees. Images keep their reference.
    pub fn remove_gallery(
        &mut self,
        index: usize,
        gate: &impl ConfirmGate,
    ) -> Result<Option<GalleryRecord>, CatalogError> {
        check_index(index, self.galleries.len())?;

        let prompt = format!(
            "Delete gallery \"{}\"? Images assigned to it are not removed.",
            self.galleries[index].name
        );
        if !gate.confirm(&prompt) {
            return Ok(None);
        }

        let removed = self.galleries.remove(index);
        tracing::info!(id = %removed.id, "Removed gallery");
        Ok(Some(removed))
    }

    pub fn to_document(&self) -> GalleryCatalog {
        GalleryCatalog {
            galleries: self.galleries.clone(),
        }
    }

    /// Validate the whole list, then write it back.
    pub async fn save(&self, writer: &CatalogWriter) -> Result<SaveOutcome, CatalogError> {
        validate_gallery_list(&self.galleries)?;
        writer.save(&self.to_document()).await
    }

    fn collides(&self, id: &str, skip: Option<usize>) -> bool {
        let id = id.to_lowercase();
        self.galleries
            .iter()
            .enumerate()
            .any(|(i, g)| Some(i) != skip && g.id.to_lowercase() == id)
    }
}

// ============================================================================
// Images
// ============================================================================

/// Fields an operator can change on an existing image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEdit {
    pub title: String,
    pub description: String,
    pub gallery: String,
    pub alt: String,
    pub featured: bool,
}

/// Working copy of the image list. Every mutation is saved immediately.
#[derive(Debug, Clone, Default)]
pub struct ImageSession {
    images: Vec<ImageRecord>,
}

impl ImageSession {
    /// Working copy of the stored document. A document that exists but cannot be
    /// read is an error, never an empty list.
    pub async fn load(chain: &SourceChain) -> Result<Self, CatalogError> {
        let document: ImageCatalog = chain.load_or_empty(ImageCatalog::KEY).await?;
        Ok(Self::from_document(document))
    }

    pub fn from_document(document: ImageCatalog) -> Self {
        Self {
            images: document.images,
        }
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    /// Images in one gallery, or all of them, with their catalog index.
    pub fn images_in(&self, gallery: Option<&str>) -> Vec<(usize, &ImageRecord)> {
        self.images
            .iter()
            .enumerate()
            .filter(|(_, img)| gallery.map_or(true, |id| img.gallery == id))
            .collect()
    }

    pub fn to_document(&self) -> ImageCatalog {
        ImageCatalog {
            images: self.images.clone(),
        }
    }

    pub async fn edit_image(
        &mut self,
        index: usize,
        edit: ImageEdit,
        writer: &CatalogWriter,
    ) -> Result<SaveOutcome, CatalogError> {
        check_index(index, self.images.len())?;

        let image = &mut self.images[index];
        image.title = edit.title;
        image.description = edit.description;
        image.gallery = edit.gallery;
        image.alt = edit.alt;
        image.featured = Some(edit.featured);

        writer.save(&self.to_document()).await
    }

    /// Drop the entry at `index` once `gate` agrees. The stored variants stay where they are.
    pub async fn delete_image(
        &mut self,
        index: usize,
        gate: &impl ConfirmGate,
        writer: &CatalogWriter,
    ) -> Result<Option<SaveOutcome>, CatalogError> {
        check_index(index, self.images.len())?;

        let prompt = format!(
            "Delete \"{}\" from the catalog? Stored files are kept.",
            self.images[index].filename
        );
        if !gate.confirm(&prompt) {
            return Ok(None);
        }

        let removed = self.images.remove(index);
        tracing::info!(filename = %removed.filename, "Removed image entry");
        writer.save(&self.to_document()).await.map(Some)
    }

    /// Append entries for freshly uploaded images and save.
    pub async fn add_uploaded(
        &mut self,
        records: impl IntoIterator<Item = ImageRecord>,
        writer: &CatalogWriter,
    ) -> Result<SaveOutcome, CatalogError> {
        self.images.extend(records);
        writer.save(&self.to_document()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::ManualFallback;
    use crate::catalog::source::{ProxySource, SourceError, StoreSource};
    use crate::client::ProxyClient;
    use crate::testutil;
    use bytes::Bytes;
    use std::sync::Arc;

    fn record(filename: &str, gallery: &str) -> ImageRecord {
        ImageRecord {
            filename: filename.to_string(),
            gallery: gallery.to_string(),
            title: String::new(),
            alt: String::new(),
            description: String::new(),
            featured: None,
            date: "2024-01-01".to_string(),
        }
    }

    fn offline_writer(dir: &tempfile::TempDir) -> CatalogWriter {
        CatalogWriter::new(None, ManualFallback::new(dir.path().join("downloads")))
    }

    #[test]
    fn case_insensitive_gallery_collision() {
        let mut session = GallerySession::default();
        session
            .add_or_update_gallery(GalleryRecord::new("events", "Events"))
            .unwrap();

        let err = session
            .add_or_update_gallery(GalleryRecord::new("Events", "Events Again"))
            .unwrap_err();
        // Upper case is malformed before it is a duplicate
        assert!(matches!(
            err,
            CatalogError::Validation(ValidationError::MalformedId(_))
        ));

        // Exact id replaces in place
        session
            .add_or_update_gallery(GalleryRecord::new("events", "All Events"))
            .unwrap();
        assert_eq!(session.galleries().len(), 1);
        assert_eq!(session.galleries()[0].name, "All Events");
    }

    #[test]
    fn case_insensitive_collision_on_loaded_list() {
        // A hand-edited document may carry ids that differ only in case
        let mut session = GallerySession::from_document(GalleryCatalog {
            galleries: vec![GalleryRecord::new("Events", "Events")],
        });
        let err = session
            .add_or_update_gallery(GalleryRecord::new("events", "Events"))
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Validation(ValidationError::DuplicateId(_))
        ));
        assert_eq!(session.galleries().len(), 1);
    }

    #[test]
    fn update_at_allows_rename_but_not_collision() {
        let mut session = GallerySession::default();
        session
            .add_or_update_gallery(GalleryRecord::new("events", "Events"))
            .unwrap();
        session
            .add_or_update_gallery(GalleryRecord::new("nature", "Nature"))
            .unwrap();

        session
            .update_gallery_at(1, GalleryRecord::new("landscapes", "Landscapes"))
            .unwrap();
        assert_eq!(session.galleries()[1].id, "landscapes");

        // Keeping its own id is fine
        session
            .update_gallery_at(1, GalleryRecord::new("landscapes", "Wide Open"))
            .unwrap();

        assert!(session
            .update_gallery_at(1, GalleryRecord::new("events", "Dup"))
            .is_err());
        assert!(matches!(
            session.update_gallery_at(5, GalleryRecord::new("x", "X")),
            Err(CatalogError::IndexOutOfRange { index: 5, len: 2 })
        ));
    }

    #[test]
    fn declined_removal_changes_nothing() {
        let mut session = GallerySession::default();
        session
            .add_or_update_gallery(GalleryRecord::new("events", "Events"))
            .unwrap();

        let removed = session.remove_gallery(0, &|_: &str| false).unwrap();
        assert!(removed.is_none());
        assert_eq!(session.galleries().len(), 1);

        let removed = session.remove_gallery(0, &|_: &str| true).unwrap();
        assert_eq!(removed.map(|g| g.id), Some("events".to_string()));
        assert!(session.galleries().is_empty());
    }

    #[tokio::test]
    async fn duplicate_ids_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let writer = offline_writer(&dir);
        let session = GallerySession::from_document(GalleryCatalog {
            galleries: vec![
                GalleryRecord::new("events", "Events"),
                GalleryRecord::new("events", "Events 2"),
            ],
        });

        let err = session.save(&writer).await.unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Validation(ValidationError::DuplicateIds(_))
        ));
        assert!(!dir.path().join("downloads").exists());
    }

    #[tokio::test]
    async fn failed_save_writes_fallback_file() {
        let dir = tempfile::tempdir().unwrap();
        // Nothing listens on port 9 of the loopback interface
        let writer = CatalogWriter::new(
            Some(ProxyClient::new("http://127.0.0.1:9")),
            ManualFallback::new(dir.path().join("downloads")),
        );
        let mut session = GallerySession::default();
        session
            .add_or_update_gallery(GalleryRecord::new("events", "Events"))
            .unwrap();

        let outcome = session.save(&writer).await.unwrap();
        let SaveOutcome::Downloaded { path, key, .. } = &outcome else {
            panic!("expected a fallback, got {outcome:?}");
        };
        assert_eq!(key, "data/galleries.json");
        assert_eq!(path, &dir.path().join("downloads").join("galleries.json"));
        assert!(outcome.instructions().unwrap().contains("data/galleries.json"));

        let written: GalleryCatalog =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(written, session.to_document());
    }

    #[tokio::test]
    async fn delete_rewrites_catalog_and_keeps_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let (endpoint, state) = testutil::spawn_proxy(&dir).await;
        let client = ProxyClient::new(&endpoint);
        let writer = CatalogWriter::new(
            Some(client.clone()),
            ManualFallback::new(dir.path().join("downloads")),
        );

        let names = ["a.webp", "b.webp", "c.webp", "d.webp", "e.webp"];
        for name in names {
            client
                .upload(&format!("full/{name}"), Bytes::from_static(b"img"), "image/webp")
                .await
                .unwrap();
        }

        let mut session = ImageSession::default();
        let outcome = session
            .add_uploaded(names.iter().map(|n| record(n, "events")), &writer)
            .await
            .unwrap();
        assert!(outcome.is_stored());

        let outcome = session
            .delete_image(2, &|_: &str| true, &writer)
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.is_stored());

        let remaining: Vec<_> = session.images().iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(remaining, ["a.webp", "b.webp", "d.webp", "e.webp"]);

        // The stored document matches and the deleted image's blob remains
        let chain = SourceChain::new().with(StoreSource::new(Arc::clone(&state.object_store)));
        let reloaded = ImageSession::load(&chain).await.unwrap();
        assert_eq!(reloaded.images(), session.images());
        assert!(state.object_store.exists("full/c.webp").await.unwrap());
    }

    #[tokio::test]
    async fn hand_edited_catalog_survives_an_upload() {
        let dir = tempfile::tempdir().unwrap();
        let (endpoint, _state) = testutil::spawn_proxy(&dir).await;
        let client = ProxyClient::new(&endpoint);
        let writer = CatalogWriter::new(
            Some(client.clone()),
            ManualFallback::new(dir.path().join("downloads")),
        );

        let stored = r#"{"images":[
            {"filename":"a.webp","gallery":"events","title":null,"date":"2024-01-01"},
            {"filename":"b.webp","gallery":"events","title":"B","date":"2024-01-02"}
        ]}"#;
        client
            .upload(ImageCatalog::KEY, Bytes::from_static(stored.as_bytes()), "application/json")
            .await
            .unwrap();

        let chain = SourceChain::new().with(ProxySource::new(client.clone()));
        let mut session = ImageSession::load(&chain).await.unwrap();
        assert_eq!(session.images().len(), 2);

        session
            .add_uploaded([record("c.webp", "events")], &writer)
            .await
            .unwrap();

        let saved: ImageCatalog =
            serde_json::from_slice(&client.fetch(ImageCatalog::KEY).await.unwrap()).unwrap();
        let names: Vec<_> = saved.images.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, ["a.webp", "b.webp", "c.webp"]);
    }

    #[tokio::test]
    async fn unreadable_catalog_is_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let (endpoint, _state) = testutil::spawn_proxy(&dir).await;
        let client = ProxyClient::new(&endpoint);

        let stored = r#"{"images":[{"filename":42}]}"#;
        client
            .upload(ImageCatalog::KEY, Bytes::from_static(stored.as_bytes()), "application/json")
            .await
            .unwrap();

        let chain = SourceChain::new().with(ProxySource::new(client.clone()));
        let err = ImageSession::load(&chain).await.unwrap_err();
        assert!(matches!(err, CatalogError::Source(SourceError::Parse { .. })));
        // A missing list still starts empty
        let galleries = GallerySession::load(&chain).await.unwrap();
        assert!(galleries.galleries().is_empty());

        assert_eq!(client.fetch(ImageCatalog::KEY).await.unwrap(), stored.as_bytes());
    }

    #[tokio::test]
    async fn edit_sets_fields_and_filter_by_gallery() {
        let dir = tempfile::tempdir().unwrap();
        let writer = offline_writer(&dir);
        let mut session = ImageSession::from_document(ImageCatalog {
            images: vec![record("a.webp", "events"), record("b.webp", "nature")],
        });

        session
            .edit_image(
                1,
                ImageEdit {
                    title: "Dunes".to_string(),
                    description: "Evening".to_string(),
                    gallery: "events".to_string(),
                    alt: "Dunes at dusk".to_string(),
                    featured: false,
                },
                &writer,
            )
            .await
            .unwrap();

        assert_eq!(session.images()[1].title, "Dunes");
        assert_eq!(session.images()[1].featured, Some(false));
        assert_eq!(session.images_in(Some("events")).len(), 2);
        assert!(session.images_in(Some("nature")).is_empty());
        assert_eq!(session.images_in(None).len(), 2);

        let declined = session
            .delete_image(0, &|_: &str| false, &writer)
            .await
            .unwrap();
        assert!(declined.is_none());
        assert_eq!(session.images().len(), 2);
    }
}
