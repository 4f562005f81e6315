use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// A stored catalog document with a fixed, well-known key.
pub trait CatalogDocument: Serialize + Default {
    /// Object key the document lives at
    const KEY: &'static str;
    /// File name used when the document is handed over for manual upload
    const FILE_NAME: &'static str;
}

/// One photograph in the image catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub filename: String,
    /// Soft reference to `GalleryRecord::id`
    #[serde(default, deserialize_with = "null_as_empty")]
    pub gallery: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub alt: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    /// Absent counts as featured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub date: String,
}

impl ImageRecord {
    pub fn is_featured(&self) -> bool {
        self.featured != Some(false)
    }

    /// Catalog entry generated for a freshly uploaded image.
    pub fn for_upload(filename: &str, gallery: &str, featured: bool, today: NaiveDate) -> Self {
        let base = filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(filename);
        let words = base.replace('-', " ");

        Self {
            filename: filename.to_string(),
            gallery: gallery.to_string(),
            title: title_case(&words),
            alt: format!("{gallery} photography - {words}"),
            description: format!("Uploaded {}", today.format("%-m/%-d/%Y")),
            featured: Some(featured),
            date: today.format("%Y-%m-%d").to_string(),
        }
    }
}

/// A named gallery images can be assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryRecord {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
}

impl GalleryRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
        }
    }
}

/// `data/gallery.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCatalog {
    #[serde(default)]
    pub images: Vec<ImageRecord>,
}

impl CatalogDocument for ImageCatalog {
    const KEY: &'static str = "data/gallery.json";
    const FILE_NAME: &'static str = "gallery.json";
}

/// `data/galleries.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryCatalog {
    #[serde(default)]
    pub galleries: Vec<GalleryRecord>,
}

impl CatalogDocument for GalleryCatalog {
    const KEY: &'static str = "data/galleries.json";
    const FILE_NAME: &'static str = "galleries.json";
}

/// Hand-edited documents use `null` for blank text fields.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Upper-case the first character of every word.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn featured_defaults_to_true() {
        let record: ImageRecord = serde_json::from_str(r#"{"filename":"a.webp"}"#).unwrap();
        assert!(record.is_featured());
        assert_eq!(record.gallery, "");

        let record: ImageRecord =
            serde_json::from_str(r#"{"filename":"a.webp","featured":false}"#).unwrap();
        assert!(!record.is_featured());
    }

    #[test]
    fn null_text_fields_read_as_empty() {
        let record: ImageRecord = serde_json::from_str(
            r#"{"filename":"a.webp","gallery":null,"title":null,"alt":null,"description":null,"date":null,"featured":null}"#,
        )
        .unwrap();
        assert_eq!(record.title, "");
        assert_eq!(record.gallery, "");
        assert!(record.is_featured());

        let gallery: GalleryRecord =
            serde_json::from_str(r#"{"id":"events","name":null,"description":null}"#).unwrap();
        assert_eq!(gallery, GalleryRecord::new("events", ""));
    }

    #[test]
    fn upload_entry_fields() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        let record = ImageRecord::for_upload("golden-hour-2.webp", "weddings", true, today);

        assert_eq!(record.filename, "golden-hour-2.webp");
        assert_eq!(record.gallery, "weddings");
        assert_eq!(record.title, "Golden Hour 2");
        assert_eq!(record.alt, "weddings photography - golden hour 2");
        assert_eq!(record.description, "Uploaded 3/7/2024");
        assert_eq!(record.featured, Some(true));
        assert_eq!(record.date, "2024-03-07");
    }

    #[test]
    fn missing_lists_are_empty() {
        let images: ImageCatalog = serde_json::from_str("{}").unwrap();
        assert!(images.images.is_empty());
        let galleries: GalleryCatalog = serde_json::from_str("{}").unwrap();
        assert!(galleries.galleries.is_empty());
    }
}
