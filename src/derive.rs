//! Three-size variant derivation for uploaded photographs.
//!
//! A source image is decoded once and re-encoded at the thumbnail, gallery
//! and full widths. Images are only ever scaled down, and the output keeps the
//! source's encoded format where it can be written, otherwise JPEG.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use thiserror::Error;

use crate::config::VariantWidths;

#[derive(Debug, Error)]
pub enum ResizeError {
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode {variant} variant: {message}")]
    Encode { variant: Variant, message: String },
    #[error("Encoding the {0} variant produced no output")]
    EmptyOutput(Variant),
    #[error("Resize task failed: {0}")]
    Task(String),
}

/// One of the three stored sizes of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Thumbnail,
    Gallery,
    Full,
}

impl Variant {
    /// Key prefix the variant is stored under.
    pub fn folder(self) -> &'static str {
        match self {
            Variant::Thumbnail => "thumbnails",
            Variant::Gallery => "gallery",
            Variant::Full => "full",
        }
    }

    /// Encoder quality factor in `0.0..=1.0`.
    pub fn quality(self) -> f32 {
        match self {
            Variant::Thumbnail => 0.85,
            Variant::Gallery => 0.90,
            Variant::Full => 0.95,
        }
    }

    pub fn max_width(self, widths: &VariantWidths) -> u32 {
        match self {
            Variant::Thumbnail => widths.thumbnail,
            Variant::Gallery => widths.gallery,
            Variant::Full => widths.full,
        }
    }

    /// Object key for this variant of `filename`.
    pub fn key(self, filename: &str) -> String {
        format!("{}/{}", self.folder(), filename)
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Variant::Thumbnail => "thumbnail",
            Variant::Gallery => "gallery",
            Variant::Full => "full",
        };
        f.write_str(name)
    }
}

/// Encodings the pipeline can write back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl OutputFormat {
    /// Keep the source format when writable, otherwise JPEG.
    pub fn for_source(format: Option<ImageFormat>) -> Self {
        match format {
            Some(ImageFormat::Png) => OutputFormat::Png,
            Some(ImageFormat::Gif) => OutputFormat::Gif,
            Some(ImageFormat::WebP) => OutputFormat::WebP,
            _ => OutputFormat::Jpeg,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Gif => "image/gif",
            OutputFormat::WebP => "image/webp",
        }
    }
}

/// A re-encoded variant held in memory until upload.
#[derive(Debug, Clone)]
pub struct DerivedImage {
    pub variant: Variant,
    pub data: Bytes,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// All three variants of one source image.
#[derive(Debug, Clone)]
pub struct DerivedSet {
    pub thumbnail: DerivedImage,
    pub gallery: DerivedImage,
    pub full: DerivedImage,
}

impl DerivedSet {
    /// Variants in upload order: thumbnail, gallery, full.
    pub fn iter(&self) -> impl Iterator<Item = &DerivedImage> {
        [&self.thumbnail, &self.gallery, &self.full].into_iter()
    }
}

/// Dimensions after fitting `width` into `max_width`. Never upsizes.
pub fn target_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width {
        return (width, height);
    }
    let scaled = (u64::from(height) * u64::from(max_width)) as f64 / f64::from(width);
    (max_width, (scaled.round() as u32).max(1))
}

/// Storage filename for an uploaded file: lowercase, `[a-z0-9]` kept, anything
/// else replaced by `-`; a `jpg` extension becomes `webp`.
pub fn derived_filename(original: &str) -> String {
    let (stem, ext) = match original.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => {
            (stem, Some(ext.to_lowercase()))
        }
        _ => (original, None),
    };

    let base: String = stem
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect();

    match ext.as_deref() {
        Some("jpg") => format!("{base}.webp"),
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

/// Resize and re-encode one variant from an already decoded source.
pub fn render_variant(
    source: &DynamicImage,
    format: OutputFormat,
    variant: Variant,
    max_width: u32,
) -> Result<DerivedImage, ResizeError> {
    let (width, height) = target_dimensions(source.width(), source.height(), max_width);
    let resized = if (width, height) == (source.width(), source.height()) {
        source.clone()
    } else {
        source.resize_exact(width, height, FilterType::Triangle)
    };

    let data = encode(&resized, format, variant.quality()).map_err(|e| ResizeError::Encode {
        variant,
        message: e.to_string(),
    })?;
    if data.is_empty() {
        return Err(ResizeError::EmptyOutput(variant));
    }

    Ok(DerivedImage {
        variant,
        data: Bytes::from(data),
        content_type: format.content_type(),
        width,
        height,
    })
}

fn encode(image: &DynamicImage, format: OutputFormat, quality: f32) -> image::ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let quality = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
        }
        OutputFormat::Png => {
            image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        }
        // GIF and lossless WebP carry no quality setting
        OutputFormat::Gif => {
            DynamicImage::ImageRgba8(image.to_rgba8())
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Gif)?;
        }
        OutputFormat::WebP => {
            DynamicImage::ImageRgba8(image.to_rgba8())
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::WebP)?;
        }
    }
    Ok(buf)
}

/// Decode `source` and produce all three variants concurrently.
pub async fn derive_variants(
    source: Bytes,
    widths: VariantWidths,
) -> Result<DerivedSet, ResizeError> {
    let (decoded, format) = tokio::task::spawn_blocking(move || {
        let format = OutputFormat::for_source(image::guess_format(&source).ok());
        image::load_from_memory(&source)
            .map(|img| (Arc::new(img), format))
            .map_err(|e| ResizeError::Decode(e.to_string()))
    })
    .await
    .map_err(|e| ResizeError::Task(e.to_string()))??;

    tracing::debug!(
        width = decoded.width(),
        height = decoded.height(),
        format = ?format,
        "Decoded source image"
    );

    let spawn = |variant: Variant| {
        let source = Arc::clone(&decoded);
        let max_width = variant.max_width(&widths);
        tokio::task::spawn_blocking(move || render_variant(&source, format, variant, max_width))
    };

    let (thumbnail, gallery, full) = tokio::join!(
        spawn(Variant::Thumbnail),
        spawn(Variant::Gallery),
        spawn(Variant::Full)
    );

    let joined = |r: Result<Result<DerivedImage, ResizeError>, tokio::task::JoinError>| {
        r.map_err(|e| ResizeError::Task(e.to_string()))
            .and_then(|inner| inner)
    };

    Ok(DerivedSet {
        thumbnail: joined(thumbnail)?,
        gallery: joined(gallery)?,
        full: joined(full)?,
    })
}
