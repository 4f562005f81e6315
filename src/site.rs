//! View models for the public portfolio and the admin image list.
//!
//! Nothing here produces markup. Pages are described as serializable cards so
//! any template layer can render them.

use serde::Serialize;

use crate::catalog::{
    CatalogDocument, GalleryCatalog, GalleryRecord, ImageCatalog, ImageRecord, SourceChain,
};
use crate::client::ProxyClient;
use crate::config::{SiteConfig, VariantWidths};
use crate::derive::Variant;

/// Label for images whose gallery is empty or no longer exists.
pub const UNCATEGORIZED: &str = "uncategorized";

const DEFAULT_ALT: &str = "Gallery image";

/// Public stock photos cycle through ids `1..=1000`.
const PLACEHOLDER_POOL: usize = 1000;

// ============================================================================
// Image URLs
// ============================================================================

/// Turns a catalog filename into a URL for one of its variants.
#[derive(Debug, Clone)]
pub enum ImageUrlResolver {
    /// Stock imagery sized like the real variants, 4:3
    Placeholder { widths: VariantWidths },
    /// The blob store's public path
    Store { base_url: String },
    /// Reads through the proxy, for the admin list
    Proxy(ProxyClient),
}

impl ImageUrlResolver {
    pub fn from_config(config: &SiteConfig) -> Self {
        match config.base_url.as_deref() {
            Some(base_url) if !config.placeholder_mode() => ImageUrlResolver::Store {
                base_url: base_url.trim_end_matches('/').to_string(),
            },
            _ => ImageUrlResolver::Placeholder {
                widths: config.widths,
            },
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ImageUrlResolver::Placeholder { .. })
    }

    /// `index` only matters for placeholders, where it picks the stock photo.
    pub fn url(&self, filename: &str, variant: Variant, index: usize) -> String {
        match self {
            ImageUrlResolver::Placeholder { widths } => {
                let width = variant.max_width(widths);
                let height = (f64::from(width) * 0.75).round() as u32;
                let id = (index % PLACEHOLDER_POOL) + 1;
                format!("https://picsum.photos/id/{id}/{width}/{height}")
            }
            ImageUrlResolver::Store { base_url } => {
                format!("{}/{}", base_url, variant.key(filename))
            }
            ImageUrlResolver::Proxy(client) => client.object_url(&variant.key(filename)),
        }
    }
}

// ============================================================================
// Selection
// ============================================================================

/// The first `count` images not explicitly marked unfeatured, in catalog order,
/// with their catalog index.
pub fn featured(images: &[ImageRecord], count: usize) -> Vec<(usize, &ImageRecord)> {
    images
        .iter()
        .enumerate()
        .filter(|(_, img)| img.is_featured())
        .take(count)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum GalleryFilter {
    All,
    Gallery(String),
}

impl GalleryFilter {
    pub fn matches(&self, image: &ImageRecord) -> bool {
        match self {
            GalleryFilter::All => true,
            GalleryFilter::Gallery(id) => image.gallery == *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterButton {
    pub label: String,
    pub filter: GalleryFilter,
}

/// `All` followed by one button per gallery.
pub fn filter_buttons(galleries: &[GalleryRecord]) -> Vec<FilterButton> {
    std::iter::once(FilterButton {
        label: "All".to_string(),
        filter: GalleryFilter::All,
    })
    .chain(galleries.iter().map(|g| FilterButton {
        label: g.name.clone(),
        filter: GalleryFilter::Gallery(g.id.clone()),
    }))
    .collect()
}

/// Images shown under `filter`, with their catalog index.
pub fn visible<'a>(images: &'a [ImageRecord], filter: &GalleryFilter) -> Vec<(usize, &'a ImageRecord)> {
    images
        .iter()
        .enumerate()
        .filter(|(_, img)| filter.matches(img))
        .collect()
}

// ============================================================================
// Cards
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryCard {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageCard {
    /// Position in the catalog document
    pub index: usize,
    pub src: String,
    pub href: String,
    pub alt: String,
    pub title: String,
    pub gallery_label: String,
}

/// One tile of a rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CatalogCard {
    Gallery(GalleryCard),
    Image(ImageCard),
}

/// Something that can be shown as a card.
pub enum CatalogEntity<'a> {
    Gallery(&'a GalleryRecord),
    Image { index: usize, record: &'a ImageRecord },
}

/// Everything a card needs besides the entity itself.
pub struct CardContext<'a> {
    pub resolver: &'a ImageUrlResolver,
    pub galleries: &'a [GalleryRecord],
    pub images: &'a [ImageRecord],
    /// Variant used for the tile; the link always points at `full`
    pub tile: Variant,
}

impl CatalogCard {
    /// `position` picks the placeholder photo; the catalog index is kept on the card.
    pub fn render(entity: CatalogEntity<'_>, position: usize, ctx: &CardContext<'_>) -> Self {
        match entity {
            CatalogEntity::Gallery(gallery) => CatalogCard::Gallery(GalleryCard {
                id: gallery.id.clone(),
                name: gallery.name.clone(),
                description: gallery.description.clone(),
                image_count: ctx.images.iter().filter(|i| i.gallery == gallery.id).count(),
            }),
            CatalogEntity::Image { index, record } => {
                let alt = [&record.alt, &record.title]
                    .into_iter()
                    .find(|s| !s.is_empty())
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_ALT.to_string());
                let title = if record.title.is_empty() {
                    record.filename.clone()
                } else {
                    record.title.clone()
                };

                CatalogCard::Image(ImageCard {
                    index,
                    src: ctx.resolver.url(&record.filename, ctx.tile, position),
                    href: ctx.resolver.url(&record.filename, Variant::Full, position),
                    alt,
                    title,
                    gallery_label: gallery_label(record, ctx.galleries),
                })
            }
        }
    }
}

/// The image's gallery name, or [`UNCATEGORIZED`] when it has none or it was removed.
pub fn gallery_label(image: &ImageRecord, galleries: &[GalleryRecord]) -> String {
    galleries
        .iter()
        .find(|g| !image.gallery.is_empty() && g.id == image.gallery)
        .map(|g| g.name.clone())
        .unwrap_or_else(|| UNCATEGORIZED.to_string())
}

// ============================================================================
// Pages
// ============================================================================

/// Read-only snapshot of the catalog for the public pages.
#[derive(Debug, Clone)]
pub struct PublicSite {
    pub images: Vec<ImageRecord>,
    pub galleries: Vec<GalleryRecord>,
    resolver: ImageUrlResolver,
    featured_count: usize,
}

impl PublicSite {
    /// A missing document renders as an empty page.
    pub async fn load(chain: &SourceChain, config: &SiteConfig) -> Self {
        let images: ImageCatalog = chain.load_best_effort(ImageCatalog::KEY).await;
        let galleries: GalleryCatalog = chain.load_best_effort(GalleryCatalog::KEY).await;
        Self::new(images, galleries, config)
    }

    pub fn new(images: ImageCatalog, galleries: GalleryCatalog, config: &SiteConfig) -> Self {
        Self {
            images: images.images,
            galleries: galleries.galleries,
            resolver: ImageUrlResolver::from_config(config),
            featured_count: config.featured_count,
        }
    }

    fn context(&self, tile: Variant) -> CardContext<'_> {
        CardContext {
            resolver: &self.resolver,
            galleries: &self.galleries,
            images: &self.images,
            tile,
        }
    }

    /// Home page carousel.
    pub fn featured_cards(&self) -> Vec<CatalogCard> {
        let ctx = self.context(Variant::Gallery);
        featured(&self.images, self.featured_count)
            .into_iter()
            .enumerate()
            .map(|(position, (index, record))| {
                CatalogCard::render(CatalogEntity::Image { index, record }, position, &ctx)
            })
            .collect()
    }

    /// Portfolio grid under `filter`.
    pub fn grid_cards(&self, filter: &GalleryFilter) -> Vec<CatalogCard> {
        let ctx = self.context(Variant::Gallery);
        visible(&self.images, filter)
            .into_iter()
            .map(|(index, record)| {
                CatalogCard::render(CatalogEntity::Image { index, record }, index, &ctx)
            })
            .collect()
    }

    /// One card per gallery.
    pub fn gallery_cards(&self) -> Vec<CatalogCard> {
        let ctx = self.context(Variant::Gallery);
        self.galleries
            .iter()
            .enumerate()
            .map(|(i, g)| CatalogCard::render(CatalogEntity::Gallery(g), i, &ctx))
            .collect()
    }

    pub fn filter_buttons(&self) -> Vec<FilterButton> {
        filter_buttons(&self.galleries)
    }
}

/// Admin image list: thumbnails read through the proxy.
pub fn admin_cards(
    images: &[(usize, &ImageRecord)],
    galleries: &[GalleryRecord],
    proxy: &ProxyClient,
) -> Vec<CatalogCard> {
    let resolver = ImageUrlResolver::Proxy(proxy.clone());
    let ctx = CardContext {
        resolver: &resolver,
        galleries,
        images: &[],
        tile: Variant::Thumbnail,
    };
    images
        .iter()
        .map(|&(index, record)| CatalogCard::render(CatalogEntity::Image { index, record }, index, &ctx))
        .collect()
}
