//! Social and cover image rendering.
//!
//! The preview server renders a card page for each post; this module
//! screenshots those pages and derives the smaller cover sizes. Per item:
//!
//! ```text
//! /generate/social  1200x630  @1x   → social/<slug>.png
//! /generate/social  1200x1200 @1x   → social/<slug>-square.png
//! /generate/book    1000x1600 @2.5x → books/<slug>.png        (2500x4000)
//!                   cover resized   → books/<slug>-thumb.png  (250x400)
//!                                   → books/<slug>-medium.png (500x800)
//! ```
//!
//! Viewports and resize targets come from `[images]` in `guidepress.toml`.
//! Every run rewrites all five files.

use crate::capture::{CaptureError, CaptureParams, ScreenshotBackend, Viewport};
use crate::config::{ImagesConfig, ProjectPaths};
use crate::imaging::{BackendError, ImageBackend, VariantSpec, create_variant};
use crate::types::ContentItem;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagesError {
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{slug}: {source}")]
    Capture { slug: String, source: CaptureError },
    #[error("{slug}: resizing cover failed: {source}")]
    Imaging { slug: String, source: BackendError },
}

/// Card template served by the preview server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Card {
    Social,
    Book,
}

impl Card {
    fn route(self) -> &'static str {
        match self {
            Card::Social => "social",
            Card::Book => "book",
        }
    }
}

/// Where and how big every artifact is.
#[derive(Debug, Clone)]
pub struct ImageTargets {
    pub preview_url: String,
    pub social_dir: PathBuf,
    pub covers_dir: PathBuf,
    pub social: Viewport,
    pub social_square: Viewport,
    pub cover: Viewport,
    pub thumb: [u32; 2],
    pub medium: [u32; 2],
}

impl ImageTargets {
    pub fn from_config(config: &ImagesConfig, paths: &ProjectPaths) -> Self {
        Self {
            preview_url: config.preview_url.clone(),
            social_dir: paths.social_dir.clone(),
            covers_dir: paths.covers_dir.clone(),
            social: config.social.into(),
            social_square: config.social_square.into(),
            cover: config.cover.into(),
            thumb: config.thumb,
            medium: config.medium,
        }
    }
}

/// The five files written for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemImages {
    pub slug: String,
    pub social: PathBuf,
    pub social_square: PathBuf,
    pub cover: PathBuf,
    pub thumb: PathBuf,
    pub medium: PathBuf,
}

impl ItemImages {
    pub fn paths(&self) -> [&Path; 5] {
        [
            self.social.as_path(),
            self.social_square.as_path(),
            self.cover.as_path(),
            self.thumb.as_path(),
            self.medium.as_path(),
        ]
    }
}

/// Progress reported as each item finishes.
#[derive(Debug, Clone)]
pub enum ImageEvent {
    Rendered {
        /// 1-based position of the item in discovery order.
        index: usize,
        title: String,
        images: ItemImages,
    },
}

/// Card page URL with `title`, `description` and `image` query parameters.
pub fn card_url(base: &str, card: Card, item: &ContentItem) -> String {
    format!(
        "{}/generate/{}?title={}&description={}&image={}",
        base.trim_end_matches('/'),
        card.route(),
        urlencoding::encode(&item.title),
        urlencoding::encode(&item.description),
        urlencoding::encode(&item.home_image),
    )
}

/// The three screenshots for an item, in capture order.
pub fn plan_captures(targets: &ImageTargets, item: &ContentItem) -> [CaptureParams; 3] {
    let social_url = card_url(&targets.preview_url, Card::Social, item);
    [
        CaptureParams {
            url: social_url.clone(),
            viewport: targets.social,
            output: targets.social_dir.join(format!("{}.png", item.slug)),
        },
        CaptureParams {
            url: social_url,
            viewport: targets.social_square,
            output: targets.social_dir.join(format!("{}-square.png", item.slug)),
        },
        CaptureParams {
            url: card_url(&targets.preview_url, Card::Book, item),
            viewport: targets.cover,
            output: targets.covers_dir.join(format!("{}.png", item.slug)),
        },
    ]
}

/// Capture the three cards, then resize the cover. Stops at the first failure.
pub fn render_item_images(
    targets: &ImageTargets,
    shooter: &dyn ScreenshotBackend,
    resizer: &dyn ImageBackend,
    item: &ContentItem,
) -> Result<ItemImages, ImagesError> {
    let [social, square, cover] = plan_captures(targets, item);
    for params in [&social, &square, &cover] {
        shooter
            .capture(params)
            .map_err(|source| ImagesError::Capture {
                slug: item.slug.clone(),
                source,
            })?;
    }

    let resize = |spec: VariantSpec| {
        create_variant(resizer, &cover.output, &spec).map_err(|source| ImagesError::Imaging {
            slug: item.slug.clone(),
            source,
        })
    };
    let thumb = resize(VariantSpec::thumb(targets.thumb))?;
    let medium = resize(VariantSpec::medium(targets.medium))?;

    Ok(ItemImages {
        slug: item.slug.clone(),
        social: social.output,
        social_square: square.output,
        cover: cover.output,
        thumb,
        medium,
    })
}

/// Render images for every item in parallel.
///
/// Output directories are created up front. The first failing item fails the
/// batch once in-flight items have finished. Results come back in input order.
pub fn render_images(
    targets: &ImageTargets,
    shooter: &dyn ScreenshotBackend,
    resizer: &dyn ImageBackend,
    items: &[ContentItem],
    progress: Option<Sender<ImageEvent>>,
) -> Result<Vec<ItemImages>, ImagesError> {
    for dir in [&targets.social_dir, &targets.covers_dir] {
        std::fs::create_dir_all(dir).map_err(|source| ImagesError::OutputDir {
            path: dir.clone(),
            source,
        })?;
    }

    items
        .par_iter()
        .enumerate()
        .map_with(progress, |progress, (i, item)| {
            let images = render_item_images(targets, shooter, resizer, item)?;
            if let Some(tx) = progress {
                tx.send(ImageEvent::Rendered {
                    index: i + 1,
                    title: item.title.clone(),
                    images: images.clone(),
                })
                .ok();
            }
            Ok(images)
        })
        .collect()
}
