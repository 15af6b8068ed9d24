//! What a resize should produce.
//!
//! [`ResizeParams`] is planned by [`operations`](super::operations) from a
//! [`VariantSpec`](super::VariantSpec) and handed to an
//! [`ImageBackend`](super::ImageBackend) unchanged, so tests can compare the
//! plan against what a mock backend received.

use std::path::PathBuf;

/// Unsharp mask applied after the downscale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    /// Blur radius of the mask, in pixels.
    pub sigma: f32,
    /// Luminance difference below which pixels are left alone.
    pub threshold: i32,
}

impl Sharpening {
    /// Restores edge contrast lost when a 2500px cover shrinks to a thumbnail.
    pub fn light() -> Self {
        Self {
            sigma: 0.5,
            threshold: 0,
        }
    }
}

/// One cover variant: `source` scaled to cover `width`×`height`, the excess
/// cropped evenly from both sides, written to `output` as PNG.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub sharpening: Option<Sharpening>,
}
