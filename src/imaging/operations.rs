//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, ImageBackend};
use super::params::{ResizeParams, Sharpening};
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// One resized copy of a source image.
///
/// The output lands next to the source as `<stem>-<suffix>.<ext>`.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantSpec {
    pub suffix: &'static str,
    pub width: u32,
    pub height: u32,
    pub sharpening: Option<Sharpening>,
}

impl VariantSpec {
    /// Small cover shown in listings. Lightly sharpened.
    pub fn thumb(size: [u32; 2]) -> Self {
        Self {
            suffix: "thumb",
            width: size[0],
            height: size[1],
            sharpening: Some(Sharpening::light()),
        }
    }

    /// Mid-size cover for detail pages.
    pub fn medium(size: [u32; 2]) -> Self {
        Self {
            suffix: "medium",
            width: size[0],
            height: size[1],
            sharpening: None,
        }
    }
}

/// Output path of a variant: `cover.png` + `thumb` → `cover-thumb.png`.
pub fn variant_path(source: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match source.extension() {
        Some(ext) => format!("{}-{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}-{}", stem, suffix),
    };
    source.with_file_name(file_name)
}

/// Plan a variant without executing it.
pub fn plan_variant(source: &Path, spec: &VariantSpec) -> ResizeParams {
    ResizeParams {
        source: source.to_path_buf(),
        output: variant_path(source, spec.suffix),
        width: spec.width,
        height: spec.height,
        sharpening: spec.sharpening,
    }
}

/// Write one variant of `source`. Returns the written path.
pub fn create_variant(
    backend: &dyn ImageBackend,
    source: &Path,
    spec: &VariantSpec,
) -> Result<PathBuf> {
    let params = plan_variant(source, spec);
    backend.resize(&params)?;
    Ok(params.output)
}
