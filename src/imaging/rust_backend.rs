//! Cover resizing on the `image` crate.
//!
//! | Step | Function |
//! |---|---|
//! | Decode | `ImageReader` with a sniffed format |
//! | Fill | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Crop | `DynamicImage::crop_imm` at [`calculate_center_crop`] |
//! | Sharpen | `image::imageops::unsharpen` |
//! | Encode | PNG |
//!
//! Covers come out of the browser as PNG and go back into the covers
//! directory as PNG, so no other codec is linked in.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{calculate_center_crop, calculate_fill_dimensions};
use super::params::ResizeParams;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::path::Path;

/// Statically linked resizer. Holds no state, so one value serves a batch.
#[derive(Debug, Default)]
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    let read_error = |source: std::io::Error| BackendError::Read {
        path: path.to_path_buf(),
        source,
    };
    ImageReader::open(path)
        .map_err(read_error)?
        .with_guessed_format()
        .map_err(read_error)?
        .decode()
        .map_err(|e| BackendError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

fn fill_and_crop(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (fill_w, fill_h) = calculate_fill_dimensions((img.width(), img.height()), (width, height));
    let filled = img.resize_exact(fill_w, fill_h, FilterType::Lanczos3);
    let (x, y) = calculate_center_crop((fill_w, fill_h), (width, height));
    filled.crop_imm(x, y, width, height)
}

impl ImageBackend for RustBackend {
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        if params.width == 0 || params.height == 0 {
            return Err(BackendError::EmptyTarget {
                width: params.width,
                height: params.height,
            });
        }
        let cropped = fill_and_crop(&load_image(&params.source)?, params.width, params.height);
        let variant = match params.sharpening {
            Some(s) => DynamicImage::from(image::imageops::unsharpen(&cropped, s.sigma, s.threshold)),
            None => cropped,
        };

        variant
            .save_with_format(&params.output, ImageFormat::Png)
            .map_err(|e| BackendError::Encode {
                path: params.output.clone(),
                message: e.to_string(),
            })
    }
}
