//! Screenshot backend trait and shared types.
//!
//! A [`ScreenshotBackend`] loads a URL in a browser viewport of a given size
//! and writes what it sees to a PNG. The production implementation is
//! [`ChromeBackend`](super::chrome::ChromeBackend); tests use the recording
//! mock below.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("failed to load {url}: {message}")]
    Navigation { url: String, message: String },
    #[error("screenshot failed: {0}")]
    Screenshot(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// CSS viewport size plus device scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

impl Viewport {
    /// Size of the captured image in physical pixels.
    pub fn device_pixels(&self) -> (u32, u32) {
        (
            (self.width as f64 * self.device_scale_factor).round() as u32,
            (self.height as f64 * self.device_scale_factor).round() as u32,
        )
    }
}

impl From<crate::config::ViewportConfig> for Viewport {
    fn from(config: crate::config::ViewportConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            device_scale_factor: config.scale,
        }
    }
}

/// One screenshot to take.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureParams {
    pub url: String,
    pub viewport: Viewport,
    pub output: PathBuf,
}

/// Trait for screenshot backends.
///
/// `Sync` so one browser can serve every rayon worker.
pub trait ScreenshotBackend: Sync {
    fn capture(&self, params: &CaptureParams) -> Result<(), CaptureError>;
}
