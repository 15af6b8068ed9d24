//! Browser screenshots of the preview server's card pages.
//!
//! - **Backend**: [`ScreenshotBackend`] trait, [`CaptureParams`], [`Viewport`]
//! - **Chrome**: [`ChromeBackend`], a single shared headless Chrome

pub mod backend;
pub mod chrome;

pub use backend::{CaptureError, CaptureParams, ScreenshotBackend, Viewport};
pub use chrome::ChromeBackend;
