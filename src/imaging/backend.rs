//! The resize seam.
//!
//! Cover variants are the only pixel work guidepress does itself, so the
//! trait has a single method. [`RustBackend`](super::RustBackend) is the
//! production implementation; tests use [`tests::MockBackend`].

use super::params::ResizeParams;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot decode {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("cannot write {path}: {message}")]
    Encode { path: PathBuf, message: String },
    #[error("target size {width}x{height} is empty")]
    EmptyTarget { width: u32, height: u32 },
}

/// Writes a resized copy of an image.
///
/// `Sync` because one resizer serves every rayon worker of a batch.
pub trait ImageBackend: Sync {
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}
