//! Shared types used by both pipelines.
//!
//! A [`ContentItem`] is built once per discovered file and is read-only for the
//! rest of the run. Serializable so `guidepress check --json` can dump the scan.

use serde::Serialize;
use std::path::PathBuf;

/// One post: front-matter fields plus the Markdown body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// File the item was read from.
    pub source_path: PathBuf,
    pub title: String,
    /// Artifact key for images and the book identifier. Safe as a file name.
    pub slug: String,
    /// Empty when the front-matter has none.
    pub description: String,
    /// Site-relative image shown on cards. Empty when absent.
    pub home_image: String,
    /// Markdown after the front-matter block.
    #[serde(skip_serializing)]
    pub body: String,
}

/// A section of a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Plain-text title, used in the TOC.
    pub title: String,
    /// XHTML fragment.
    pub data: String,
}
