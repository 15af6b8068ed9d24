//! # guidepress
//!
//! Batch ebook and social-image generator for Markdown guide sites.
//! Every post under the content tree becomes an EPUB plus a set of card
//! images, so guides can be sold as ebooks and shared with proper previews.
//!
//! # Pipeline
//!
//! ```text
//! discover  src/posts/**/*.md  →  ContentItem (front-matter + body)
//!
//! books     demote headings → absolute asset URLs → Markdown → HTML
//!           → XHTML tree → highlight code → embed images → split chapters
//!           → sign-off → EPUB
//!
//! images    card pages on the preview server → social, square, cover PNGs
//!           → thumb + medium covers
//! ```
//!
//! Items are independent and run in parallel on a rayon pool. A batch fails as
//! a whole when any item fails; there is no partial-success exit.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Walks the content tree with a glob, skips templates, loads items |
//! | [`front_matter`] | YAML front-matter splitting and field extraction |
//! | [`book`] | Markdown-to-EPUB transform chain and packaging |
//! | [`images`] | Card screenshots and cover resizing per item |
//! | [`capture`] | Screenshot backend seam and the headless Chrome implementation |
//! | [`imaging`] | Pure-Rust fill-and-crop resizing |
//! | [`config`] | `guidepress.toml` loading, merging over defaults, validation |
//! | [`types`] | Shared types (`ContentItem`, `Chapter`) |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Backends Behind Traits
//!
//! Markdown rendering, code highlighting, EPUB packaging, screenshots and
//! resizing each sit behind a small `Sync` trait. Production code wires in
//! pulldown-cmark, syntect, zip, headless Chrome and the `image` crate; unit
//! tests wire in recording mocks, so the whole pipeline is testable without a
//! browser.
//!
//! ## One Browser Per Batch
//!
//! The image stage launches a single headless Chrome and shares it across
//! workers. Each capture opens its own tab.
//!
//! ## Deterministic EPUBs
//!
//! The book identifier is derived from the slug and the modification stamp is
//! fixed, so rebuilding unchanged content yields the same package metadata.

pub mod book;
pub mod capture;
pub mod config;
pub mod front_matter;
pub mod images;
pub mod imaging;
pub mod output;
pub mod scan;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
