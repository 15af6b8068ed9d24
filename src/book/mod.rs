//! Ebook export.
//!
//! Turns every content item into an EPUB. Per item, strictly in order:
//!
//! ```text
//! body ─► demote headings ─► absolutize asset URLs ─► render Markdown
//!      ─► parse into a tree ─► highlight code ─► embed images
//!      ─► split on <h1> ─► + "Thank you" chapter
//!      ─► package <books_dir>/<title>.epub
//! ```
//!
//! Once rendered, the body is edited as an html5ever tree (see [`xhtml`]) and
//! every chapter is serialized from it as XHTML, with quote entities written
//! as literal characters.
//!
//! Rendering, highlighting and packaging go through the [`MarkdownRenderer`],
//! [`CodeHighlighter`] and [`BookPackager`] traits so tests can swap them.
//! Items are exported in parallel on the global rayon pool; the first failing
//! item fails the batch once in-flight items have finished.

pub mod chapters;
pub mod epub;
pub mod highlight;
pub mod render;
pub mod transform;
pub mod xhtml;

pub use chapters::{SIGNOFF_TITLE, signoff, split_chapters};
pub use epub::{Book, BookImage, BookPackager, EpubPackager, PackageError, embed_images};
pub use highlight::{CodeHighlighter, HighlightError, SyntectHighlighter, highlight_code_blocks};
pub use render::{MarkdownRenderer, PulldownRenderer};
pub use transform::{AssetRewriter, demote_headings};
pub use xhtml::Fragment;

use crate::config::{BookConfig, ProjectPaths};
use crate::types::ContentItem;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookError {
    #[error("cannot read stylesheet {path}: {source}")]
    Stylesheet {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{slug}: {source}")]
    Highlight {
        slug: String,
        source: HighlightError,
    },
    #[error("{slug}: packaging failed: {source}")]
    Package {
        slug: String,
        source: PackageError,
    },
    #[error("`{first}` and `{second}` would both be written to {file}; give one of them a different title")]
    DuplicateOutput {
        file: String,
        first: String,
        second: String,
    },
}

/// Progress reported as each book finishes.
#[derive(Debug, Clone)]
pub enum BookEvent {
    Exported {
        /// 1-based position of the item in discovery order.
        index: usize,
        title: String,
        output: PathBuf,
        chapters: usize,
        images_embedded: usize,
    },
    Warning {
        title: String,
        message: String,
    },
}

/// Result of exporting one item.
#[derive(Debug, Clone)]
pub struct ExportedBook {
    pub slug: String,
    pub title: String,
    pub output: PathBuf,
    pub chapters: usize,
    pub images_embedded: usize,
    pub warnings: Vec<String>,
}

/// Everything shared by all items of one export batch.
pub struct BookContext<'a> {
    pub renderer: &'a dyn MarkdownRenderer,
    pub highlighter: &'a dyn CodeHighlighter,
    pub packager: &'a dyn BookPackager,
    pub rewriter: AssetRewriter,
    pub css: String,
    pub books_dir: PathBuf,
    pub covers_dir: PathBuf,
    pub config: BookConfig,
}

impl<'a> BookContext<'a> {
    /// Read the stylesheet and resolve directories. A missing stylesheet fails
    /// the batch before any item is touched.
    pub fn new(
        config: &BookConfig,
        url_prefix: &str,
        paths: &ProjectPaths,
        renderer: &'a dyn MarkdownRenderer,
        highlighter: &'a dyn CodeHighlighter,
        packager: &'a dyn BookPackager,
    ) -> Result<Self, BookError> {
        let css = std::fs::read_to_string(&paths.stylesheet).map_err(|source| {
            BookError::Stylesheet {
                path: paths.stylesheet.clone(),
                source,
            }
        })?;
        Ok(Self {
            renderer,
            highlighter,
            packager,
            rewriter: AssetRewriter::new(url_prefix, &paths.assets_dir),
            css,
            books_dir: paths.books_dir.clone(),
            covers_dir: paths.covers_dir.clone(),
            config: config.clone(),
        })
    }
}

/// Markdown body to a highlighted tree.
pub fn transform_body(ctx: &BookContext, item: &ContentItem) -> Result<Fragment, BookError> {
    let demoted = demote_headings(&item.body);
    let absolute = ctx.rewriter.rewrite(&demoted);
    let fragment = Fragment::parse(&ctx.renderer.render(&absolute));
    highlight_code_blocks(&fragment, ctx.highlighter).map_err(|source| BookError::Highlight {
        slug: item.slug.clone(),
        source,
    })?;
    Ok(fragment)
}

/// Build the packaging input for one item. Returns non-fatal warnings too.
pub fn build_book(ctx: &BookContext, item: &ContentItem) -> Result<(Book, Vec<String>), BookError> {
    let fragment = transform_body(ctx, item)?;
    let (images, missing) = embed_images(&fragment);
    let mut chapters = split_chapters(&fragment, &item.title);
    chapters.push(signoff(&item.title, &ctx.config.author, &ctx.config.signoff));

    let mut warnings: Vec<String> = missing
        .iter()
        .map(|p| format!("image not found: {}", p.display()))
        .collect();
    let cover_path = ctx.covers_dir.join(format!("{}.png", item.slug));
    let cover = if cover_path.is_file() {
        Some(cover_path)
    } else {
        warnings.push(format!(
            "no cover at {}, run `guidepress images` first",
            cover_path.display()
        ));
        None
    };

    let book = Book {
        title: item.title.clone(),
        author: ctx.config.author.clone(),
        identifier: book_identifier(&item.slug),
        language: ctx.config.language.clone(),
        toc_title: ctx.config.toc_title.clone(),
        css: ctx.css.clone(),
        cover,
        chapters,
        images,
    };
    Ok((book, warnings))
}

/// Build and package one item into `<books_dir>/<title>.epub`.
pub fn export_book(ctx: &BookContext, item: &ContentItem) -> Result<ExportedBook, BookError> {
    let (book, warnings) = build_book(ctx, item)?;
    let output = output_path(&ctx.books_dir, item);

    ctx.packager
        .package(&book, &output)
        .map_err(|source| BookError::Package {
            slug: item.slug.clone(),
            source,
        })?;

    Ok(ExportedBook {
        slug: item.slug.clone(),
        title: item.title.clone(),
        output,
        chapters: book.chapters.len(),
        images_embedded: book.images.len(),
        warnings,
    })
}

/// Fail when two items would write the same book file.
///
/// File names come from titles, so two posts sharing a title would otherwise
/// race to overwrite each other's EPUB.
pub fn check_output_names(items: &[ContentItem]) -> Result<(), BookError> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for item in items {
        let file = output_file_name(&item.title, &item.slug);
        if let Some(first) = seen.get(&file) {
            return Err(BookError::DuplicateOutput {
                file,
                first: first.to_string(),
                second: item.slug.clone(),
            });
        }
        seen.insert(file, &item.slug);
    }
    Ok(())
}

/// Export every item in parallel.
///
/// Output names are checked before anything is written. Each finished item
/// sends its warnings and an `Exported` event to `progress`. Results come
/// back in input order.
pub fn export_books(
    ctx: &BookContext,
    items: &[ContentItem],
    progress: Option<Sender<BookEvent>>,
) -> Result<Vec<ExportedBook>, BookError> {
    check_output_names(items)?;
    std::fs::create_dir_all(&ctx.books_dir).map_err(|source| BookError::OutputDir {
        path: ctx.books_dir.clone(),
        source,
    })?;

    items
        .par_iter()
        .enumerate()
        .map_with(progress, |progress, (i, item)| {
            let exported = export_book(ctx, item)?;
            if let Some(tx) = progress {
                for message in &exported.warnings {
                    tx.send(BookEvent::Warning {
                        title: exported.title.clone(),
                        message: message.clone(),
                    })
                    .ok();
                }
                tx.send(BookEvent::Exported {
                    index: i + 1,
                    title: exported.title.clone(),
                    output: exported.output.clone(),
                    chapters: exported.chapters,
                    images_embedded: exported.images_embedded,
                })
                .ok();
            }
            Ok(exported)
        })
        .collect()
}

/// Deterministic book identifier derived from the slug.
pub fn book_identifier(slug: &str) -> String {
    format!("urn:sha256:{:x}", Sha256::digest(slug.as_bytes()))
}

/// `<title>.epub`, with characters that would break the path replaced.
pub fn output_file_name(title: &str, slug: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '-',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');
    let stem = if cleaned.is_empty() { slug } else { cleaned };
    format!("{stem}.epub")
}

/// Where the book for `item` is written.
pub fn output_path(books_dir: &Path, item: &ContentItem) -> PathBuf {
    books_dir.join(output_file_name(&item.title, &item.slug))
}
