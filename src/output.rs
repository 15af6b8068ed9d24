//! CLI output formatting for all commands.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Every item is shown by
//! its positional index and title; filesystem paths follow as indented context
//! lines, relative to the project root. The output reads as a content
//! inventory while still letting users trace each artifact back to a file.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Posts
//! 001 Getting Started with Rust
//!     Source: src/posts/rust/index.md
//!     Slug: rust
//!     Description: A short guide to the Rust toolchain
//!
//! Config
//!     guidepress.toml
//!     src/assets/
//! ```
//!
//! ## Books
//!
//! ```text
//! 001 Getting Started with Rust → src/books/Getting Started with Rust.epub (4 chapters, 2 images)
//!     warning: missing image /work/src/assets/img/x.png
//! Exported 1 book
//! ```
//!
//! ## Images
//!
//! ```text
//! 001 Getting Started with Rust
//!     social: src/assets/img/social/rust.png
//!     square: src/assets/img/social/rust-square.png
//!     cover: src/assets/img/books/rust.png
//!     thumb: src/assets/img/books/rust-thumb.png
//!     medium: src/assets/img/books/rust-medium.png
//! Rendered images for 1 post
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Events produced
//! on worker threads are formatted by the single printer thread in `main`.

use crate::book::{BookEvent, ExportedBook};
use crate::config::CONFIG_FILENAME;
use crate::images::{ImageEvent, ItemImages};
use crate::types::ContentItem;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Positional index + title.
fn entity_header(index: usize, title: &str) -> String {
    format!("{} {}", format_index(index), title)
}

/// `path` relative to `root` when it lives under it, else as-is.
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}

// ============================================================================
// check
// ============================================================================

/// Format discovered posts plus the config files that were picked up.
pub fn format_scan_output(items: &[ContentItem], root: &Path, assets_dir: &Path) -> Vec<String> {
    let mut lines = vec!["Posts".to_string()];

    if items.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    }
    for (i, item) in items.iter().enumerate() {
        lines.push(entity_header(i + 1, &item.title));
        lines.push(format!(
            "{}Source: {}",
            indent(1),
            display_path(&item.source_path, root)
        ));
        lines.push(format!("{}Slug: {}", indent(1), item.slug));
        let desc = truncate_desc(item.description.trim(), 60);
        if !desc.is_empty() {
            lines.push(format!("{}Description: {}", indent(1), desc));
        }
    }

    lines.push(String::new());
    lines.push("Config".to_string());
    if root.join(CONFIG_FILENAME).exists() {
        lines.push(format!("{}{}", indent(1), CONFIG_FILENAME));
    }
    if assets_dir.is_dir() {
        lines.push(format!("{}{}/", indent(1), display_path(assets_dir, root)));
    }

    lines
}

/// Print scan output to stdout.
pub fn print_scan_output(items: &[ContentItem], root: &Path, assets_dir: &Path) {
    for line in format_scan_output(items, root, assets_dir) {
        println!("{}", line);
    }
}

// ============================================================================
// books
// ============================================================================

/// Format a single book progress event as display lines.
pub fn format_book_event(event: &BookEvent, root: &Path) -> Vec<String> {
    match event {
        BookEvent::Exported {
            index,
            title,
            output,
            chapters,
            images_embedded,
        } => vec![format!(
            "{} \u{2192} {} ({}, {})",
            entity_header(*index, title),
            display_path(output, root),
            plural(*chapters, "chapter"),
            plural(*images_embedded, "image"),
        )],
        BookEvent::Warning { title, message } => {
            vec![format!("{}warning: {}: {}", indent(1), title, message)]
        }
    }
}

pub fn format_books_summary(books: &[ExportedBook]) -> Vec<String> {
    let warnings: usize = books.iter().map(|b| b.warnings.len()).sum();
    let mut line = format!("Exported {}", plural(books.len(), "book"));
    if warnings > 0 {
        line.push_str(&format!(" with {}", plural(warnings, "warning")));
    }
    vec![line]
}

pub fn print_books_summary(books: &[ExportedBook]) {
    for line in format_books_summary(books) {
        println!("{}", line);
    }
}

// ============================================================================
// images
// ============================================================================

/// Format a single image progress event as display lines.
pub fn format_image_event(event: &ImageEvent, root: &Path) -> Vec<String> {
    match event {
        ImageEvent::Rendered {
            index,
            title,
            images,
        } => {
            let mut lines = vec![entity_header(*index, title)];
            let labels = ["social", "square", "cover", "thumb", "medium"];
            for (label, path) in labels.iter().zip(images.paths()) {
                lines.push(format!(
                    "{}{}: {}",
                    indent(1),
                    label,
                    display_path(path, root)
                ));
            }
            lines
        }
    }
}

pub fn format_images_summary(rendered: &[ItemImages]) -> Vec<String> {
    vec![format!(
        "Rendered images for {}",
        plural(rendered.len(), "post")
    )]
}

pub fn print_images_summary(rendered: &[ItemImages]) {
    for line in format_images_summary(rendered) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
