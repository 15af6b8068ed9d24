//! Shared test utilities for the guidepress test suite.
//!
//! Provides fixture writers (posts, stylesheets, PNGs) and lookup helpers
//! that work with scan-phase data ([`ContentItem`]).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_post(tmp.path(), "src/posts/demo.md", "demo", "Demo", "## One\n");
//! let items = scan(tmp.path(), "src/posts/**/*.md", "_template").unwrap();
//! let demo = find_item(&items, "demo");
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::types::ContentItem;

// =========================================================================
// Fixture setup
// =========================================================================

/// Write a post with front-matter under `root/relative`, creating parents.
pub fn write_post(root: &Path, relative: &str, slug: &str, title: &str, body: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(
        &path,
        format!("---\ntitle: \"{title}\"\nslug: {slug}\ndescription: About {title}\n---\n{body}"),
    )
    .unwrap();
    path
}

/// Write the default book stylesheet under `root`.
pub fn write_stylesheet(root: &Path) -> PathBuf {
    let path = root.join("src/assets/css/book.css");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "body { font-family: serif; }\n").unwrap();
    path
}

/// Write a gradient PNG of the given size, creating parents.
pub fn write_test_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    });
    img.save(path).unwrap();
}

/// Build an in-memory item without touching the filesystem.
pub fn item(slug: &str, title: &str, body: &str) -> ContentItem {
    ContentItem {
        source_path: PathBuf::from(format!("src/posts/{slug}.md")),
        title: title.to_string(),
        slug: slug.to_string(),
        description: format!("About {title}"),
        home_image: String::new(),
        body: body.to_string(),
    }
}

// =========================================================================
// Lookups: panic with a clear message on miss
// =========================================================================

/// Find an item by slug. Panics if not found.
pub fn find_item<'a>(items: &'a [ContentItem], slug: &str) -> &'a ContentItem {
    items.iter().find(|i| i.slug == slug).unwrap_or_else(|| {
        let slugs: Vec<&str> = items.iter().map(|i| i.slug.as_str()).collect();
        panic!("item '{slug}' not found. Available: {slugs:?}")
    })
}

/// Names of the entries in a zip archive, in archive order.
pub fn zip_entries(path: &Path) -> Vec<String> {
    let file = fs::File::open(path).unwrap();
    let archive = zip::ZipArchive::new(file).unwrap();
    archive.file_names().map(str::to_string).collect()
}

/// Read one entry of a zip archive as text.
pub fn zip_text(path: &Path, name: &str) -> String {
    use std::io::Read;
    let file = fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entry = archive
        .by_name(name)
        .unwrap_or_else(|_| panic!("zip entry '{name}' not found"));
    let mut text = String::new();
    entry.read_to_string(&mut text).unwrap();
    text
}

/// Panics unless `xml` parses as XML with every element closed.
pub fn assert_well_formed(xml: &str) {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(start)) => {
                depth += 1;
                for attr in start.attributes() {
                    attr.unwrap_or_else(|e| panic!("bad attribute: {e}\n{xml}"));
                }
            }
            Ok(Event::Empty(empty)) => {
                for attr in empty.attributes() {
                    attr.unwrap_or_else(|e| panic!("bad attribute: {e}\n{xml}"));
                }
            }
            Ok(Event::End(_)) => depth -= 1,
            Ok(_) => {}
            Err(e) => panic!(
                "not well-formed at byte {}: {e}\n{xml}",
                reader.buffer_position()
            ),
        }
    }
    assert_eq!(depth, 0, "unclosed elements\n{xml}");
}
