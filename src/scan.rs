//! Content discovery.
//!
//! Finds every post matching the configured glob, skips templates, and parses
//! each file into a [`ContentItem`]. Both pipelines start here, and any file
//! that fails to parse fails the whole batch before work is dispatched.
//!
//! ## Directory Structure
//!
//! ```text
//! src/posts/
//! ├── getting-started.md          # → item "getting-started"
//! ├── guides/
//! │   └── deploy.md               # → item "deploy" (glob is recursive)
//! └── _template.md                # skipped: path contains the marker
//! ```
//!
//! The literal directories at the start of the glob (`src/posts` above) are
//! the walk root. A missing walk root means there is nothing to do.

use crate::front_matter::{self, FrontMatterError};
use crate::types::ContentItem;
use globset::{GlobBuilder, GlobMatcher};
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Invalid content glob: {0}")]
    Glob(#[from] globset::Error),
    #[error("{path}: {source}")]
    FrontMatter {
        path: PathBuf,
        source: FrontMatterError,
    },
    #[error("Duplicate slug `{slug}` in {first} and {second}")]
    DuplicateSlug {
        slug: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Matches paths relative to a project root against a content glob.
struct ContentPattern {
    walk_root: PathBuf,
    matcher: GlobMatcher,
}

impl ContentPattern {
    fn new(pattern: &str) -> Result<Self, ScanError> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()?
            .compile_matcher();
        Ok(Self {
            walk_root: literal_prefix(pattern),
            matcher,
        })
    }
}

/// Leading path components of `pattern` that contain no glob syntax.
fn literal_prefix(pattern: &str) -> PathBuf {
    let mut prefix = PathBuf::new();
    let components: Vec<&str> = pattern.split('/').collect();
    // The last component names files, never a directory to walk from.
    for part in &components[..components.len().saturating_sub(1)] {
        if part.contains(['*', '?', '[', '{']) {
            break;
        }
        prefix.push(part);
    }
    prefix
}

/// Discover content files under `root` matching `pattern`.
///
/// Paths containing `exclude_marker` are skipped. Results are absolute when
/// `root` is, and sorted.
pub fn discover(root: &Path, pattern: &str, exclude_marker: &str) -> Result<Vec<PathBuf>, ScanError> {
    let pattern = ContentPattern::new(pattern)?;
    let walk_root = root.join(&pattern.walk_root);
    if !walk_root.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&walk_root).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        if !pattern.matcher.is_match(normalize(relative)) {
            continue;
        }
        if !exclude_marker.is_empty() && relative.to_string_lossy().contains(exclude_marker) {
            continue;
        }
        files.push(path.to_path_buf());
    }
    files.sort();
    Ok(files)
}

/// Forward-slash form of a relative path, so globs match on every platform.
fn normalize(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Read and parse a single content file.
pub fn load_item(path: &Path) -> Result<ContentItem, ScanError> {
    let source = fs::read_to_string(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (fm, body) = front_matter::parse(&source).map_err(|source| ScanError::FrontMatter {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ContentItem {
        source_path: path.to_path_buf(),
        title: fm.title,
        slug: fm.slug,
        description: fm.description,
        home_image: fm.home_image,
        body: body.to_string(),
    })
}

/// Discover and parse every content item.
///
/// Two items sharing a slug would overwrite each other's images, so that is
/// an error.
pub fn scan(root: &Path, pattern: &str, exclude_marker: &str) -> Result<Vec<ContentItem>, ScanError> {
    let items = discover(root, pattern, exclude_marker)?
        .iter()
        .map(|path| load_item(path))
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for item in &items {
        if let Some(first) = seen.insert(&item.slug, &item.source_path) {
            return Err(ScanError::DuplicateSlug {
                slug: item.slug.clone(),
                first: first.to_path_buf(),
                second: item.source_path.clone(),
            });
        }
    }
    Ok(items)
}
