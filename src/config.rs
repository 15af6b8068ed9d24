//! Project configuration module.
//!
//! Handles loading, validating, and merging `guidepress.toml`. Stock defaults
//! match the layout of a typical guide site, so a project that follows it
//! needs no config file at all:
//!
//! ```text
//! site/
//! ├── guidepress.toml            # Optional, sparse overrides
//! └── src/
//!     ├── posts/**/*.md          # Content items (front-matter + body)
//!     ├── books/                 # ← <title>.epub
//!     └── assets/
//!         ├── css/book.css       # Ebook stylesheet
//!         └── img/
//!             ├── social/        # ← <slug>.png, <slug>-square.png
//!             └── books/         # ← <slug>.png, -thumb.png, -medium.png
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! [content]
//! posts = "src/posts/**/*.md"   # Glob, relative to the project root
//! exclude_marker = "_template"  # Paths containing this are skipped
//!
//! [assets]
//! dir = "src/assets"            # Local directory served at url_prefix
//! url_prefix = "/assets/"
//!
//! [book]
//! output_dir = "src/books"
//! stylesheet = "src/assets/css/book.css"
//! author = ""
//! language = "en"
//! toc_title = "Contents"
//! highlight_theme = "InspiredGitHub"
//!
//! [book.signoff]
//! site_url = ""
//! contact_email = ""
//!
//! [images]
//! preview_url = "http://localhost:8080"
//! social_dir = "src/assets/img/social"
//! covers_dir = "src/assets/img/books"
//! thumb = [250, 400]
//! medium = [500, 800]
//!
//! [images.social]
//! width = 1200
//! height = 630
//! scale = 1.0
//!
//! [processing]
//! max_processes = 4             # Omit for auto = CPU cores
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the project root.
pub const CONFIG_FILENAME: &str = "guidepress.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Project configuration loaded from `guidepress.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Where content items live.
    pub content: ContentConfig,
    /// Local asset directory and the URL prefix it is served under.
    pub assets: AssetsConfig,
    /// Ebook export settings.
    pub book: BookConfig,
    /// Card screenshot and cover resize settings.
    pub images: ImagesConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content.posts.trim().is_empty() {
            return Err(ConfigError::Validation(
                "content.posts must not be empty".into(),
            ));
        }
        if let Err(e) = globset::Glob::new(&self.content.posts) {
            return Err(ConfigError::Validation(format!(
                "content.posts is not a valid glob: {e}"
            )));
        }
        if !self.assets.url_prefix.starts_with('/') || !self.assets.url_prefix.ends_with('/') {
            return Err(ConfigError::Validation(
                "assets.url_prefix must start and end with '/'".into(),
            ));
        }
        if !(self.images.preview_url.starts_with("http://")
            || self.images.preview_url.starts_with("https://"))
        {
            return Err(ConfigError::Validation(
                "images.preview_url must be an http(s) URL".into(),
            ));
        }
        for (name, viewport) in [
            ("social", &self.images.social),
            ("social_square", &self.images.social_square),
            ("cover", &self.images.cover),
        ] {
            if viewport.width == 0 || viewport.height == 0 {
                return Err(ConfigError::Validation(format!(
                    "images.{name} width and height must be non-zero"
                )));
            }
            if !(viewport.scale > 0.0) {
                return Err(ConfigError::Validation(format!(
                    "images.{name}.scale must be positive"
                )));
            }
        }
        for (name, size) in [("thumb", self.images.thumb), ("medium", self.images.medium)] {
            if size[0] == 0 || size[1] == 0 {
                return Err(ConfigError::Validation(format!(
                    "images.{name} values must be non-zero"
                )));
            }
        }
        Ok(())
    }

    /// Resolve every configured path against the project root.
    ///
    /// The root is made absolute so rewritten asset URLs point at real files
    /// regardless of the working directory.
    pub fn paths(&self, root: &Path) -> ProjectPaths {
        let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        ProjectPaths {
            assets_dir: root.join(&self.assets.dir),
            stylesheet: root.join(&self.book.stylesheet),
            books_dir: root.join(&self.book.output_dir),
            social_dir: root.join(&self.images.social_dir),
            covers_dir: root.join(&self.images.covers_dir),
            root,
        }
    }
}

/// Absolute locations derived from [`SiteConfig`] and a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
    pub stylesheet: PathBuf,
    pub books_dir: PathBuf,
    pub social_dir: PathBuf,
    pub covers_dir: PathBuf,
}

/// Content discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentConfig {
    /// Glob selecting content files, relative to the project root.
    pub posts: String,
    /// Any path containing this substring is skipped.
    pub exclude_marker: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            posts: "src/posts/**/*.md".to_string(),
            exclude_marker: "_template".to_string(),
        }
    }
}

/// Static asset settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// Directory holding the site's static assets, relative to the root.
    pub dir: String,
    /// Site-relative URL prefix under which `dir` is served.
    pub url_prefix: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            dir: "src/assets".to_string(),
            url_prefix: "/assets/".to_string(),
        }
    }
}

/// Ebook export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BookConfig {
    /// Directory receiving `<title>.epub`.
    pub output_dir: String,
    /// CSS embedded in every book.
    pub stylesheet: String,
    /// `dc:creator` and sign-off name. Empty omits both.
    pub author: String,
    /// `dc:language` code.
    pub language: String,
    /// Heading of the generated table of contents.
    pub toc_title: String,
    /// Name of a syntect default theme used for code blocks.
    pub highlight_theme: String,
    /// Closing "Thank you" chapter.
    pub signoff: SignoffConfig,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            output_dir: "src/books".to_string(),
            stylesheet: "src/assets/css/book.css".to_string(),
            author: String::new(),
            language: "en".to_string(),
            toc_title: "Contents".to_string(),
            highlight_theme: "InspiredGitHub".to_string(),
            signoff: SignoffConfig::default(),
        }
    }
}

/// Links shown in the closing chapter. Empty values are left out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignoffConfig {
    pub site_url: String,
    pub contact_email: String,
}

/// A browser viewport: CSS pixel size plus device scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
    pub scale: f64,
}

/// Card screenshot and cover resize settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Base URL of the running preview server.
    pub preview_url: String,
    /// Directory receiving `<slug>.png` and `<slug>-square.png`.
    pub social_dir: String,
    /// Directory receiving `<slug>.png`, `<slug>-thumb.png`, `<slug>-medium.png`.
    pub covers_dir: String,
    pub social: ViewportConfig,
    pub social_square: ViewportConfig,
    pub cover: ViewportConfig,
    /// Thumbnail size `[width, height]` derived from the cover.
    pub thumb: [u32; 2],
    /// Medium size `[width, height]` derived from the cover.
    pub medium: [u32; 2],
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            preview_url: "http://localhost:8080".to_string(),
            social_dir: "src/assets/img/social".to_string(),
            covers_dir: "src/assets/img/books".to_string(),
            social: ViewportConfig {
                width: 1200,
                height: 630,
                scale: 1.0,
            },
            social_square: ViewportConfig {
                width: 1200,
                height: 1200,
                scale: 1.0,
            },
            cover: ViewportConfig {
                width: 1000,
                height: 1600,
                scale: 2.5,
            },
            thumb: [250, 400],
            medium: [500, 800],
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of items processed at once.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(config_path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `guidepress.toml` from the project root, falling back to defaults.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    load_config_file(&root.join(CONFIG_FILENAME))
}

/// Load an explicit config file. A missing file is an error here, since the
/// user named it.
pub fn load_explicit_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("config file not found: {}", path.display()),
        )));
    }
    load_config_file(path)
}

fn load_config_file(path: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `guidepress.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# guidepress configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Paths are relative to the project root (--root).

# ---------------------------------------------------------------------------
# Content discovery
# ---------------------------------------------------------------------------
[content]
# Glob selecting content files (Markdown with YAML front-matter).
posts = "src/posts/**/*.md"
# Files whose path contains this text are skipped.
exclude_marker = "_template"

# ---------------------------------------------------------------------------
# Static assets
# ---------------------------------------------------------------------------
[assets]
# Local directory served by the site under url_prefix. Ebook export rewrites
# url_prefix references in posts to this directory and embeds the files.
dir = "src/assets"
url_prefix = "/assets/"

# ---------------------------------------------------------------------------
# Ebook export (guidepress books)
# ---------------------------------------------------------------------------
[book]
output_dir = "src/books"
stylesheet = "src/assets/css/book.css"
author = ""
language = "en"
toc_title = "Contents"
# One of syntect's bundled themes, e.g. "InspiredGitHub",
# "base16-ocean.light", "Solarized (light)".
highlight_theme = "InspiredGitHub"

[book.signoff]
# Shown in the closing "Thank you" chapter. Empty values are omitted.
site_url = ""
contact_email = ""

# ---------------------------------------------------------------------------
# Card screenshots (guidepress images)
# ---------------------------------------------------------------------------
[images]
# The site's preview server must be running and expose
# /generate/social and /generate/book.
preview_url = "http://localhost:8080"
social_dir = "src/assets/img/social"
covers_dir = "src/assets/img/books"
# Resized copies of the cover, [width, height].
thumb = [250, 400]
medium = [500, 800]

[images.social]
width = 1200
height = 630
scale = 1.0

[images.social_square]
width = 1200
height = 1200
scale = 1.0

[images.cover]
width = 1000
height = 1600
scale = 2.5

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum number of posts processed at once (default: CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_site_layout() {
        let config = SiteConfig::default();
        assert_eq!(config.content.posts, "src/posts/**/*.md");
        assert_eq!(config.content.exclude_marker, "_template");
        assert_eq!(config.assets.url_prefix, "/assets/");
        assert_eq!(config.book.toc_title, "Contents");
    }

    #[test]
    fn default_viewports() {
        let images = ImagesConfig::default();
        assert_eq!((images.social.width, images.social.height), (1200, 630));
        assert_eq!(images.social.scale, 1.0);
        assert_eq!((images.cover.width, images.cover.height), (1000, 1600));
        assert_eq!(images.cover.scale, 2.5);
        assert_eq!(images.thumb, [250, 400]);
        assert_eq!(images.medium, [500, 800]);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[book]
author = "Jane Doe"
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.book.author, "Jane Doe");
        // Untouched fields keep defaults
        assert_eq!(config.book.language, "en");
        assert_eq!(config.images.preview_url, "http://localhost:8080");
    }

    #[test]
    fn integer_scale_is_accepted() {
        let toml = r#"
[images.cover]
width = 800
height = 1280
scale = 2
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.images.cover.scale, 2.0);
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.content.posts, "src/posts/**/*.md");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[content]
posts = "content/*.md"

[processing]
max_processes = 2
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.content.posts, "content/*.md");
        assert_eq!(config.content.exclude_marker, "_template");
        assert_eq!(config.processing.max_processes, Some(2));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "this is not valid toml [[[").unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn load_explicit_config_requires_file() {
        let tmp = TempDir::new().unwrap();
        let result = load_explicit_config(&tmp.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let toml = r#"
[book]
autor = "typo"
"#;
        let result: Result<SiteConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<SiteConfig, _> = toml::from_str("[cache]\nenabled = true\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_viewport_key_rejected() {
        let toml = r#"
[images.social]
width = 1200
height = 630
scale = 1.0
dpi = 72
"#;
        let result: Result<SiteConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"author = "a""#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"author = "b""#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("author").unwrap().as_str(), Some("b"));
    }

    #[test]
    fn merge_toml_nested_tables_keep_siblings() {
        let merged = merge_toml(
            stock_defaults_value(),
            toml::from_str(
                r#"
[images.cover]
width = 800
height = 1280
scale = 2.0
"#,
            )
            .unwrap(),
        );
        let config: SiteConfig = merged.try_into().unwrap();
        assert_eq!(config.images.cover.width, 800);
        // Sibling tables untouched
        assert_eq!(config.images.social.width, 1200);
        assert_eq!(config.images.preview_url, "http://localhost:8080");
    }

    #[test]
    fn merge_toml_overlay_adds_keys() {
        let base: toml::Value = toml::from_str("a = 1").unwrap();
        let overlay: toml::Value = toml::from_str("b = 2").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(1));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(2));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(SiteConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_url_prefix_needs_slashes() {
        let mut config = SiteConfig::default();
        config.assets.url_prefix = "assets".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_rejects_non_http_preview_url() {
        let mut config = SiteConfig::default();
        config.images.preview_url = "localhost:8080".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_viewport() {
        let mut config = SiteConfig::default();
        config.images.social_square.height = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("social_square"), "{err}");
    }

    #[test]
    fn validate_rejects_non_positive_scale() {
        let mut config = SiteConfig::default();
        config.images.cover.scale = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_resize() {
        let mut config = SiteConfig::default();
        config.images.thumb = [0, 400];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_glob() {
        let mut config = SiteConfig::default();
        config.content.posts = "src/posts/[*.md".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[images]\nthumb = [0, 0]\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn stock_config_toml_is_valid_and_matches_defaults() {
        let config: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        config.validate().unwrap();
        let defaults = SiteConfig::default();
        assert_eq!(config.content.posts, defaults.content.posts);
        assert_eq!(config.images.cover, defaults.images.cover);
        assert_eq!(config.book.highlight_theme, defaults.book.highlight_theme);
    }

    #[test]
    fn paths_are_absolute_and_joined() {
        let tmp = TempDir::new().unwrap();
        let paths = SiteConfig::default().paths(tmp.path());
        assert!(paths.root.is_absolute());
        assert_eq!(paths.books_dir, tmp.path().join("src/books"));
        assert_eq!(paths.covers_dir, tmp.path().join("src/assets/img/books"));
    }

    // =========================================================================
    // Processing config tests
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_never_zero() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }
}
