//! Text transforms applied around Markdown rendering.
//!
//! Posts are written for the web, where the page title is the only `<h1>` and
//! sections start at `##`. A book wants one chapter per section, so sections
//! are promoted to `#` before rendering. Asset links point at the site root
//! and must be turned into files the packager can read.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::path::Path;

/// Promote every ATX heading of level 2 or deeper by one level.
///
/// `#` headings and lines inside fenced code blocks are left alone. Running
/// this twice would merge sections into their parents, so the pipeline calls
/// it exactly once per item.
pub fn demote_headings(markdown: &str) -> String {
    map_prose_lines(markdown, promote_heading)
}

/// Rebuild `markdown` with `f` applied to every line outside fenced code.
/// Fence lines and fenced content are copied unchanged.
fn map_prose_lines<'a>(markdown: &'a str, mut f: impl FnMut(&'a str) -> Cow<'a, str>) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut fence: Option<(char, usize)> = None;

    for line in markdown.split_inclusive('\n') {
        if let Some((ch, len)) = fence_marker(line) {
            match fence {
                None => fence = Some((ch, len)),
                Some((open_ch, open_len)) if ch == open_ch && len >= open_len => {
                    if is_closing_fence(line) {
                        fence = None;
                    }
                }
                Some(_) => {}
            }
            out.push_str(line);
            continue;
        }
        if fence.is_some() {
            out.push_str(line);
            continue;
        }
        out.push_str(&f(line));
    }
    out
}

/// `(fence char, run length)` when `line` opens or closes a code fence.
fn fence_marker(line: &str) -> Option<(char, usize)> {
    let trimmed = strip_indent(line)?;
    let ch = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = trimmed.chars().take_while(|c| *c == ch).count();
    (len >= 3).then_some((ch, len))
}

/// A closing fence carries no info string.
fn is_closing_fence(line: &str) -> bool {
    strip_indent(line)
        .map(|t| t.trim_start_matches(['`', '~']).trim().is_empty())
        .unwrap_or(false)
}

/// Up to three leading spaces are allowed before block markers.
fn strip_indent(line: &str) -> Option<&str> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    (indent <= 3).then(|| &line[indent..])
}

fn promote_heading(line: &str) -> Cow<'_, str> {
    let Some(trimmed) = strip_indent(line) else {
        return Cow::Borrowed(line);
    };
    let level = trimmed.bytes().take_while(|b| *b == b'#').count();
    if !(2..=6).contains(&level) {
        return Cow::Borrowed(line);
    }
    let after = &trimmed[level..];
    if !(after.is_empty() || after.starts_with([' ', '\t', '\n', '\r'])) {
        return Cow::Borrowed(line);
    }
    let indent = &line[..line.len() - trimmed.len()];
    Cow::Owned(format!("{indent}{}", &trimmed[1..]))
}

/// Rewrites site-relative asset URLs to absolute filesystem paths.
pub struct AssetRewriter {
    pattern: Regex,
    replacement: String,
}

impl AssetRewriter {
    /// `prefix` is the site URL prefix (`/assets/`), `assets_dir` the local
    /// directory it is served from.
    pub fn new(prefix: &str, assets_dir: &Path) -> Self {
        let pattern = Regex::new(&format!(
            r#"(?m)(^|[\s("'=])({})"#,
            regex::escape(prefix)
        ))
        .expect("escaped prefix is a valid pattern");

        let mut replacement = assets_dir.to_string_lossy().replace('\\', "/");
        if !replacement.ends_with('/') {
            replacement.push('/');
        }
        Self {
            pattern,
            replacement: replacement.replace(' ', "%20"),
        }
    }

    /// Replace every prefix occurrence that starts a URL. Fenced code is
    /// copied as written.
    pub fn rewrite(&self, markdown: &str) -> String {
        map_prose_lines(markdown, |line| {
            self.pattern
                .replace_all(line, |caps: &Captures| format!("{}{}", &caps[1], self.replacement))
        })
    }

    /// Whether `text` still holds a site-relative asset reference.
    pub fn has_relative(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}
