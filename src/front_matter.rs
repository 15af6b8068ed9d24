//! YAML front-matter parsing.
//!
//! A post starts with a YAML block fenced by `---` lines:
//!
//! ```text
//! ---
//! title: Getting Started
//! slug: getting-started
//! description: First steps
//! homeImage: /assets/img/home/start.png
//! date: 2024-01-01
//! ---
//! ## Install
//! ...
//! ```
//!
//! Only `title`, `slug`, `description` and `homeImage` are read; every other
//! key is ignored. `title` and `slug` are required.

use serde_yaml::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("front-matter block is not closed by a `---` line")]
    Unterminated,
    #[error("invalid YAML in front-matter: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("front-matter must be a mapping of keys to values")]
    NotAMapping,
    #[error("missing required front-matter field `{0}`")]
    MissingField(&'static str),
    #[error("slug `{0}` cannot be used as a file name")]
    InvalidSlug(String),
}

/// Recognized front-matter values. Absent optional keys are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub home_image: String,
}

/// Split a document into its raw YAML block (if any) and body.
///
/// A document that does not open with a `---` line has no front-matter and
/// its whole text is the body.
pub fn split(source: &str) -> Result<(Option<&str>, &str), FrontMatterError> {
    let text = source.strip_prefix('\u{feff}').unwrap_or(source);

    let Some(rest) = strip_delimiter_line(text) else {
        return Ok((None, text));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok((Some(yaml), body));
        }
        offset += line.len();
    }
    Err(FrontMatterError::Unterminated)
}

fn strip_delimiter_line(text: &str) -> Option<&str> {
    let first_end = text.find('\n').map(|i| i + 1).unwrap_or(text.len());
    (text[..first_end].trim_end() == "---").then(|| &text[first_end..])
}

/// Parse a document into its front-matter fields and body.
pub fn parse(source: &str) -> Result<(FrontMatter, &str), FrontMatterError> {
    let (yaml, body) = split(source)?;
    let fields = match yaml {
        Some(yaml) => parse_fields(yaml)?,
        None => BTreeMap::new(),
    };

    let required = |key: &'static str| -> Result<String, FrontMatterError> {
        fields
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(FrontMatterError::MissingField(key))
    };
    let optional = |key: &str| fields.get(key).cloned().unwrap_or_default();

    let front_matter = FrontMatter {
        title: required("title")?,
        slug: required("slug")?,
        description: optional("description"),
        home_image: optional("homeImage"),
    };
    validate_slug(&front_matter.slug)?;
    Ok((front_matter, body))
}

/// Top-level keys with scalar values, rendered as strings.
fn parse_fields(yaml: &str) -> Result<BTreeMap<String, String>, FrontMatterError> {
    if yaml.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let value: Value = serde_yaml::from_str(yaml)?;
    let mapping = match value {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Ok(BTreeMap::new()),
        _ => return Err(FrontMatterError::NotAMapping),
    };

    Ok(mapping
        .into_iter()
        .filter_map(|(key, value)| {
            let key = key.as_str()?.to_string();
            scalar_to_string(value).map(|v| (key, v))
        })
        .collect())
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn validate_slug(slug: &str) -> Result<(), FrontMatterError> {
    if slug == "." || slug == ".." || slug.contains(['/', '\\']) {
        return Err(FrontMatterError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}
