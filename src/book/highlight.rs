//! Syntax highlighting of rendered code blocks.
//!
//! E-readers ignore scripts and most ship no highlighting of their own, so
//! colors are baked in as inline styles.

use super::xhtml::{self, Fragment};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("unknown highlight theme `{0}`")]
    UnknownTheme(String),
    #[error("highlighting failed: {0}")]
    Syntect(#[from] syntect::Error),
}

/// Highlights one code block.
pub trait CodeHighlighter: Sync {
    /// HTML replacing the whole `<pre>` block, or `None` to keep it as
    /// rendered.
    fn highlight(&self, code: &str, language: &str) -> Result<Option<String>, HighlightError>;
}

/// Highlighter backed by syntect's bundled syntaxes and themes.
pub struct SyntectHighlighter {
    syntaxes: SyntaxSet,
    theme: Theme,
}

impl SyntectHighlighter {
    pub fn new(theme_name: &str) -> Result<Self, HighlightError> {
        let theme = ThemeSet::load_defaults()
            .themes
            .remove(theme_name)
            .ok_or_else(|| HighlightError::UnknownTheme(theme_name.to_string()))?;
        Ok(Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            theme,
        })
    }
}

impl CodeHighlighter for SyntectHighlighter {
    fn highlight(&self, code: &str, language: &str) -> Result<Option<String>, HighlightError> {
        let Some(syntax) = self.syntaxes.find_syntax_by_token(language) else {
            return Ok(None);
        };
        Ok(Some(highlighted_html_for_string(
            code,
            &self.syntaxes,
            syntax,
            &self.theme,
        )?))
    }
}

/// Replace every `<pre><code class="language-X">` block in `fragment` with
/// the highlighter's markup. Blocks without a language are left alone.
pub fn highlight_code_blocks(
    fragment: &Fragment,
    highlighter: &dyn CodeHighlighter,
) -> Result<(), HighlightError> {
    for pre in fragment.elements("pre") {
        let children = pre.children();
        let [code] = children.as_slice() else {
            continue;
        };
        if !code.is("code") {
            continue;
        }
        let Some(language) = code
            .attr("class")
            .and_then(|class| class.strip_prefix("language-").map(str::to_string))
        else {
            continue;
        };
        if let Some(html) = highlighter.highlight(&code.text(), &language)? {
            xhtml::replace(&pre, Fragment::parse(&html).nodes());
        }
    }
    Ok(())
}
