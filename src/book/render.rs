//! Markdown → HTML.

use pulldown_cmark::{Options, Parser, html};

/// Converts a Markdown document to an HTML fragment.
pub trait MarkdownRenderer: Sync {
    fn render(&self, markdown: &str) -> String;
}

/// CommonMark plus tables, footnotes, strikethrough and task lists.
#[derive(Debug, Default)]
pub struct PulldownRenderer;

impl MarkdownRenderer for PulldownRenderer {
    fn render(&self, markdown: &str) -> String {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS;
        let parser = Parser::new_ext(markdown, options);
        let mut out = String::new();
        html::push_html(&mut out, parser);
        out
    }
}
