//! Chapter splitting and the closing chapter.

use super::xhtml::{self, Fragment, Handle};
use crate::config::SignoffConfig;
use crate::types::Chapter;
use maud::html;

/// Title of the closing chapter.
pub const SIGNOFF_TITLE: &str = "Thank you";

/// Split a rendered body into one chapter per top-level `<h1>`.
///
/// Content before the first heading is kept at the top of the first chapter.
/// A body without any `<h1>` becomes a single chapter titled
/// `fallback_title`; a blank body yields no chapters. Chapter data is XHTML.
pub fn split_chapters(fragment: &Fragment, fallback_title: &str) -> Vec<Chapter> {
    let mut preamble: Vec<Handle> = Vec::new();
    let mut sections: Vec<(String, Vec<Handle>)> = Vec::new();

    for node in fragment.nodes() {
        if node.is("h1") {
            let title = heading_text(&node.text());
            let title = if title.is_empty() {
                fallback_title.to_string()
            } else {
                title
            };
            let body = if sections.is_empty() {
                std::mem::take(&mut preamble)
            } else {
                Vec::new()
            };
            sections.push((title, body));
        } else if let Some((_, body)) = sections.last_mut() {
            body.push(node);
        } else {
            preamble.push(node);
        }
    }

    if sections.is_empty() {
        if preamble.iter().all(|node| node.is_blank()) {
            return Vec::new();
        }
        sections.push((fallback_title.to_string(), preamble));
    }

    sections
        .into_iter()
        .map(|(title, body)| Chapter {
            title,
            data: xhtml::write_xhtml(&body).trim().to_string(),
        })
        .collect()
}

/// Heading text with runs of whitespace collapsed.
fn heading_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The closing "Thank you" chapter appended to every book.
pub fn signoff(book_title: &str, author: &str, links: &SignoffConfig) -> Chapter {
    let site_name = links
        .site_url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');

    let markup = html! {
        p { "Thank you for purchasing this guide. I hope it has helped you get started with " (book_title) "!" }
        @if !links.site_url.is_empty() {
            p { "Please be sure to check " a href=(links.site_url) { (site_name) } " for more guides." }
        }
        @if !links.contact_email.is_empty() {
            p {
                "If you have feedback or ideas to share, you can reach me anytime at "
                a href={ "mailto:" (links.contact_email) } { (links.contact_email) }
                "."
            }
        }
        @if !author.is_empty() {
            p { "Many thanks," }
            p {
                (author)
                @if !links.site_url.is_empty() {
                    br;
                    a href=(links.site_url) { (site_name) }
                }
            }
        }
    };

    Chapter {
        title: SIGNOFF_TITLE.to_string(),
        data: xhtml::to_xhtml(&markup.into_string()),
    }
}
