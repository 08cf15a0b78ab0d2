//! HTML post-body extraction.
//!
//! Grounded in `xf_scraper/thread_scraper.go`'s manual `html.Node` walk: the
//! DESIGN NOTES call out that every CSS-selector-based attempt at excluding
//! quoted `<blockquote>` content failed, so this stays a deliberate
//! depth-first walk instead of a `scraper::Selector` query.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Node};

static WHITESPACE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]+\n").unwrap());
static REPEATED_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\n+").unwrap());

/// Extracts plain text from a post body element, discarding any
/// `<blockquote>` subtree (quoted material) and normalising whitespace.
pub fn extract_post_text(body: ElementRef) -> String {
    let mut out = String::new();
    collect_text(*body, &mut out);

    // U+00A0 -> regular space.
    let out = out.replace('\u{00a0}', " ");
    // Lines that are only whitespace between two newlines collapse away.
    let out = WHITESPACE_LINE.replace_all(&out, "\n");
    // Runs of blank lines collapse to one newline.
    let out = REPEATED_NEWLINES.replace_all(&out, "\n");

    out.trim_matches('\n').to_string()
}

fn collect_text(node: ego_tree::NodeRef<Node>, out: &mut String) {
    if let Node::Element(el) = node.value() {
        if el.name() == "blockquote" {
            return;
        }
    }
    if let Node::Text(text) = node.value() {
        out.push_str(text);
    }
    for child in node.children() {
        collect_text(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn body_from(html: &str) -> String {
        let doc = Html::parse_fragment(html);
        let sel = Selector::parse("div").unwrap();
        let body = doc.select(&sel).next().unwrap();
        extract_post_text(body)
    }

    #[test]
    fn strips_blockquote_and_collapses_newlines() {
        let html = "<div>KEEP\n\n\nME  <blockquote>QUOTED</blockquote></div>";
        assert_eq!(body_from(html), "KEEP\nME  ");
    }

    #[test]
    fn nested_blockquote_excluded() {
        let html = "<div>before<blockquote>outer<blockquote>inner</blockquote></blockquote>after</div>";
        assert_eq!(body_from(html), "beforeafter");
    }

    #[test]
    fn nbsp_replaced_with_space() {
        let html = "<div>a\u{00a0}b</div>";
        assert_eq!(body_from(html), "a b");
    }

    #[test]
    fn whitespace_only_lines_collapse() {
        let html = "<div>one\n   \ntwo</div>";
        assert_eq!(body_from(html), "one\ntwo");
    }

    #[test]
    fn leading_and_trailing_newlines_trimmed() {
        let html = "<div>\n\ntext\n\n</div>";
        assert_eq!(body_from(html), "text");
    }
}
