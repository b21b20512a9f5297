//! Body content helpers: input-format decoding and the small HTML
//! post-processing passes the destination importer expects.

use regex::Regex;
use std::sync::LazyLock;

/// Drupal's excerpt separator. There is nowhere to put an excerpt in the
/// export, and left in place the marker can be misread as markdown.
pub const BREAK_MARKER: &str = "<!--break-->";

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[^>]*>").unwrap());
static PARAGRAPH_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</?p>").unwrap());

/// Convert a markdown body to HTML.
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = pulldown_cmark::Parser::new(markdown);
    let mut html = String::with_capacity(markdown.len() * 3 / 2);
    pulldown_cmark::html::push_html(&mut html, parser);
    html
}

/// Remove the first excerpt marker from a body, if present.
pub fn strip_break_marker(body: &str) -> String {
    body.replacen(BREAK_MARKER, "", 1)
}

/// Strip all markup tags, leaving plain text.
pub fn strip_tags(html: &str) -> String {
    TAG_RE.replace_all(html, "").into_owned()
}

/// Strip bare `<p>`/`</p>` marks. WordPress expects the raw HTML content of
/// its posts to use blank lines in place of paragraph elements, and the
/// decoded Drupal content uses `<p>` throughout.
pub fn strip_paragraph_tags(content: &str) -> String {
    PARAGRAPH_TAG_RE.replace_all(content, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_to_html() {
        let html = markdown_to_html("plain *emphasis* text");
        assert!(html.contains("<em>emphasis</em>"));
    }

    #[test]
    fn test_strip_break_marker_removes_first_only() {
        assert_eq!(
            strip_break_marker("intro<!--break-->rest<!--break-->"),
            "introrest<!--break-->"
        );
        assert_eq!(strip_break_marker("no marker"), "no marker");
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>Some <em>rich</em> text</p>"), "Some rich text");
        assert_eq!(strip_tags("bare text"), "bare text");
    }

    #[test]
    fn test_strip_paragraph_tags_leaves_other_markup() {
        assert_eq!(
            strip_paragraph_tags("<p>a <strong>b</strong></p>\n\n<P>c</P>"),
            "a <strong>b</strong>\n\nc"
        );
        // <p class="x"> is not a bare paragraph mark and survives
        assert_eq!(
            strip_paragraph_tags(r#"<p class="x">a</p>"#),
            r#"<p class="x">a"#
        );
    }
}
