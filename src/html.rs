//! Link target extraction from HTML bodies
//!
//! Finds `<a href>` and `<img src>` occurrences with regex capture groups
//! and rewrites the attribute value in place. Only the value between the
//! quotes changes; every other byte of the body is preserved, so decoded
//! content never picks up incidental reserialization differences.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static A_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)(<a\b[^>]*?\bhref\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).unwrap()
});
static IMG_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)(<img\b[^>]*?\bsrc\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Rewrite every anchor href and image src in `html` through `rewrite`.
/// The original quote style is kept.
pub fn rewrite_link_targets<F>(html: &str, mut rewrite: F) -> String
where
    F: FnMut(&str) -> String,
{
    let anchors_done = rewrite_pass(&A_HREF_RE, html, &mut rewrite);
    rewrite_pass(&IMG_SRC_RE, &anchors_done, &mut rewrite)
}

fn rewrite_pass<F>(re: &Regex, input: &str, rewrite: &mut F) -> String
where
    F: FnMut(&str) -> String,
{
    re.replace_all(input, |caps: &Captures| {
        let (value, quote) = match caps.get(2) {
            Some(m) => (m.as_str(), '"'),
            None => (&caps[3], '\''),
        };
        format!("{}{}{}{}", &caps[1], quote, rewrite(value), quote)
    })
    .into_owned()
}
