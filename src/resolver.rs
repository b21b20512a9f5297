//! Internal link resolution and rewriting
//!
//! Every hyperlink and image reference found in migrated content is
//! classified against the site structure: a link is external, a reference to
//! another migrated object (node, alias, or file attachment), or broken.
//! Internal references are then rewritten into the destination's naming
//! scheme; broken ones are reported and left untouched.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::error::{ConvertError, Result};
use crate::report::ConversionLog;
use crate::source::DrupalSource;

static NODE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^node/(\d+)$").unwrap());
static NODE_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"node/(\d+)$").unwrap());

/// The outcome of resolving one candidate URL. Exactly one classification
/// applies; internal variants carry the absolute URL of the target object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedLink {
    /// Not on this site at all; passed through verbatim.
    External,
    /// A node, addressed by canonical `node/<id>` path (or the site root).
    /// The carried URL prefers the node's registered alias.
    Item(Url),
    /// A registered URL alias, addressed by its alias path.
    Alias(Url),
    /// A file attachment, addressed by its storage path.
    File(Url),
    /// Looks internal but no migrated object lives at that path.
    NotFound,
}

/// Classifies candidate URLs against the precomputed site caches.
/// Deterministic and side-effect-free: the caches are frozen before the
/// node loop starts.
pub struct UrlResolver<'a> {
    source: &'a DrupalSource,
}

impl<'a> UrlResolver<'a> {
    pub fn new(source: &'a DrupalSource) -> Self {
        Self { source }
    }

    pub fn base_url(&self) -> &Url {
        self.source.base_url()
    }

    /// Resolve `candidate` as found in a page living at `context_url`.
    ///
    /// Lookup order matters: a `node/<id>` path is resolved as a node even
    /// if an alias or file happens to collide with it.
    pub fn resolve(&self, context_url: &Url, candidate: &str) -> Result<ResolvedLink> {
        let Some(rel) = self.path_relative_to_base(context_url, candidate)? else {
            return Ok(ResolvedLink::External);
        };

        let base = self.source.base_url();
        if let Some(caps) = NODE_PATH_RE.captures(&rel) {
            // An id too large to parse cannot name an existing node
            let Ok(nid) = caps[1].parse::<i64>() else {
                return Ok(ResolvedLink::NotFound);
            };
            if !self.source.node_exists(nid) {
                return Ok(ResolvedLink::NotFound);
            }
            // A registered alias is the node's real address; the canonical
            // path is only the fallback
            let path = self.source.alias_for(&rel).unwrap_or(&rel);
            return Ok(ResolvedLink::Item(self.join_base(path)?));
        }

        if self.source.is_alias_target(&rel) {
            return Ok(ResolvedLink::Alias(self.join_base(&rel)?));
        }

        // File storage paths are kept unescaped in the source, but links to
        // them may be escaped
        if self.source.has_file_at(&cgi_unescape(&rel)) {
            return Ok(ResolvedLink::File(self.join_base(&rel)?));
        }

        if rel.is_empty() {
            return Ok(ResolvedLink::Item(base.clone()));
        }

        Ok(ResolvedLink::NotFound)
    }

    /// Fully qualify `candidate` (joining relative URLs against
    /// `context_url`) and return its path relative to the site base URL, or
    /// None when the URL lives somewhere else entirely. Scheme, credentials,
    /// host, port, and path prefix must all match the base.
    fn path_relative_to_base(&self, context_url: &Url, candidate: &str) -> Result<Option<String>> {
        let absolute = match Url::parse(candidate) {
            Ok(parsed) => parsed,
            Err(url::ParseError::RelativeUrlWithoutBase) => context_url
                .join(candidate)
                .map_err(|source| ConvertError::InvalidUrl {
                    url: candidate.to_string(),
                    source,
                })?,
            Err(source) => {
                return Err(ConvertError::InvalidUrl {
                    url: candidate.to_string(),
                    source,
                });
            }
        };

        let base = self.source.base_url();
        let same_site = absolute.scheme() == base.scheme()
            && absolute.username() == base.username()
            && absolute.password() == base.password()
            && absolute.host_str() == base.host_str()
            && absolute.port_or_known_default() == base.port_or_known_default()
            && absolute.path().starts_with(base.path());

        if same_site {
            Ok(Some(absolute.path()[base.path().len()..].to_string()))
        } else {
            Ok(None)
        }
    }

    fn join_base(&self, path: &str) -> Result<Url> {
        self.source.base_url().join(path).map_err(|e| {
            ConvertError::Defect(format!("cached path '{path}' does not join the base URL: {e}"))
        })
    }
}

/// Per-node inputs for link rewriting.
pub struct LinkContext {
    /// Where the page lived on the source site; relative links in its body
    /// resolve against this.
    pub source_url: Url,
    /// Where the page will live after import; rewritten links are computed
    /// relative to this.
    pub dest_url: Url,
    /// The owning node's creation time, which determines the destination's
    /// uploads directory for file links.
    pub created: chrono::DateTime<chrono::Utc>,
}

/// Resolve one candidate link found in a node body and return the text to
/// emit in its place. Unresolvable or malformed links warn and keep their
/// original text; nothing is ever removed or emptied.
pub fn rewrite_link(
    resolver: &UrlResolver,
    ctx: &LinkContext,
    link: &str,
    log: &mut ConversionLog,
) -> String {
    // Drupal tolerates raw spaces in hrefs; a URL parser does not
    let cleaned = link.replace(' ', "+");

    let rewritten = match resolver.resolve(&ctx.source_url, &cleaned) {
        Err(err @ ConvertError::InvalidUrl { .. }) => {
            log.warning(format!("Link '{cleaned}' is not a valid URL"));
            tracing::debug!("{err}");
            cleaned.clone()
        }
        Err(err) => {
            // Defects from cache joins; surface loudly but keep the link
            log.error(format!("Link '{cleaned}' could not be resolved: {err}"));
            cleaned.clone()
        }
        Ok(ResolvedLink::External) => cleaned.clone(),
        Ok(ResolvedLink::NotFound) => {
            log.warning(format!(
                "Link '{cleaned}' looks like an internal site link but it doesn't correspond to any Drupal content"
            ));
            cleaned.clone()
        }
        Ok(ResolvedLink::Item(target)) | Ok(ResolvedLink::Alias(target)) => {
            relative_to_destination(&ctx.dest_url, &target)
        }
        Ok(ResolvedLink::File(target)) => {
            match uploads_url(resolver.base_url(), &target, &ctx.created) {
                Some(dest_file) => relative_to_destination(&ctx.dest_url, &dest_file),
                None => {
                    log.warning(format!(
                        "Link '{cleaned}' points to a file attachment with no usable filename"
                    ));
                    cleaned.clone()
                }
            }
        }
    };

    if rewritten != cleaned {
        tracing::trace!("Changed link '{cleaned}' to '{rewritten}'");
    }
    rewritten
}

/// Express `target` relative to the node's destination URL, flattening a
/// trailing `node/<id>` path into the hyphenated post name WordPress will
/// use (post names cannot contain '/').
fn relative_to_destination(dest_url: &Url, target: &Url) -> String {
    let relative = dest_url
        .make_relative(target)
        .unwrap_or_else(|| target.to_string());
    NODE_SUFFIX_RE.replace(&relative, "node-$1").into_owned()
}

/// Map a source file attachment URL onto the destination's uploads
/// directory, dated by the owning node's creation time.
fn uploads_url(base: &Url, target: &Url, created: &chrono::DateTime<chrono::Utc>) -> Option<Url> {
    use chrono::Datelike;
    let basename = target.path_segments()?.next_back()?.to_string();
    if basename.is_empty() {
        return None;
    }
    let path = format!(
        "wp-content/uploads/{:04}/{:02}/{}",
        created.year(),
        created.month(),
        basename
    );
    base.join(&path).ok()
}

/// Escape a site-relative path the way alias caches store them: each
/// segment percent-encoded, separators preserved.
pub(crate) fn escape_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Undo CGI-style escaping: '+' means space, then percent-decode. File
/// storage paths are never escaped in the source, but links to them are.
pub(crate) fn cgi_unescape(path: &str) -> String {
    let plus_decoded = path.replace('+', " ");
    match urlencoding::decode(&plus_decoded) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => plus_decoded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_path_preserves_separators() {
        assert_eq!(escape_path("about/the team"), "about/the%20team");
        assert_eq!(escape_path("plain"), "plain");
    }

    #[test]
    fn test_cgi_unescape() {
        assert_eq!(cgi_unescape("files/some+image.png"), "files/some image.png");
        assert_eq!(cgi_unescape("files/a%20b.png"), "files/a b.png");
        assert_eq!(cgi_unescape("files/plain.png"), "files/plain.png");
    }

    #[test]
    fn test_relative_to_destination_flattens_node_paths() {
        let dest = Url::parse("http://example.org/about").unwrap();
        let target = Url::parse("http://example.org/node/2").unwrap();
        assert_eq!(relative_to_destination(&dest, &target), "node-2");
    }

    #[test]
    fn test_relative_to_destination_plain_alias() {
        let dest = Url::parse("http://example.org/node-2").unwrap();
        let target = Url::parse("http://example.org/about").unwrap();
        assert_eq!(relative_to_destination(&dest, &target), "about");
    }

    #[test]
    fn test_uploads_url_uses_owning_node_date() {
        let base = Url::parse("http://example.org/").unwrap();
        let target = Url::parse("http://example.org/files/photo.jpg").unwrap();
        let created = chrono::DateTime::from_timestamp(1_205_000_000, 0).unwrap(); // 2008-03
        let url = uploads_url(&base, &target, &created).unwrap();
        assert_eq!(
            url.as_str(),
            "http://example.org/wp-content/uploads/2008/03/photo.jpg"
        );
    }
}
