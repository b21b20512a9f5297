//! Source site access
//!
//! `DrupalSource` wraps a loaded snapshot and precomputes every lookup the
//! conversion needs (URL aliases in both directions, files by storage path,
//! user names, tag names, which input formats are markdown or textile) so
//! the per-node work never scans the snapshot. All of it is read-only once
//! constructed; only the id counters and the output stream mutate during a
//! run.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use url::Url;

use crate::comments::{Comment, FlatComment, build_forest};
use crate::content;
use crate::error::{ConvertError, Result};
use crate::import::{CommentImport, IMPORTED_COMMENT_SUBJECT};
use crate::records::{CommentRecord, FileRecord, NodeRecord, NodeRevisionRecord, Snapshot};
use crate::report::ConversionLog;
use crate::resolver::escape_path;

/// A fully decoded node, ready to stream.
#[derive(Debug)]
pub struct Node {
    pub nid: i64,
    pub title: String,
    /// The `node/<nid>` path every node answers to.
    pub canonical_path: String,
    /// Where the node lived on the source site: its alias
    /// (percent-escaped) if one is registered, else the canonical path.
    pub source_path: String,
    /// The post name after import: the alias unchanged, or the canonical
    /// path with '/' flattened to '-' (WordPress forbids '/' in post names).
    pub post_name: String,
    pub created: DateTime<Utc>,
    pub creator: String,
    pub tags: Vec<String>,
    pub content: String,
    pub is_published: bool,
    pub is_page: bool,
    pub root_comments: Vec<Comment>,
    pub attachments: Vec<Attachment>,
}

/// A file attached to a node's current revision.
#[derive(Debug)]
pub struct Attachment {
    pub fid: i64,
    pub filename: String,
    pub filepath: String,
    pub mime_type: String,
    pub size: i64,
    pub is_visible: bool,
    pub description: String,
}

/// A category declaration derived from a non-tag taxonomy vocabulary term.
#[derive(Debug, Clone)]
pub struct Category {
    pub nicename: String,
    pub name: String,
    pub description: Option<String>,
    pub parent: Option<String>,
}

pub struct DrupalSource {
    snapshot: Snapshot,
    base_url: Url,
    /// canonical path -> percent-escaped alias
    aliases: HashMap<String, String>,
    /// alias path -> percent-escaped canonical path
    alias_sources: HashMap<String, String>,
    users: HashMap<i64, String>,
    /// literal (unescaped) storage path -> file row
    files: HashMap<String, FileRecord>,
    /// tid -> tag name, ordered by tid for deterministic enumeration
    tags: BTreeMap<i64, String>,
    markdown_formats: Vec<i64>,
    textile_formats: Vec<i64>,
    comment_import: CommentImport,
}

impl DrupalSource {
    pub fn new(snapshot: Snapshot, base_url: &Url, comment_import: CommentImport) -> Self {
        // Aliases in the source carry no leading slash, so joining them
        // needs the base path to end in one
        let mut base_url = base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut aliases = HashMap::new();
        let mut alias_sources = HashMap::new();
        for alias in &snapshot.url_aliases {
            aliases.insert(alias.src.clone(), escape_path(&alias.dst));
            alias_sources.insert(alias.dst.clone(), escape_path(&alias.src));
        }

        let users = snapshot
            .users
            .iter()
            .map(|u| (u.uid, u.name.clone()))
            .collect();

        let files = snapshot
            .files
            .iter()
            .map(|f| (f.filepath.clone(), f.clone()))
            .collect();

        // Tags are the terms of the free-tagging taxonomy vocabulary
        let tag_vids: Vec<i64> = snapshot
            .vocabularies
            .iter()
            .filter(|v| v.module == "taxonomy" && v.tags == 1)
            .map(|v| v.vid)
            .collect();
        let tags = snapshot
            .term_data
            .iter()
            .filter(|t| tag_vids.contains(&t.vid))
            .map(|t| (t.tid, t.name.clone()))
            .collect();

        let markdown_formats = formats_for_module(&snapshot, "marksmarty");
        let textile_formats = formats_for_module(&snapshot, "textile");

        Self {
            snapshot,
            base_url,
            aliases,
            alias_sources,
            users,
            files,
            tags,
            markdown_formats,
            textile_formats,
            comment_import,
        }
    }

    /// The site base URL, path normalized to a trailing slash.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn nodes(&self) -> &[NodeRecord] {
        &self.snapshot.nodes
    }

    pub fn num_nodes(&self) -> usize {
        self.snapshot.nodes.len()
    }

    pub fn node_exists(&self, nid: i64) -> bool {
        self.snapshot.nodes.iter().any(|n| n.nid == nid)
    }

    /// The registered (escaped) alias for a canonical path.
    pub fn alias_for(&self, canonical_path: &str) -> Option<&str> {
        self.aliases.get(canonical_path).map(String::as_str)
    }

    /// Whether `path` is the destination of a registered alias.
    pub fn is_alias_target(&self, path: &str) -> bool {
        self.alias_sources.contains_key(path)
    }

    /// Whether a file attachment is stored at the literal `path`.
    pub fn has_file_at(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Site title: name, with the slogan appended when one is set.
    pub fn title(&self) -> String {
        match &self.snapshot.site.slogan {
            Some(slogan) => format!("{} - {}", self.snapshot.site.name, slogan),
            None => self.snapshot.site.name.clone(),
        }
    }

    pub fn description(&self) -> String {
        self.snapshot.site.mission.clone().unwrap_or_default()
    }

    /// The most recent node creation time, which stands in for the site's
    /// publication date.
    pub fn pub_date(&self) -> Option<DateTime<Utc>> {
        self.snapshot
            .nodes
            .iter()
            .map(|n| n.created)
            .max()
            .map(timestamp)
    }

    pub fn default_locale(&self) -> String {
        self.snapshot
            .site
            .default_locale
            .clone()
            .unwrap_or_else(|| "en".to_string())
    }

    /// Tag names in tid order.
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags.values().map(String::as_str)
    }

    /// Categories: terms of taxonomy vocabularies that are not free-tagging.
    /// The term tables carry no hierarchy, so parents are always empty.
    pub fn categories(&self) -> Vec<Category> {
        let category_vids: Vec<i64> = self
            .snapshot
            .vocabularies
            .iter()
            .filter(|v| v.module == "taxonomy" && v.tags == 0)
            .map(|v| v.vid)
            .collect();

        self.snapshot
            .term_data
            .iter()
            .filter(|t| category_vids.contains(&t.vid))
            .map(|t| Category {
                nicename: slugify(&t.name),
                name: t.name.clone(),
                description: if t.description.is_empty() {
                    None
                } else {
                    Some(t.description.clone())
                },
                parent: None,
            })
            .collect()
    }

    /// Decode a node record into everything the writer needs: resolved
    /// paths, decoded body, reply forest, and attachments.
    pub fn decode_node(&self, record: &NodeRecord, log: &mut ConversionLog) -> Result<Node> {
        let canonical_path = format!("node/{}", record.nid);
        let source_path = self
            .alias_for(&canonical_path)
            .map(str::to_string)
            .unwrap_or_else(|| canonical_path.clone());
        let post_name = if source_path == canonical_path {
            canonical_path.replace('/', "-")
        } else {
            source_path.clone()
        };

        let creator = self.users.get(&record.uid).cloned().ok_or_else(|| {
            ConvertError::Defect(format!(
                "node {} references unknown user {}",
                record.nid, record.uid
            ))
        })?;

        let tags = self
            .snapshot
            .term_node
            .iter()
            .filter(|tn| tn.nid == record.nid)
            .filter_map(|tn| self.tags.get(&tn.tid).cloned())
            .collect();

        let revision = self
            .latest_revision(record.nid)
            .ok_or(ConvertError::MissingRevision { nid: record.nid })?;
        let body = content::strip_break_marker(&revision.body);
        let content = self.decode_format(revision.format, &body, log);

        let root_comments = self.node_comments(record.nid, &source_path, log);
        let attachments = self.node_attachments(revision)?;

        Ok(Node {
            nid: record.nid,
            title: record.title.clone(),
            canonical_path,
            source_path,
            post_name,
            created: timestamp(record.created),
            creator,
            tags,
            content,
            is_published: record.status == 1,
            is_page: record.node_type == "page",
            root_comments,
            attachments,
        })
    }

    fn latest_revision(&self, nid: i64) -> Option<&NodeRevisionRecord> {
        self.snapshot
            .node_revisions
            .iter()
            .filter(|r| r.nid == nid)
            .max_by_key(|r| r.vid)
    }

    /// Translate a body through its input format. Markdown converts to
    /// HTML; textile has no converter here, so the body migrates undecoded
    /// with a warning; anything else passes through verbatim.
    fn decode_format(&self, format: i64, body: &str, log: &mut ConversionLog) -> String {
        if self.markdown_formats.contains(&format) {
            content::markdown_to_html(body)
        } else if self.textile_formats.contains(&format) {
            log.warning(format!(
                "Content uses textile format {format}, which has no converter. Undecoded content will be migrated instead"
            ));
            body.to_string()
        } else {
            body.to_string()
        }
    }

    /// Reconstruct the node's reply forest from its flat comment rows, then
    /// append any imported comments registered for the node's source URL.
    fn node_comments(&self, nid: i64, source_path: &str, log: &mut ConversionLog) -> Vec<Comment> {
        let flat: Vec<FlatComment> = self
            .snapshot
            .comments
            .iter()
            .filter(|c| c.nid == nid)
            .map(|c| FlatComment {
                cid: c.cid,
                pid: c.pid,
                comment: self.decode_comment(c, log),
            })
            .collect();

        let imported = self
            .base_url
            .join(source_path)
            .ok()
            .and_then(|article_url| self.comment_import.get(article_url.as_str()).cloned())
            .unwrap_or_default();

        let outcome = build_forest(flat, imported, IMPORTED_COMMENT_SUBJECT);
        if !outcome.unattached.is_empty() {
            log.warning(format!(
                "Comments {:?} on node {nid} have a broken parent chain (missing parent or cycle) and were not migrated",
                outcome.unattached
            ));
        }
        outcome.roots
    }

    fn decode_comment(&self, record: &CommentRecord, log: &mut ConversionLog) -> Comment {
        Comment {
            cid: Some(record.cid),
            subject: Some(record.subject.clone()),
            body: self.decode_format(record.format, &record.comment, log),
            hostname: record.hostname.clone(),
            timestamp: timestamp(record.timestamp),
            // Drupal 6: comment status 0 means published
            is_published: record.status == 0,
            poster_name: record.name.clone(),
            poster_email: record.mail.clone(),
            poster_url: record.homepage.clone(),
            replies: Vec::new(),
        }
    }

    /// Attachments are the uploads of the node's current revision, in row
    /// order. An upload row referencing a missing file is a snapshot
    /// integrity violation, not a per-node condition.
    fn node_attachments(&self, revision: &NodeRevisionRecord) -> Result<Vec<Attachment>> {
        self.snapshot
            .uploads
            .iter()
            .filter(|u| u.vid == revision.vid)
            .map(|u| {
                let file = self
                    .snapshot
                    .files
                    .iter()
                    .find(|f| f.fid == u.fid)
                    .ok_or_else(|| {
                        ConvertError::Defect(format!(
                            "upload on revision {} references unknown file {}",
                            u.vid, u.fid
                        ))
                    })?;
                Ok(Attachment {
                    fid: u.fid,
                    filename: file.filename.clone(),
                    filepath: file.filepath.clone(),
                    mime_type: file.filemime.clone(),
                    size: file.filesize,
                    is_visible: u.list == 1,
                    description: u.description.clone(),
                })
            })
            .collect()
    }
}

fn formats_for_module(snapshot: &Snapshot, module: &str) -> Vec<i64> {
    snapshot
        .filters
        .iter()
        .filter(|f| f.module == module)
        .map(|f| f.format)
        .collect()
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::*;

    fn base() -> Url {
        Url::parse("http://example.org").unwrap()
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            site: SiteRecord {
                name: "Example".to_string(),
                slogan: Some("a site".to_string()),
                mission: Some("our mission".to_string()),
                default_locale: None,
            },
            nodes: vec![
                NodeRecord {
                    nid: 1,
                    uid: 3,
                    node_type: "page".to_string(),
                    title: "About".to_string(),
                    status: 1,
                    created: 1_200_000_000,
                },
                NodeRecord {
                    nid: 2,
                    uid: 3,
                    node_type: "blog".to_string(),
                    title: "Post".to_string(),
                    status: 0,
                    created: 1_205_000_000,
                },
            ],
            node_revisions: vec![
                NodeRevisionRecord {
                    nid: 1,
                    vid: 10,
                    body: "old".to_string(),
                    format: 1,
                },
                NodeRevisionRecord {
                    nid: 1,
                    vid: 11,
                    body: "about us<!--break-->more".to_string(),
                    format: 1,
                },
                NodeRevisionRecord {
                    nid: 2,
                    vid: 12,
                    body: "*hello*".to_string(),
                    format: 5,
                },
            ],
            users: vec![UserRecord {
                uid: 3,
                name: "admin".to_string(),
            }],
            url_aliases: vec![UrlAliasRecord {
                src: "node/1".to_string(),
                dst: "about".to_string(),
            }],
            vocabularies: vec![
                VocabularyRecord {
                    vid: 1,
                    name: "Tags".to_string(),
                    module: "taxonomy".to_string(),
                    tags: 1,
                },
                VocabularyRecord {
                    vid: 2,
                    name: "Sections".to_string(),
                    module: "taxonomy".to_string(),
                    tags: 0,
                },
            ],
            term_data: vec![
                TermRecord {
                    tid: 7,
                    vid: 1,
                    name: "rust".to_string(),
                    description: String::new(),
                },
                TermRecord {
                    tid: 8,
                    vid: 2,
                    name: "Site News".to_string(),
                    description: "news about the site".to_string(),
                },
            ],
            term_node: vec![TermNodeRecord { tid: 7, nid: 2 }],
            filters: vec![FilterRecord {
                format: 5,
                module: "marksmarty".to_string(),
            }],
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_base_url_gains_trailing_slash() {
        let source = DrupalSource::new(snapshot(), &base(), CommentImport::new());
        assert_eq!(source.base_url().as_str(), "http://example.org/");
    }

    #[test]
    fn test_alias_caches_both_directions() {
        let source = DrupalSource::new(snapshot(), &base(), CommentImport::new());
        assert_eq!(source.alias_for("node/1"), Some("about"));
        assert!(source.is_alias_target("about"));
        assert!(!source.is_alias_target("node/1"));
    }

    #[test]
    fn test_decode_node_prefers_alias_and_keeps_canonical() {
        let source = DrupalSource::new(snapshot(), &base(), CommentImport::new());
        let mut log = ConversionLog::new();
        let node = source.decode_node(&source.nodes()[0].clone(), &mut log).unwrap();
        assert_eq!(node.canonical_path, "node/1");
        assert_eq!(node.source_path, "about");
        assert_eq!(node.post_name, "about");
        assert!(node.is_page);
        assert!(node.is_published);
        assert_eq!(node.creator, "admin");
    }

    #[test]
    fn test_decode_node_without_alias_flattens_post_name() {
        let source = DrupalSource::new(snapshot(), &base(), CommentImport::new());
        let mut log = ConversionLog::new();
        let node = source.decode_node(&source.nodes()[1].clone(), &mut log).unwrap();
        assert_eq!(node.source_path, "node/2");
        assert_eq!(node.post_name, "node-2");
        assert!(!node.is_page);
        assert!(!node.is_published);
        assert_eq!(node.tags, vec!["rust".to_string()]);
    }

    #[test]
    fn test_latest_revision_wins_and_break_marker_stripped() {
        let source = DrupalSource::new(snapshot(), &base(), CommentImport::new());
        let mut log = ConversionLog::new();
        let node = source.decode_node(&source.nodes()[0].clone(), &mut log).unwrap();
        assert_eq!(node.content, "about usmore");
    }

    #[test]
    fn test_markdown_format_is_decoded() {
        let source = DrupalSource::new(snapshot(), &base(), CommentImport::new());
        let mut log = ConversionLog::new();
        let node = source.decode_node(&source.nodes()[1].clone(), &mut log).unwrap();
        assert!(node.content.contains("<em>hello</em>"));
    }

    #[test]
    fn test_missing_revision_is_recoverable_error() {
        let mut snap = snapshot();
        snap.node_revisions.clear();
        let source = DrupalSource::new(snap, &base(), CommentImport::new());
        let mut log = ConversionLog::new();
        let record = source.nodes()[0].clone();
        let err = source.decode_node(&record, &mut log).unwrap_err();
        assert!(matches!(err, ConvertError::MissingRevision { nid: 1 }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_unknown_user_is_a_defect() {
        let mut snap = snapshot();
        snap.users.clear();
        let source = DrupalSource::new(snap, &base(), CommentImport::new());
        let mut log = ConversionLog::new();
        let record = source.nodes()[0].clone();
        let err = source.decode_node(&record, &mut log).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_site_metadata() {
        let source = DrupalSource::new(snapshot(), &base(), CommentImport::new());
        assert_eq!(source.title(), "Example - a site");
        assert_eq!(source.description(), "our mission");
        assert_eq!(source.default_locale(), "en");
        assert_eq!(source.pub_date().unwrap(), timestamp(1_205_000_000));
    }

    #[test]
    fn test_categories_come_from_non_tag_vocabularies() {
        let source = DrupalSource::new(snapshot(), &base(), CommentImport::new());
        let categories = source.categories();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].nicename, "site-news");
        assert_eq!(categories[0].name, "Site News");
        assert_eq!(categories[0].description.as_deref(), Some("news about the site"));
    }

    #[test]
    fn test_tag_names_ordered_by_tid() {
        let mut snap = snapshot();
        snap.term_data.push(TermRecord {
            tid: 3,
            vid: 1,
            name: "ада".to_string(),
            description: String::new(),
        });
        let source = DrupalSource::new(snap, &base(), CommentImport::new());
        let names: Vec<&str> = source.tag_names().collect();
        assert_eq!(names, vec!["ада", "rust"]);
    }
}
