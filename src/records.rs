//! Source snapshot records
//!
//! Plain-data rows extracted from a Drupal 6 database, deserialized from a
//! TOML snapshot file. Field names match the Drupal table columns so that a
//! snapshot can be produced with a straightforward SQL dump. The records
//! carry no behavior; everything interesting happens in `source`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Site-wide settings. Drupal keeps these in the `variable` table as
/// PHP-serialized values; the snapshot carries them already unpacked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteRecord {
    pub name: String,
    #[serde(default)]
    pub slogan: Option<String>,
    #[serde(default)]
    pub mission: Option<String>,
    #[serde(default)]
    pub default_locale: Option<String>,
}

/// A row from the `node` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub nid: i64,
    pub uid: i64,
    /// Content type machine name ("page", "blog", "story", ...).
    #[serde(rename = "type")]
    pub node_type: String,
    pub title: String,
    /// 1 = published.
    pub status: i64,
    /// Unix timestamp.
    pub created: i64,
}

/// A row from the `node_revisions` table. The highest `vid` for a node is
/// its current revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRevisionRecord {
    pub nid: i64,
    pub vid: i64,
    pub body: String,
    /// Input format id, resolved against `filters`.
    pub format: i64,
}

/// A row from the `comments` table. `pid` = 0 marks a root comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub cid: i64,
    pub nid: i64,
    pub pid: i64,
    pub subject: String,
    pub comment: String,
    pub hostname: String,
    /// Unix timestamp.
    pub timestamp: i64,
    /// 0 = published (Drupal 6 inverts the node convention here).
    pub status: i64,
    pub format: i64,
    pub name: String,
    #[serde(default)]
    pub mail: String,
    #[serde(default)]
    pub homepage: String,
}

/// A row from the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub uid: i64,
    pub name: String,
}

/// A row from the `files` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub fid: i64,
    pub filename: String,
    /// Site-relative storage path, unescaped, e.g. "files/some image.png".
    pub filepath: String,
    pub filemime: String,
    pub filesize: i64,
}

/// A row from the `upload` table, attaching a file to a node revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecord {
    pub fid: i64,
    pub vid: i64,
    #[serde(default)]
    pub description: String,
    /// 1 = listed on the node page.
    pub list: i64,
}

/// A row from the `url_alias` table: `src` is the canonical path
/// ("node/12"), `dst` the human-assigned alias ("about").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlAliasRecord {
    pub src: String,
    pub dst: String,
}

/// A row from the `vocabulary` table. `tags` = 1 marks a free-tagging
/// vocabulary; taxonomy vocabularies with `tags` = 0 become categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyRecord {
    pub vid: i64,
    pub name: String,
    pub module: String,
    pub tags: i64,
}

/// A row from the `term_data` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermRecord {
    pub tid: i64,
    pub vid: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A row from the `term_node` table, tagging a node with a term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermNodeRecord {
    pub tid: i64,
    pub nid: i64,
}

/// A row from the `filters` table, associating an input format id with the
/// module that processes it ("marksmarty" for markdown, "textile").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRecord {
    pub format: i64,
    pub module: String,
}

/// The complete source snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub site: SiteRecord,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub node_revisions: Vec<NodeRevisionRecord>,
    #[serde(default)]
    pub comments: Vec<CommentRecord>,
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub files: Vec<FileRecord>,
    #[serde(default)]
    pub uploads: Vec<UploadRecord>,
    #[serde(default)]
    pub url_aliases: Vec<UrlAliasRecord>,
    #[serde(default)]
    pub vocabularies: Vec<VocabularyRecord>,
    #[serde(default)]
    pub term_data: Vec<TermRecord>,
    #[serde(default)]
    pub term_node: Vec<TermNodeRecord>,
    #[serde(default)]
    pub filters: Vec<FilterRecord>,
}

impl Snapshot {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("unable to read snapshot {}", path.display()))?;
        let snapshot: Snapshot = toml::from_str(&content)
            .with_context(|| format!("unable to parse snapshot {}", path.display()))?;
        Ok(snapshot)
    }
}
