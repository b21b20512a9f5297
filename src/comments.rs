//! Comment forest reconstruction
//!
//! Drupal stores comments flat, each row carrying the id of its parent
//! (0 for a root comment). The export needs them as ordered reply trees:
//! this module groups the flat rows by parent and reassembles the forest,
//! preserving source record order at every level. Externally imported
//! comments (which carry no threading) are appended after the native roots.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::content;

/// A decoded comment with its reply subtree.
#[derive(Debug, Clone)]
pub struct Comment {
    /// Source comment id; None for externally imported comments.
    pub cid: Option<i64>,
    pub subject: Option<String>,
    pub body: String,
    pub hostname: String,
    pub timestamp: DateTime<Utc>,
    pub is_published: bool,
    pub poster_name: String,
    pub poster_email: String,
    pub poster_url: String,
    pub replies: Vec<Comment>,
}

/// A decoded comment still waiting to be placed in the forest.
#[derive(Debug, Clone)]
pub struct FlatComment {
    pub cid: i64,
    pub pid: i64,
    pub comment: Comment,
}

/// The reassembled forest, plus any comments that could not be attached.
#[derive(Debug)]
pub struct ForestOutcome {
    pub roots: Vec<Comment>,
    /// Comment ids whose parent chain never reaches a root: the parent is
    /// missing from the set, or the rows form a cycle. The source schema
    /// promises neither happens, but nothing enforces it, so these are
    /// surfaced to the caller instead of being silently dropped (or worse,
    /// looped over forever).
    pub unattached: Vec<i64>,
}

/// Reassemble the reply forest from flat parent-referencing rows, appending
/// `imported` after the native roots. `subject_placeholder` is the subject
/// external imports stamp on every comment; it carries no information and is
/// cleared, as is any subject Drupal auto-generated from the body's opening
/// words.
pub fn build_forest(
    flat: Vec<FlatComment>,
    imported: Vec<Comment>,
    subject_placeholder: &str,
) -> ForestOutcome {
    // Group child indices by parent id, preserving record order
    let mut children: HashMap<i64, Vec<FlatComment>> = HashMap::new();
    let all_cids: Vec<i64> = flat.iter().map(|c| c.cid).collect();
    for entry in flat {
        children.entry(entry.pid).or_default().push(entry);
    }

    let mut attached = HashSet::new();
    let mut roots = assemble_level(0, &mut children, &mut attached);

    let mut unattached: Vec<i64> = all_cids
        .into_iter()
        .filter(|cid| !attached.contains(cid))
        .collect();
    unattached.sort_unstable();

    roots.extend(imported);
    for comment in &mut roots {
        suppress_auto_subject_recursive(comment, subject_placeholder);
    }

    ForestOutcome { roots, unattached }
}

/// Attach all comments whose parent is `pid`, each with its own subtree.
/// Removing each group from the map as it is consumed guarantees
/// termination even on malformed input that repeats a comment id.
fn assemble_level(
    pid: i64,
    children: &mut HashMap<i64, Vec<FlatComment>>,
    attached: &mut HashSet<i64>,
) -> Vec<Comment> {
    let Some(level) = children.remove(&pid) else {
        return Vec::new();
    };

    let mut comments = Vec::with_capacity(level.len());
    for entry in level {
        attached.insert(entry.cid);
        let mut comment = entry.comment;
        comment.replies = assemble_level(entry.cid, children, attached);
        comments.push(comment);
    }
    comments
}

fn suppress_auto_subject_recursive(comment: &mut Comment, placeholder: &str) {
    suppress_auto_subject(comment, placeholder);
    for reply in &mut comment.replies {
        suppress_auto_subject_recursive(reply, placeholder);
    }
}

/// Clear a subject that carries no information: the import placeholder, or
/// Drupal's auto-generated subject (the first few words of the body with
/// markup stripped). If the subject matches the body's plain-text prefix of
/// the same length, the poster never typed one.
fn suppress_auto_subject(comment: &mut Comment, placeholder: &str) {
    let Some(subject) = comment.subject.as_deref() else {
        return;
    };
    if subject == placeholder {
        comment.subject = None;
        return;
    }

    let stripped = content::strip_tags(&comment.body);
    let subject_len = subject.chars().count();
    if stripped.chars().count() >= subject_len {
        let prefix: String = stripped.chars().take(subject_len).collect();
        if prefix == subject {
            comment.subject = None;
        }
    }
}
