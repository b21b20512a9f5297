//! External comment import
//!
//! Disqus exports comments as XML grouped by article, with each article
//! identified by the fully-qualified URL of the page it appeared on. The
//! export carries no threading (Disqus supports it, the export format does
//! not), so every imported comment arrives as a root-level comment. The
//! whole file is read once at startup and held keyed by article URL.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::comments::Comment;

/// Subject stamped on every imported comment. The forest builder clears it
/// again; it only exists so an imported comment is recognizable in between.
pub const IMPORTED_COMMENT_SUBJECT: &str = "Migrated Disqus comment";

/// Root-level imported comments, keyed by absolute article URL.
pub type CommentImport = HashMap<String, Vec<Comment>>;

pub fn load_comment_import(path: impl AsRef<Path>) -> Result<CommentImport> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path)
        .with_context(|| format!("unable to read comment import {}", path.display()))?;
    parse_comment_import(&xml)
        .with_context(|| format!("unable to parse comment import {}", path.display()))
}

/// Field accumulator for one `<comment>` element.
#[derive(Default)]
struct RawComment {
    message: String,
    ip_address: String,
    date: String,
    name: String,
    email: String,
    url: String,
}

fn parse_comment_import(xml: &str) -> Result<CommentImport> {
    let mut reader = Reader::from_str(xml);
    let mut import = CommentImport::new();

    let mut article_url = String::new();
    let mut article_comments: Vec<Comment> = Vec::new();
    let mut current: Option<RawComment> = None;
    let mut leaf: Option<Vec<u8>> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"article" => {
                    article_url.clear();
                    article_comments = Vec::new();
                }
                b"comment" => current = Some(RawComment::default()),
                name => leaf = Some(name.to_vec()),
            },
            Event::Text(t) => {
                let text = t.unescape()?;
                store_leaf(&leaf, &mut current, &mut article_url, &text);
            }
            Event::CData(t) => {
                let text = std::str::from_utf8(&t)
                    .context("comment import contains non-UTF-8 CDATA")?;
                store_leaf(&leaf, &mut current, &mut article_url, text);
            }
            Event::End(e) => match e.name().as_ref() {
                b"comment" => {
                    let raw = current.take().unwrap_or_default();
                    article_comments.push(decode_imported_comment(&raw)?);
                }
                b"article" => {
                    let key = article_url.trim().to_string();
                    article_url.clear();
                    if key.is_empty() {
                        bail!("article element with no url");
                    }
                    import.entry(key).or_default().append(&mut article_comments);
                }
                _ => leaf = None,
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(import)
}

/// Text and CDATA inside one element can arrive as several events, so
/// values accumulate rather than assign.
fn store_leaf(
    leaf: &Option<Vec<u8>>,
    current: &mut Option<RawComment>,
    article_url: &mut String,
    text: &str,
) {
    let Some(leaf) = leaf else { return };
    match current {
        Some(raw) => match leaf.as_slice() {
            b"message" => raw.message.push_str(text),
            b"ip_address" => raw.ip_address.push_str(text),
            b"date" => raw.date.push_str(text),
            b"name" => raw.name.push_str(text),
            b"email" => raw.email.push_str(text),
            b"url" => raw.url.push_str(text),
            _ => {}
        },
        // Only the article's own url leaf matters outside a comment
        None => {
            if leaf.as_slice() == b"url" {
                article_url.push_str(text);
            }
        }
    }
}

fn decode_imported_comment(raw: &RawComment) -> Result<Comment> {
    Ok(Comment {
        cid: None,
        subject: Some(IMPORTED_COMMENT_SUBJECT.to_string()),
        body: decode_imported_body(&raw.message),
        hostname: raw.ip_address.clone(),
        timestamp: parse_import_date(&raw.date)?,
        is_published: true,
        poster_name: raw.name.clone(),
        poster_email: raw.email.clone(),
        poster_url: raw.url.clone(),
        replies: Vec::new(),
    })
}

/// Imported messages are quasi-textual with doubly-escaped HTML allowed.
/// Unescape one more level, wrap in paragraph marks, and turn blank lines
/// into paragraph breaks.
fn decode_imported_body(message: &str) -> String {
    let unescaped = unescape_html(message);
    format!("<p>{}</p>", unescaped.replace("\n\n", "</p>\n\n<p>"))
}

fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn parse_import_date(date: &str) -> Result<DateTime<Utc>> {
    let date = date.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(date, format) {
            return Ok(naive.and_utc());
        }
    }
    bail!("unrecognized comment date '{date}'")
}
