//! Migration orchestration
//!
//! Drives the whole run: channel metadata, category and tag declarations,
//! then one pass over the source nodes. Each node is decoded, has its links
//! verified and rewritten, and is streamed out with its comments and
//! attachments before the next node starts. A recoverable failure ends only
//! the node it happened in; a defect aborts the run after flushing whatever
//! the writer already emitted, which can leave the document footer
//! unwritten. That gap is long-standing and deliberate, not papered over.

use chrono::{DateTime, Utc};
use std::io::Write;
use url::Url;

use crate::comments::Comment;
use crate::content;
use crate::error::{ConvertError, Result};
use crate::ids::IdAllocator;
use crate::report::ConversionLog;
use crate::resolver::{LinkContext, UrlResolver, rewrite_link};
use crate::source::{Attachment, Category, DrupalSource, Node};
use crate::writer::WxrWriter;
use crate::{html, writer::xml_escape};

const WORDPRESS_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";
const GENERATOR: &str = "drupal2wxr migration tool";

/// Every migrated node is filed under this category so imported content is
/// easy to find on the destination site.
const MIGRATED_CATEGORY_NICENAME: &str = "migrated-from-drupal";
const MIGRATED_CATEGORY_NAME: &str = "Migrated From Drupal";
const MIGRATED_CATEGORY_DESCRIPTION: &str = "Nodes migrated from Drupal";

/// Run options beyond what the source snapshot carries.
#[derive(Debug, Clone)]
pub struct Options {
    /// Base URL of the source site, exactly as the user gave it.
    pub base_url: Url,
    /// Export language override; the site's default locale otherwise.
    pub lang: Option<String>,
    pub comments_open: bool,
    pub pings_open: bool,
}

pub struct Converter<'a, W: Write> {
    writer: WxrWriter<W>,
    source: &'a DrupalSource,
    opts: &'a Options,
    ids: IdAllocator,
    log: ConversionLog,
}

impl<'a, W: Write> Converter<'a, W> {
    pub fn new(out: W, source: &'a DrupalSource, opts: &'a Options) -> Self {
        Self {
            writer: WxrWriter::new(out),
            source,
            opts,
            ids: IdAllocator::new(),
            log: ConversionLog::new(),
        }
    }

    pub fn log(&self) -> &ConversionLog {
        &self.log
    }

    /// Consume the converter and return the underlying output.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    /// Run the whole migration. On a fatal error the writer is flushed and
    /// the error returned; recoverable per-node failures are absorbed into
    /// the log and the run continues.
    pub fn run(&mut self) -> Result<()> {
        self.writer.start_file()?;
        self.write_channel_metadata()?;

        self.write_category(&Category {
            nicename: MIGRATED_CATEGORY_NICENAME.to_string(),
            name: MIGRATED_CATEGORY_NAME.to_string(),
            description: Some(MIGRATED_CATEGORY_DESCRIPTION.to_string()),
            parent: None,
        })?;
        for category in self.source.categories() {
            self.write_category(&category)?;
        }

        self.write_tag(MIGRATED_CATEGORY_NICENAME)?;
        let tags: Vec<String> = self.source.tag_names().map(str::to_string).collect();
        for tag in &tags {
            self.write_tag(tag)?;
        }

        let total = self.source.num_nodes();
        for (index, record) in self.source.nodes().iter().enumerate() {
            self.log.info(format!(
                "Converting node {}/{}: '{}'",
                index + 1,
                total,
                record.title
            ));
            self.log.begin_node(record.nid, &record.title);
            match self.convert_node(record) {
                Ok(()) => self.log.end_node(false),
                Err(err) if !err.is_fatal() => {
                    self.log
                        .error(format!("Conversion of node {} aborted: {err}", record.nid));
                    self.log.end_node(true);
                }
                Err(err) => {
                    self.log
                        .error(format!("Conversion aborted by fatal error: {err}"));
                    self.log.end_node(true);
                    self.writer.flush()?;
                    return Err(err);
                }
            }
        }

        self.writer.end_file()?;
        self.writer.flush()?;
        Ok(())
    }

    fn write_channel_metadata(&mut self) -> Result<()> {
        let base = self.opts.base_url.as_str().trim_end_matches('/');
        let pub_date = self.source.pub_date().unwrap_or_default();
        let lang = self
            .opts
            .lang
            .clone()
            .unwrap_or_else(|| self.source.default_locale());

        self.writer
            .write_element(None, "title", &[], &self.source.title())?;
        self.writer.write_element(None, "link", &[], base)?;
        self.writer
            .write_element(None, "description", &[], &self.source.description())?;
        self.writer
            .write_element(None, "pubDate", &[], &httpdate(&pub_date))?;
        self.writer.write_element(None, "generator", &[], GENERATOR)?;
        self.writer.write_element(None, "language", &[], &lang)?;
        self.writer
            .write_element(Some("wp"), "wxr_version", &[], "1.0")?;
        Ok(())
    }

    /// Category and tag declarations use the single-line writers: the
    /// importer's scanner cannot handle newlines inside these blocks.
    fn write_category(&mut self, category: &Category) -> Result<()> {
        self.writer.start_element_inline(Some("wp"), "category", &[])?;
        self.writer
            .write_element_inline(Some("wp"), "category_nicename", &[], &category.nicename)?;
        self.writer.write_element_inline(
            Some("wp"),
            "category_parent",
            &[],
            category.parent.as_deref().unwrap_or(""),
        )?;
        self.writer
            .write_element_inline(Some("wp"), "cat_name", &[], &category.name)?;
        if let Some(description) = &category.description {
            self.writer
                .write_element_inline(Some("wp"), "category_description", &[], description)?;
        }
        self.writer.end_element_inline(Some("wp"), "category")?;
        Ok(())
    }

    fn write_tag(&mut self, tag: &str) -> Result<()> {
        self.writer.start_element_inline(Some("wp"), "tag", &[])?;
        self.writer
            .write_element_inline(Some("wp"), "tag_slug", &[], tag)?;
        self.writer
            .write_element_inline(Some("wp"), "tag_name", &[], tag)?;
        self.writer.end_element_inline(Some("wp"), "tag")?;
        Ok(())
    }

    fn convert_node(&mut self, record: &crate::records::NodeRecord) -> Result<()> {
        let mut node = self.source.decode_node(record, &mut self.log)?;

        let node_abs_url = self.join_base(&node.source_path)?;
        let node_canonical_abs_url = self.join_base(&node.canonical_path)?;
        let node_dest_url = self.join_base(&node.post_name)?;

        self.log.info(format!(
            "Processing node '{}' <{}>",
            xml_escape(&node.title),
            node_abs_url
        ));

        // Verify every link and image reference in the body: external links
        // pass through, internal ones are rewritten to the destination
        // scheme, broken ones warn and stay as they are
        let ctx = LinkContext {
            source_url: node_abs_url.clone(),
            dest_url: node_dest_url,
            created: node.created,
        };
        let resolver = UrlResolver::new(self.source);
        let log = &mut self.log;
        node.content = html::rewrite_link_targets(&node.content, |link| {
            rewrite_link(&resolver, &ctx, link, log)
        });

        let post_id = self.write_node_item(&node, &node_abs_url, &node_canonical_abs_url)?;

        for attachment in &node.attachments {
            self.write_attachment(&node, post_id, attachment)?;
        }

        self.log.info(format!(
            "Successfully converted node '{}' <{}>",
            xml_escape(&node.title),
            node_abs_url
        ));
        Ok(())
    }

    /// Emit the item block for a node, returning its allocated post id.
    fn write_node_item(
        &mut self,
        node: &Node,
        node_abs_url: &Url,
        node_canonical_abs_url: &Url,
    ) -> Result<u32> {
        let w = &mut self.writer;
        w.start_element(None, "item", &[])?;
        w.write_element(None, "title", &[], &node.title)?;
        w.write_element(None, "link", &[], node_abs_url.as_str())?;
        w.write_element(None, "pubDate", &[], &httpdate(&node.created))?;
        w.write_element(Some("dc"), "creator", &[], &node.creator)?;

        for tag in &node.tags {
            w.write_element(None, "category", &[("domain", "tag")], tag)?;
        }

        w.write_element(
            Some("dc"),
            "guid",
            &[("isPermalink", "false")],
            node_canonical_abs_url.as_str(),
        )?;
        w.write_element(None, "description", &[], "")?;
        w.write_cdata_element(
            Some("content"),
            "encoded",
            &[],
            &content::strip_paragraph_tags(&node.content),
        )?;

        w.write_element(Some("drupal"), "drupal_node_id", &[], &node.nid.to_string())?;
        let post_id = self.ids.next_post_id();
        let w = &mut self.writer;
        w.write_element(Some("wp"), "post_id", &[], &post_id.to_string())?;
        w.write_element(
            Some("wp"),
            "post_date",
            &[],
            &wordpress_date(&node.created),
        )?;
        w.write_element(
            Some("wp"),
            "post_date_gmt",
            &[],
            &wordpress_date(&node.created),
        )?;
        w.write_element(
            Some("wp"),
            "comment_status",
            &[],
            open_or_closed(self.opts.comments_open),
        )?;
        w.write_element(
            Some("wp"),
            "ping_status",
            &[],
            open_or_closed(self.opts.pings_open),
        )?;
        w.write_element(Some("wp"), "post_name", &[], &node.post_name)?;
        w.write_element(
            Some("wp"),
            "status",
            &[],
            if node.is_published { "publish" } else { "draft" },
        )?;
        w.write_element(Some("wp"), "post_parent", &[], "0")?;
        w.write_element(Some("wp"), "menu_order", &[], "0")?;
        w.write_element(
            Some("wp"),
            "post_type",
            &[],
            if node.is_page { "page" } else { "post" },
        )?;
        w.write_element(Some("wp"), "post_password", &[], "")?;

        if node.is_page {
            w.start_element(Some("wp"), "postmeta", &[])?;
            w.write_element(Some("wp"), "meta_key", &[], "_wp_page_template")?;
            w.write_element(Some("wp"), "meta_value", &[], "default")?;
            w.end_element(Some("wp"), "postmeta")?;
        }

        for comment in &node.root_comments {
            self.write_comment(comment, None)?;
        }
        self.writer.end_element(None, "item")?;
        Ok(post_id)
    }

    /// Emit one comment and, pre-order, its whole reply subtree.
    fn write_comment(&mut self, comment: &Comment, parent_cid: Option<i64>) -> Result<()> {
        let comment_id = self.ids.next_comment_id();
        let w = &mut self.writer;
        w.start_element(Some("wp"), "comment", &[])?;
        if let Some(cid) = comment.cid {
            w.write_element(Some("drupal"), "drupal_comment_id", &[], &cid.to_string())?;
        }
        w.write_element(Some("wp"), "comment_id", &[], &comment_id.to_string())?;
        w.write_element(Some("wp"), "comment_author", &[], &comment.poster_name)?;
        w.write_element(
            Some("wp"),
            "comment_author_email",
            &[],
            &comment.poster_email,
        )?;
        w.write_element(Some("wp"), "comment_author_url", &[], &comment.poster_url)?;
        w.write_element(Some("wp"), "comment_author_IP", &[], &comment.hostname)?;
        w.write_element(
            Some("wp"),
            "comment_date",
            &[],
            &wordpress_date(&comment.timestamp),
        )?;
        w.write_element(
            Some("wp"),
            "comment_date_gmt",
            &[],
            &wordpress_date(&comment.timestamp),
        )?;

        // WordPress has no field for a comment subject; inject surviving
        // subjects into the body instead
        let body = match &comment.subject {
            Some(subject) => format!("<strong>{}</strong>\n\n{}", subject, comment.body),
            None => comment.body.clone(),
        };
        w.write_cdata_element(
            Some("wp"),
            "comment_content",
            &[],
            &content::strip_paragraph_tags(&body),
        )?;
        w.write_element(
            Some("wp"),
            "comment_approved",
            &[],
            if comment.is_published { "1" } else { "0" },
        )?;
        w.write_element(Some("wp"), "comment_type", &[], "")?;
        w.write_element(
            Some("wp"),
            "comment_parent",
            &[],
            &parent_cid.unwrap_or(0).to_string(),
        )?;
        w.end_element(Some("wp"), "comment")?;

        for reply in &comment.replies {
            self.write_comment(reply, comment.cid)?;
        }
        Ok(())
    }

    /// Emit an attachment as its own item, parented to the owning node.
    fn write_attachment(
        &mut self,
        node: &Node,
        node_post_id: u32,
        attachment: &Attachment,
    ) -> Result<()> {
        let attachment_abs_url = self.join_base(&attachment.filepath)?;
        let post_id = self.ids.next_post_id();

        let w = &mut self.writer;
        w.start_element(None, "item", &[])?;
        w.write_element(None, "title", &[], &attachment.filename)?;
        w.write_element(None, "link", &[], attachment_abs_url.as_str())?;
        w.write_element(None, "pubDate", &[], &httpdate(&node.created))?;
        w.write_element(Some("dc"), "creator", &[], &node.creator)?;
        w.write_element(
            Some("dc"),
            "guid",
            &[("isPermalink", "false")],
            attachment_abs_url.as_str(),
        )?;
        w.write_element(None, "description", &[], &attachment.description)?;
        w.write_element(Some("content"), "encoded", &[], "")?;

        w.write_element(
            Some("drupal"),
            "drupal_attachment_id",
            &[],
            &attachment.fid.to_string(),
        )?;
        w.write_element(Some("wp"), "post_id", &[], &post_id.to_string())?;
        w.write_element(
            Some("wp"),
            "post_date",
            &[],
            &wordpress_date(&node.created),
        )?;
        w.write_element(
            Some("wp"),
            "post_date_gmt",
            &[],
            &wordpress_date(&node.created),
        )?;
        w.write_element(
            Some("wp"),
            "comment_status",
            &[],
            open_or_closed(self.opts.comments_open),
        )?;
        w.write_element(
            Some("wp"),
            "ping_status",
            &[],
            open_or_closed(self.opts.pings_open),
        )?;
        w.write_element(Some("wp"), "post_name", &[], file_stem(&attachment.filename))?;
        w.write_element(Some("wp"), "status", &[], "inherit")?;
        w.write_element(Some("wp"), "post_parent", &[], &node_post_id.to_string())?;
        w.write_element(Some("wp"), "menu_order", &[], "0")?;
        w.write_element(Some("wp"), "post_type", &[], "attachment")?;
        w.write_element(
            Some("wp"),
            "attachment_url",
            &[],
            attachment_abs_url.as_str(),
        )?;
        w.end_element(None, "item")?;
        Ok(())
    }

    fn join_base(&self, path: &str) -> Result<Url> {
        self.source.base_url().join(path).map_err(|e| {
            ConvertError::Defect(format!("path '{path}' does not join the base URL: {e}"))
        })
    }
}

fn open_or_closed(open: bool) -> &'static str {
    if open { "open" } else { "closed" }
}

fn httpdate(date: &DateTime<Utc>) -> String {
    date.format(HTTP_DATE_FORMAT).to_string()
}

fn wordpress_date(date: &DateTime<Utc>) -> String {
    date.format(WORDPRESS_DATE_FORMAT).to_string()
}

fn file_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}
