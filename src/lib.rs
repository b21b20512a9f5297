//! Drupal-to-WXR Migration Library
//!
//! This library converts a Drupal 6 site snapshot into the WordPress WXR
//! (eXtended RSS) import format: pages, posts, threaded comments, file
//! attachments, tags and categories, with internal links rewritten to the
//! destination's naming scheme.
//!
//! # Architecture
//!
//! The conversion is a single synchronous pass over the source content:
//! - **Source Layer**: `records` + `source` - snapshot records and the
//!   precomputed caches (aliases, files, users, tags) every lookup uses
//! - **Migration Core**: `resolver` (link classification and rewriting),
//!   `comments` (reply-forest reconstruction), `ids` (output identifier
//!   allocation), `writer` (quirk-compliant WXR streaming)
//! - **Orchestration**: `convert` - sequences the core per node with
//!   per-node failure isolation, tallied by `report`
//!
//! # Example
//!
//! ```no_run
//! use drupal2wxr::{Converter, DrupalSource, Options, Snapshot};
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let snapshot = Snapshot::load("site.toml")?;
//!     let base_url = url::Url::parse("http://example.org")?;
//!     let source = DrupalSource::new(snapshot, &base_url, Default::default());
//!     let opts = Options {
//!         base_url,
//!         lang: None,
//!         comments_open: false,
//!         pings_open: false,
//!     };
//!     let out = std::fs::File::create("export.wxr")?;
//!     let mut converter = Converter::new(out, &source, &opts);
//!     converter.run()?;
//!     Ok(())
//! }
//! ```

mod comments;
mod content;
mod convert;
mod error;
mod html;
mod ids;
mod import;
mod records;
mod report;
mod resolver;
mod source;
mod writer;

// Re-export commonly used types
pub use comments::{Comment, FlatComment, ForestOutcome, build_forest};
pub use convert::{Converter, Options};
pub use error::{ConvertError, Result};
pub use ids::IdAllocator;
pub use import::{CommentImport, IMPORTED_COMMENT_SUBJECT, load_comment_import};
pub use records::{
    CommentRecord, FileRecord, FilterRecord, NodeRecord, NodeRevisionRecord, SiteRecord, Snapshot,
    TermNodeRecord, TermRecord, UploadRecord, UrlAliasRecord, UserRecord, VocabularyRecord,
};
pub use report::{ConversionLog, NodeOutcome};
pub use resolver::{LinkContext, ResolvedLink, UrlResolver, rewrite_link};
pub use source::{Attachment, Category, DrupalSource, Node};
pub use writer::{WxrWriter, xml_escape};
