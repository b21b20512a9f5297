//! Shared fixtures for the integration tests: a small two-node site with an
//! alias, a file attachment, and a short comment thread.

use drupal2wxr::*;
use url::Url;

pub const BASE_URL: &str = "http://drupal.example.org";

pub fn base_url() -> Url {
    Url::parse(BASE_URL).unwrap()
}

/// Node 1 is a published page with the alias "about"; node 2 is a blog post
/// with no alias, a comment thread, and one file attachment.
pub fn site_snapshot() -> Snapshot {
    Snapshot {
        site: SiteRecord {
            name: "Example".to_string(),
            slogan: Some("a migrated weblog".to_string()),
            mission: Some("test fixture site".to_string()),
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
                title: "A Post & Friends".to_string(),
                status: 1,
                created: 1_205_000_000,
            },
        ],
        node_revisions: vec![
            NodeRevisionRecord {
                nid: 1,
                vid: 10,
                body: r#"<p>We link to <a href="/node/2">the post</a>.</p>"#.to_string(),
                format: 1,
            },
            NodeRevisionRecord {
                nid: 2,
                vid: 20,
                body: concat!(
                    r#"<p>See <a href="/node/1">the about page</a>, "#,
                    r#"<a href="http://other.example.com/page">elsewhere</a>, "#,
                    r#"<a href="/node/99">a broken link</a>, "#,
                    r#"<a href="http://[::badurl">a bad url</a> "#,
                    r#"and <img src="/files/pic 1.png">.</p>"#,
                )
                .to_string(),
                format: 1,
            },
        ],
        comments: vec![
            CommentRecord {
                cid: 5,
                nid: 2,
                pid: 0,
                subject: "A real subject".to_string(),
                comment: "<p>root comment</p>".to_string(),
                hostname: "10.0.0.1".to_string(),
                timestamp: 1_205_100_000,
                status: 0,
                format: 1,
                name: "alice".to_string(),
                mail: "alice@example.org".to_string(),
                homepage: String::new(),
            },
            CommentRecord {
                cid: 6,
                nid: 2,
                pid: 5,
                subject: "reply subject".to_string(),
                comment: "<p>reply comment</p>".to_string(),
                hostname: "10.0.0.2".to_string(),
                timestamp: 1_205_200_000,
                status: 1,
                format: 1,
                name: "bob".to_string(),
                mail: String::new(),
                homepage: "http://bob.example.org".to_string(),
            },
        ],
        users: vec![UserRecord {
            uid: 3,
            name: "admin".to_string(),
        }],
        files: vec![FileRecord {
            fid: 30,
            filename: "pic 1.png".to_string(),
            filepath: "files/pic 1.png".to_string(),
            filemime: "image/png".to_string(),
            filesize: 2048,
        }],
        uploads: vec![UploadRecord {
            fid: 30,
            vid: 20,
            description: "a picture".to_string(),
            list: 1,
        }],
        url_aliases: vec![UrlAliasRecord {
            src: "node/1".to_string(),
            dst: "about".to_string(),
        }],
        vocabularies: vec![VocabularyRecord {
            vid: 1,
            name: "Tags".to_string(),
            module: "taxonomy".to_string(),
            tags: 1,
        }],
        term_data: vec![TermRecord {
            tid: 7,
            vid: 1,
            name: "migration".to_string(),
            description: String::new(),
        }],
        term_node: vec![TermNodeRecord { tid: 7, nid: 2 }],
        filters: Vec::new(),
    }
}

pub struct ConversionResult {
    pub output: String,
    pub warnings: u32,
    pub errors: u32,
    pub outcome: Result<()>,
}

pub fn run_conversion(snapshot: Snapshot, import: CommentImport) -> ConversionResult {
    let base = base_url();
    let source = DrupalSource::new(snapshot, &base, import);
    let opts = Options {
        base_url: base,
        lang: None,
        comments_open: false,
        pings_open: false,
    };
    let mut converter = Converter::new(Vec::new(), &source, &opts);
    let outcome = converter.run();
    let warnings = converter.log().total_warnings();
    let errors = converter.log().total_errors();
    let output = String::from_utf8(converter.into_inner()).unwrap();
    ConversionResult {
        output,
        warnings,
        errors,
        outcome,
    }
}
