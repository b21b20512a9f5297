//! Streaming WXR writer
//!
//! An append-only sink producing the WordPress eXtended RSS dialect. The
//! importer on the other end does not parse XML: it scans for literal tag
//! substrings with regular expressions. That constrains the output in ways a
//! conforming XML serializer cannot honor, which is why this writer exists:
//!
//! - a CDATA marker must start immediately after the `>` of its containing
//!   element, with no whitespace between them, or the importer fails to
//!   extract the payload;
//! - category and tag declarations must not contain newlines anywhere in
//!   their subtree, or the importer's line-oriented scanner breaks on them.
//!
//! Everything else is emitted one element per line with 4-space indentation.
//! The writer tracks nesting depth for indentation only; it does not verify
//! that starts and ends are balanced.

use std::io::{self, Write};

/// Escape a value for use as element text or an attribute value. The
/// ampersand must be replaced first or already-escaped entities would be
/// escaped twice.
pub fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
        .replace('"', "&quot;")
}

pub struct WxrWriter<W: Write> {
    out: W,
    indent: usize,
}

impl<W: Write> WxrWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, indent: 0 }
    }

    /// Write the fixed document preamble. Everything until `end_file` nests
    /// inside the rss channel, two levels deep.
    pub fn start_file(&mut self) -> io::Result<()> {
        self.out
            .write_all(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n")?;
        self.out.write_all(OUTPUT_HEAD.as_bytes())?;
        self.indent = 2;
        Ok(())
    }

    /// Write the fixed document close.
    pub fn end_file(&mut self) -> io::Result<()> {
        self.out.write_all(OUTPUT_FOOT.as_bytes())?;
        self.indent = 0;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Open an element on its own line and increase the nesting depth.
    pub fn start_element(
        &mut self,
        ns: Option<&str>,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> io::Result<()> {
        self.indent_line()?;
        self.write_open_tag(ns, name, attrs)?;
        self.out.write_all(b"\n")?;
        self.indent += 1;
        Ok(())
    }

    /// Close an element opened with `start_element`.
    pub fn end_element(&mut self, ns: Option<&str>, name: &str) -> io::Result<()> {
        self.indent -= 1;
        self.indent_line()?;
        self.write_close_tag(ns, name)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    /// Write a leaf element with an escaped text value, on its own line.
    pub fn write_element(
        &mut self,
        ns: Option<&str>,
        name: &str,
        attrs: &[(&str, &str)],
        value: &str,
    ) -> io::Result<()> {
        self.indent_line()?;
        self.write_open_tag(ns, name, attrs)?;
        self.out.write_all(xml_escape(value).as_bytes())?;
        self.write_close_tag(ns, name)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    /// Write a leaf element whose value is embedded verbatim in a CDATA
    /// section. The marker follows the opening tag's `>` with no whitespace;
    /// the importer locates the payload by literal substring search and
    /// finds nothing if indentation precedes the marker.
    pub fn write_cdata_element(
        &mut self,
        ns: Option<&str>,
        name: &str,
        attrs: &[(&str, &str)],
        value: &str,
    ) -> io::Result<()> {
        self.indent_line()?;
        self.write_open_tag(ns, name, attrs)?;
        self.out.write_all(b"<![CDATA[")?;
        self.out.write_all(value.as_bytes())?;
        self.out.write_all(b"]]>")?;
        self.write_close_tag(ns, name)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    /// Open an element for a single-line subtree: indented like a normal
    /// element but with no trailing newline. Everything written with the
    /// inline writers stays on this line until `end_element_inline`.
    pub fn start_element_inline(
        &mut self,
        ns: Option<&str>,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> io::Result<()> {
        self.indent_line()?;
        self.write_open_tag(ns, name, attrs)
    }

    /// Close a single-line subtree, terminating the line.
    pub fn end_element_inline(&mut self, ns: Option<&str>, name: &str) -> io::Result<()> {
        self.write_close_tag(ns, name)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    /// Write a leaf element inside a single-line subtree: no indentation,
    /// no newline.
    pub fn write_element_inline(
        &mut self,
        ns: Option<&str>,
        name: &str,
        attrs: &[(&str, &str)],
        value: &str,
    ) -> io::Result<()> {
        self.write_open_tag(ns, name, attrs)?;
        self.out.write_all(xml_escape(value).as_bytes())?;
        self.write_close_tag(ns, name)
    }

    fn write_open_tag(
        &mut self,
        ns: Option<&str>,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> io::Result<()> {
        self.out.write_all(b"<")?;
        if let Some(ns) = ns {
            write!(self.out, "{}:", ns)?;
        }
        self.out.write_all(name.as_bytes())?;
        for (attr_name, attr_value) in attrs {
            write!(self.out, " {}=\"{}\"", attr_name, xml_escape(attr_value))?;
        }
        self.out.write_all(b">")
    }

    fn write_close_tag(&mut self, ns: Option<&str>, name: &str) -> io::Result<()> {
        self.out.write_all(b"</")?;
        if let Some(ns) = ns {
            write!(self.out, "{}:", ns)?;
        }
        self.out.write_all(name.as_bytes())?;
        self.out.write_all(b">")
    }

    fn indent_line(&mut self) -> io::Result<()> {
        for _ in 0..self.indent {
            self.out.write_all(b"    ")?;
        }
        Ok(())
    }
}

const OUTPUT_HEAD: &str = r#"<!-- This is a WordPress eXtended RSS file generated by WordPress as an export of your blog. -->
<!-- It contains information about your blog's posts, comments, and categories. -->
<!-- You may use this file to transfer that content from one site to another. -->
<!-- This file is not intended to serve as a complete backup of your blog. -->

<!-- To import this information into a WordPress blog follow these steps. -->
<!-- 1. Log into that blog as an administrator. -->
<!-- 2. Go to Manage: Import in the blog's admin panels. -->
<!-- 3. Choose "WordPress" from the list. -->
<!-- 4. Upload this file using the form provided on that page. -->
<!-- 5. You will first be asked to map the authors in this export file to users -->
<!--    on the blog.  For each author, you may choose to map to an -->
<!--    existing user on the blog or to create a new user -->
<!-- 6. WordPress will then import each of the posts, comments, and categories -->
<!--    contained in this file into your blog -->

<!-- generator="wordpress/2.3.3" created="2008-03-16 14:19"-->
<rss version="2.0"
    xmlns:content="http://purl.org/rss/1.0/modules/content/"
    xmlns:wfw="http://wellformedweb.org/CommentAPI/"
    xmlns:dc="http://purl.org/dc/elements/1.1/"
    xmlns:wp="http://wordpress.org/export/1.0/"
    xmlns:drupal="http://apocryph.org/drupal"
>

    <channel>
"#;

const OUTPUT_FOOT: &str = r#"
    </channel>
</rss>
"#;
