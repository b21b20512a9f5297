//! Conversion error taxonomy
//!
//! Errors are split into two families: recoverable conversion errors, which
//! end processing of the current node only, and fatal errors, which abort the
//! whole run. The orchestrator consults `is_fatal` to decide which.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    /// The candidate link could not be parsed as a URL. Always downgraded to
    /// a warning by the link rewriter; the original link text is preserved.
    #[error("link '{url}' is not a valid URL")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A node with no revisions has no body to migrate.
    #[error("node {nid} has no revisions")]
    MissingRevision { nid: i64 },

    /// A violated snapshot invariant, e.g. an upload row referencing a file
    /// record that does not exist. The source data model guarantees these
    /// relations, so a violation means the snapshot itself is inconsistent.
    #[error("snapshot invariant violated: {0}")]
    Defect(String),

    /// The output stream failed; nothing further can be emitted.
    #[error("output stream failure")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Whether this error aborts the whole run rather than just the node
    /// being converted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConvertError::Defect(_) | ConvertError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_is_recoverable() {
        let err = ConvertError::InvalidUrl {
            url: "http://[::badurl".to_string(),
            source: url::ParseError::InvalidIpv6Address,
        };
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_missing_revision_is_recoverable() {
        assert!(!ConvertError::MissingRevision { nid: 42 }.is_fatal());
    }

    #[test]
    fn test_defect_and_io_are_fatal() {
        assert!(ConvertError::Defect("bad".to_string()).is_fatal());
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(ConvertError::Io(io).is_fatal());
    }
}
