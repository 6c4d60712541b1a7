// exception.rs -- metadata.xml errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading a metadata.xml file.
///
/// Only construction can fail; once a document is loaded every accessor is
/// infallible.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("unable to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed metadata in {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("refusing to parse {}: {reason}", .path.display())]
    LimitExceeded { path: PathBuf, reason: String },
}

impl MetadataError {
    pub fn path(&self) -> &PathBuf {
        match self {
            MetadataError::Read { path, .. }
            | MetadataError::Malformed { path, .. }
            | MetadataError::LimitExceeded { path, .. } => path,
        }
    }

    pub fn is_read_error(&self) -> bool {
        matches!(self, MetadataError::Read { .. })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, MetadataError::Malformed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_path() {
        let err = MetadataError::Malformed {
            path: PathBuf::from("/repo/app-misc/foo/metadata.xml"),
            reason: "unclosed element <use>".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "malformed metadata in /repo/app-misc/foo/metadata.xml: unclosed element <use>"
        );
        assert!(err.is_malformed());
        assert!(!err.is_read_error());
    }

    #[test]
    fn test_read_error_keeps_source() {
        let err = MetadataError::Read {
            path: PathBuf::from("missing.xml"),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };
        assert!(err.is_read_error());
        assert_eq!(err.path(), &PathBuf::from("missing.xml"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
