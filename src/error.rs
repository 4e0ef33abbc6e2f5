//! Error types for bernard.
//!
//! Only two kinds of failure are fatal to a backup run: a malformed rule file
//! and a failure while writing the archive container. Everything else is
//! either absorbed (an unreadable container becomes an empty index) or
//! reported per file as an error outcome.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Unified result type for the bernard library.
pub type Result<T> = std::result::Result<T, BernardError>;

#[derive(Error, Debug)]
pub enum BernardError {
    /// A numeric key (`series`, `compress`) is missing its value or the value
    /// is not an integer.
    #[error("line {line}: invalid value {value:?} for '{key}', expected an integer")]
    ConfigFormat {
        line: usize,
        key: String,
        value: String,
    },

    /// The rule file itself could not be read.
    #[error("cannot read rule file '{}'", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The archive container is missing or corrupt. Callers building an index
    /// normally absorb this into an empty index.
    #[error("archive '{}' is unavailable", path.display())]
    ArchiveUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A single file could not be stat'ed or read.
    #[error("cannot access '{}': {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Appending to or closing the archive container failed.
    #[error("failed to write archive '{}'", path.display())]
    ArchiveWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BernardError {
    pub(crate) fn file_access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        BernardError::FileAccess {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn archive_write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        BernardError::ArchiveWrite {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_format_message() {
        let err = BernardError::ConfigFormat {
            line: 3,
            key: "series".to_string(),
            value: "abc".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 3"));
        assert!(msg.contains("series"));
        assert!(msg.contains("\"abc\""));
    }

    #[test]
    fn test_io_messages() {
        let access = BernardError::file_access("/tmp/a", io::Error::other("boom"));
        assert!(access.to_string().contains("/tmp/a"));
        assert!(access.to_string().contains("boom"));

        let write = BernardError::archive_write("/tmp/a.tar", io::Error::other("full"));
        assert!(write.to_string().contains("/tmp/a.tar"));
    }
}
