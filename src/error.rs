//! Centralized error types for gmail-mbox.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the gmail-mbox library.
#[derive(Error, Debug)]
pub enum MboxError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("MBOX file not found: {0}")]
    FileNotFound(PathBuf),

    /// The underlying stream failed while scanning for messages.
    #[error("I/O error while scanning the MBOX stream: {0}")]
    Stream(#[source] std::io::Error),

    /// A single line is longer than the scanner accepts.
    #[error("Line {line} exceeds the maximum line size of {limit} bytes")]
    LineTooLong { line: u64, limit: usize },

    /// A decimal identifier could not be parsed.
    #[error("Invalid id {value:?}: {source}")]
    InvalidId {
        value: String,
        source: std::num::ParseIntError,
    },

    /// The `From ` delimiter line does not carry a usable message id.
    #[error("Failed to parse message id from delimiter {line:?}: {reason}")]
    DelimiterParse { line: String, reason: String },

    /// A header needed to split or identify the message is unusable.
    #[error("Header parse error: {0}")]
    HeaderParse(String),

    /// The multipart structure of a message is broken.
    #[error("MIME error: {0}")]
    Mime(String),

    /// A body part carries malformed base64.
    #[error("Failed to decode base64 body: {0}")]
    Decode(#[from] base64::DecodeError),

    /// Neither the `Date` header nor the delimiter line yield a date.
    #[error("Missing date: no usable Date header and delimiter {line:?} has no date")]
    DateResolution { line: String },

    /// The persistence layer failed.
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Convenience alias for `Result<T, MboxError>`.
pub type Result<T> = std::result::Result<T, MboxError>;

impl MboxError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error aborts the whole run.
    ///
    /// Everything else rejects only the message being processed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::FileNotFound(_)
                | Self::Stream(_)
                | Self::LineTooLong { .. }
                | Self::Storage(_)
        )
    }
}

/// Allow `?` on `std::io::Error` while scanning, where no path is known.
impl From<std::io::Error> for MboxError {
    fn from(source: std::io::Error) -> Self {
        Self::Stream(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let stream = MboxError::from(std::io::Error::other("disk gone"));
        assert!(stream.is_fatal());
        assert!(MboxError::LineTooLong { line: 3, limit: 10 }.is_fatal());

        assert!(!MboxError::HeaderParse("bad".into()).is_fatal());
        assert!(!MboxError::DateResolution {
            line: "From 1@xxx".into()
        }
        .is_fatal());
        assert!(!MboxError::Mime("truncated".into()).is_fatal());
    }

    #[test]
    fn test_invalid_id_message() {
        let err = "12a".parse::<i64>().unwrap_err();
        let e = MboxError::InvalidId {
            value: "12a".into(),
            source: err,
        };
        assert!(e.to_string().contains("\"12a\""));
    }
}
