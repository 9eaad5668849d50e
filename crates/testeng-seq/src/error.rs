//! SEQ reader errors.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Error returned by [`SeqReader`](crate::SeqReader).
#[derive(Debug)]
pub enum SeqError {
    /// The file could not be opened.
    Open { path: PathBuf, source: io::Error },
    /// Reading from an open stream failed.
    Io(io::Error),
    /// The stream does not follow the SEQ layout.
    Format { line: usize, message: String },
    /// The stream ended inside a header or block.
    UnexpectedEof { line: usize, what: &'static str },
    /// A `scan` pattern uses an unsupported conversion.
    BadPattern { pattern: String },
}

impl fmt::Display for SeqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "cannot open {}: {source}", path.display())
            }
            Self::Io(err) => write!(f, "read error: {err}"),
            Self::Format { line, message } => write!(f, "line {line}: {message}"),
            Self::UnexpectedEof { line, what } => {
                write!(f, "line {line}: unexpected end of file in {what}")
            }
            Self::BadPattern { pattern } => write!(f, "unsupported scan pattern {pattern:?}"),
        }
    }
}

impl std::error::Error for SeqError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } | Self::Io(source) => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for SeqError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl SeqError {
    /// Whether the error means the file is missing rather than malformed.
    pub fn is_open_failure(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}
