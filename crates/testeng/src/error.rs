//! Engine errors: conditions that stop a file run.

use std::fmt;

use testeng_errh::ErrhError;
use testeng_seq::SeqError;
use testeng_vec::VectorError;

use crate::context::Slot;

/// Error that stops a file run (format or resource failure).
///
/// Correctness failures of the kernel under test are not errors; they
/// are reported as failed cases.
#[derive(Debug)]
pub enum EngineError {
    Seq(SeqError),
    Vector(VectorError),
    Errh(ErrhError),
    /// The SEQ content does not fit the active load function.
    Format { line: usize, message: String },
    /// A load or process step needs a vector the data set does not hold.
    MissingVector(Slot),
    /// A descriptor or target combination that cannot be run.
    Config(String),
}

impl EngineError {
    pub(crate) fn format(line: usize, message: impl Into<String>) -> Self {
        Self::Format {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seq(err) => err.fmt(f),
            Self::Vector(err) => err.fmt(f),
            Self::Errh(err) => err.fmt(f),
            Self::Format { line, message } => write!(f, "format error at line {line}: {message}"),
            Self::MissingVector(slot) => write!(f, "vector {slot} was not loaded"),
            Self::Config(message) => write!(f, "invalid test configuration: {message}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Seq(err) => Some(err),
            Self::Vector(err) => Some(err),
            Self::Errh(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SeqError> for EngineError {
    fn from(err: SeqError) -> Self {
        Self::Seq(err)
    }
}

impl From<VectorError> for EngineError {
    fn from(err: VectorError) -> Self {
        Self::Vector(err)
    }
}

impl From<ErrhError> for EngineError {
    fn from(err: ErrhError) -> Self {
        Self::Errh(err)
    }
}
