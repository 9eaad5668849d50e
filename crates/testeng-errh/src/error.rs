//! Error-handling verification errors.

use std::fmt;

use testeng_seq::SeqError;
use testeng_vec::{GuardViolation, VectorError};

use crate::reference::ErrhKind;

/// Error returned while loading or releasing reference state.
#[derive(Debug)]
pub enum ErrhError {
    Seq(SeqError),
    Vector(VectorError),
    /// An `ERRH_*` block names an unknown index set.
    UnknownSet { line: usize, name: String },
    /// The same index set appears twice in one case.
    Duplicate { line: usize, kind: ErrhKind },
    /// An `ERRH_*` block header without a valid count.
    BadCount { line: usize },
    /// An `ERRH_ENABLE:` directive with a value other than ON or OFF.
    BadDirective { line: usize, value: String },
    /// A reference index vector was corrupted.
    Guard {
        kind: ErrhKind,
        violation: GuardViolation,
    },
}

impl fmt::Display for ErrhError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seq(err) => err.fmt(f),
            Self::Vector(err) => err.fmt(f),
            Self::UnknownSet { line, name } => {
                write!(f, "line {line}: unknown error-handling block {name:?}")
            }
            Self::Duplicate { line, kind } => {
                write!(f, "line {line}: {kind} block given twice")
            }
            Self::BadCount { line } => write!(f, "line {line}: missing index count"),
            Self::BadDirective { line, value } => {
                write!(f, "line {line}: ERRH_ENABLE expects ON or OFF, got {value:?}")
            }
            Self::Guard { kind, violation } => write!(f, "{kind} reference: {violation}"),
        }
    }
}

impl std::error::Error for ErrhError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Seq(err) => Some(err),
            Self::Vector(err) => Some(err),
            Self::Guard { violation, .. } => Some(violation),
            _ => None,
        }
    }
}

impl From<SeqError> for ErrhError {
    fn from(err: SeqError) -> Self {
        Self::Seq(err)
    }
}

impl From<VectorError> for ErrhError {
    fn from(err: VectorError) -> Self {
        Self::Vector(err)
    }
}
