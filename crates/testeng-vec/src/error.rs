//! Vector store errors.

use std::fmt;

use crate::format::Format;

/// Error returned by vector allocation and typed access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorError {
    /// The allocator could not provide the requested storage.
    Allocation { bytes: usize },
    /// The requested size exceeds the per-vector limit or overflows.
    TooLarge { count: usize, element_size: usize },
    /// Initialisation data does not match the payload size.
    InitSize { expected: usize, actual: usize },
    /// A typed view was requested with a type that cannot hold the format.
    TypeMismatch {
        format: Format,
        requested: &'static str,
    },
    /// Two vectors that must agree in format and size do not.
    Mismatch {
        what: &'static str,
        left: (Format, usize),
        right: (Format, usize),
    },
    /// A clustered allocation failed part way; everything was released.
    Partial { allocated: usize, requested: usize },
}

impl fmt::Display for VectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation { bytes } => write!(f, "failed to allocate {bytes} bytes"),
            Self::TooLarge {
                count,
                element_size,
            } => write!(
                f,
                "vector of {count} elements x {element_size} bytes exceeds the allocation limit"
            ),
            Self::InitSize { expected, actual } => write!(
                f,
                "initialisation data is {actual} bytes, expected {expected}"
            ),
            Self::TypeMismatch { format, requested } => {
                write!(f, "cannot view {format} data as {requested}")
            }
            Self::Mismatch { what, left, right } => write!(
                f,
                "{what}: {} x {} does not match {} x {}",
                left.0, left.1, right.0, right.1
            ),
            Self::Partial {
                allocated,
                requested,
            } => write!(
                f,
                "allocated only {allocated} of {requested} vectors; all released"
            ),
        }
    }
}

impl std::error::Error for VectorError {}

/// Which guard zone was overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardSide {
    /// Bytes before the payload.
    Head,
    /// Bytes after the payload.
    Tail,
}

/// A write outside the payload was detected.
///
/// `distance` is the number of bytes between the corrupted byte and the
/// nearest payload edge (1 = immediately adjacent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardViolation {
    pub side: GuardSide,
    pub distance: usize,
    pub expected: u8,
    pub found: u8,
}

impl fmt::Display for GuardViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            GuardSide::Head => "before",
            GuardSide::Tail => "after",
        };
        write!(
            f,
            "guard zone corrupted {} byte(s) {side} the payload (expected {:#04x}, found {:#04x})",
            self.distance, self.expected, self.found
        )
    }
}

impl std::error::Error for GuardViolation {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::BaseFormat;

    #[test]
    fn guard_violation_message_names_side() {
        let v = GuardViolation {
            side: GuardSide::Tail,
            distance: 1,
            expected: 0xa5,
            found: 0,
        };
        assert_eq!(
            v.to_string(),
            "guard zone corrupted 1 byte(s) after the payload (expected 0xa5, found 0x00)"
        );
    }

    #[test]
    fn mismatch_message_names_both_sides() {
        let err = VectorError::Mismatch {
            what: "range check",
            left: (Format::real(BaseFormat::I16), 8),
            right: (Format::real(BaseFormat::I32), 8),
        };
        assert_eq!(
            err.to_string(),
            "range check: REAL|INT16 x 8 does not match REAL|INT32 x 8"
        );
    }
}
