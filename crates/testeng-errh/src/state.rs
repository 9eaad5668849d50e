//! Explicit exception state: errno plus floating-point flags.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Set of floating-point exception flags.
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FeFlags: u8 {
        const INVALID = 1 << 0;
        const DIVBYZERO = 1 << 1;
        const OVERFLOW = 1 << 2;
        const UNDERFLOW = 1 << 3;
        const INEXACT = 1 << 4;
    }
}

impl FeFlags {
    pub const NONE: Self = Self::empty();
    pub const ALL: Self = Self::all();

    const NAMED: [(Self, &'static str); 5] = [
        (Self::INVALID, "FE_INVALID"),
        (Self::DIVBYZERO, "FE_DIVBYZERO"),
        (Self::OVERFLOW, "FE_OVERFLOW"),
        (Self::UNDERFLOW, "FE_UNDERFLOW"),
        (Self::INEXACT, "FE_INEXACT"),
    ];

    /// C name of a single flag, `None` for empty or combined sets.
    pub fn name(self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(flag, _)| *flag == self)
            .map(|(_, name)| *name)
    }

    /// Adds FE_INEXACT when FE_OVERFLOW or FE_UNDERFLOW is set.
    #[must_use]
    pub fn with_implied_inexact(self) -> Self {
        if self.intersects(Self::OVERFLOW | Self::UNDERFLOW) {
            self | Self::INEXACT
        } else {
            self
        }
    }
}

impl Default for FeFlags {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Debug for FeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("FeFlags(NONE)");
        }
        f.write_str("FeFlags(")?;
        for (i, flag) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            f.write_str(flag.name().unwrap_or("?"))?;
        }
        f.write_str(")")
    }
}

/// errno-style error indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Errno {
    #[default]
    None,
    /// Argument outside the function's domain.
    Edom,
    /// Result not representable.
    Erange,
    /// Any other nonzero value.
    Other(i32),
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("0"),
            Self::Edom => f.write_str("EDOM"),
            Self::Erange => f.write_str("ERANGE"),
            Self::Other(v) => write!(f, "errno {v}"),
        }
    }
}

/// Exception state observed around one kernel call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExceptionState {
    pub errno: Errno,
    pub flags: FeFlags,
}

impl ExceptionState {
    pub const CLEAR: Self = Self {
        errno: Errno::None,
        flags: FeFlags::NONE,
    };

    pub const fn with_flags(flags: FeFlags) -> Self {
        Self {
            errno: Errno::None,
            flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_stays_within_known_flags() {
        assert_eq!(!FeFlags::NONE, FeFlags::ALL);
        assert_eq!(!FeFlags::ALL, FeFlags::NONE);
        assert_eq!(FeFlags::from_bits_truncate(0xff), FeFlags::ALL);
    }

    #[test]
    fn set_operations() {
        let mut f = FeFlags::OVERFLOW | FeFlags::INEXACT;
        assert!(f.contains(FeFlags::OVERFLOW));
        assert!(!f.contains(FeFlags::OVERFLOW | FeFlags::INVALID));
        assert!(f.intersects(FeFlags::INEXACT | FeFlags::INVALID));
        f.remove(FeFlags::INEXACT);
        assert_eq!(f, FeFlags::OVERFLOW);
        assert_eq!((FeFlags::ALL - FeFlags::INEXACT).iter().count(), 4);
    }

    #[test]
    fn debug_lists_flag_names() {
        assert_eq!(
            format!("{:?}", FeFlags::INVALID | FeFlags::INEXACT),
            "FeFlags(FE_INVALID | FE_INEXACT)"
        );
        assert_eq!(format!("{:?}", FeFlags::NONE), "FeFlags(NONE)");
        assert_eq!(FeFlags::DIVBYZERO.name(), Some("FE_DIVBYZERO"));
        assert_eq!((FeFlags::DIVBYZERO | FeFlags::INVALID).name(), None);
    }

    #[test]
    fn overflow_and_underflow_imply_inexact() {
        assert_eq!(
            FeFlags::UNDERFLOW.with_implied_inexact(),
            FeFlags::UNDERFLOW | FeFlags::INEXACT
        );
        assert_eq!(
            (FeFlags::OVERFLOW | FeFlags::INVALID).with_implied_inexact(),
            FeFlags::OVERFLOW | FeFlags::INVALID | FeFlags::INEXACT
        );
        assert_eq!(FeFlags::DIVBYZERO.with_implied_inexact(), FeFlags::DIVBYZERO);
    }
}
