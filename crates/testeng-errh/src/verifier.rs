//! Per-case error-handling verification state machine.

use std::{fmt, mem};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::error::ErrhError;
use crate::reference::{ErrhKind, Position, RefState};
use crate::state::{Errno, ExceptionState, FeFlags};

/// Per-descriptor verification options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrhOptions {
    /// Do not compare FE_UNDERFLOW.
    pub ignore_underflow: bool,
    /// Do not compare FE_INEXACT.
    pub ignore_inexact: bool,
    /// Pre-set random flags before each call and require that they
    /// survive it.
    pub extended: bool,
}

impl ErrhOptions {
    fn mask(self) -> FeFlags {
        let mut mask = FeFlags::ALL;
        if self.ignore_underflow {
            mask.remove(FeFlags::UNDERFLOW);
        }
        if self.ignore_inexact {
            mask.remove(FeFlags::INEXACT);
        }
        mask
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrhStatus {
    /// The case did not request verification.
    #[default]
    Disabled,
    /// Enabled, nothing compared yet.
    Armed,
    Passed,
    /// At least one comparison failed; sticky until the next case.
    Failed,
}

/// A single error indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Errno(Errno),
    Flag(FeFlags),
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Errno(errno) => errno.fmt(f),
            Self::Flag(flag) => f.write_str(flag.name().unwrap_or("FE_?")),
        }
    }
}

/// One disagreement between expected and observed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrhMismatch {
    /// Expected but not raised.
    Missing(Indicator),
    /// Raised but not expected.
    Unexpected(Indicator),
}

impl fmt::Display for ErrhMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(ind) => write!(f, "{ind} expected but not raised"),
            Self::Unexpected(ind) => write!(f, "{ind} raised unexpectedly"),
        }
    }
}

/// Expected state for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expected {
    pub edom: bool,
    pub erange: bool,
    pub flags: FeFlags,
}

/// Verifies the exception state of every kernel call in a test case
/// against the case's reference index sets.
#[derive(Debug)]
pub struct ErrhVerifier {
    options: ErrhOptions,
    status: ErrhStatus,
    refs: RefState,
    preset: FeFlags,
    rng: StdRng,
}

impl ErrhVerifier {
    /// `seed` drives the flag randomisation of extended mode.
    pub fn new(options: ErrhOptions, seed: u64) -> Self {
        Self {
            options,
            status: ErrhStatus::Disabled,
            refs: RefState::empty(),
            preset: FeFlags::NONE,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[inline]
    pub fn options(&self) -> ErrhOptions {
        self.options
    }

    pub fn set_options(&mut self, options: ErrhOptions) {
        self.options = options;
    }

    #[inline]
    pub fn status(&self) -> ErrhStatus {
        self.status
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.status != ErrhStatus::Disabled
    }

    /// Nothing has failed in the current case.
    #[inline]
    pub fn is_passed(&self) -> bool {
        self.status != ErrhStatus::Failed
    }

    pub fn refs(&self) -> &RefState {
        &self.refs
    }

    /// Starts a new case; any previous reference state must have been
    /// released with [`end_case`](Self::end_case).
    pub fn begin_case(&mut self, enabled: bool, refs: RefState) -> Result<(), ErrhError> {
        let previous = mem::replace(&mut self.refs, refs);
        self.status = if enabled {
            ErrhStatus::Armed
        } else {
            ErrhStatus::Disabled
        };
        self.preset = FeFlags::NONE;
        previous.free()
    }

    /// Releases the case's reference state, checking its guard zones.
    pub fn end_case(&mut self) -> Result<(), ErrhError> {
        mem::take(&mut self.refs).free()
    }

    /// State to install before calling the kernel.
    ///
    /// errno and flags are cleared; in extended mode a random flag word is
    /// pre-set and remembered. Like `feraiseexcept`, raising FE_OVERFLOW or
    /// FE_UNDERFLOW also raises FE_INEXACT.
    pub fn reset_before_call(&mut self) -> ExceptionState {
        self.preset = if self.is_enabled() && self.options.extended {
            FeFlags::from_bits_truncate(self.rng.random()).with_implied_inexact()
        } else {
            FeFlags::NONE
        };
        ExceptionState::with_flags(self.preset)
    }

    /// Expected state after a call attributed to `at`.
    pub fn expected(&self, at: Position) -> Expected {
        let edom = self.refs.asserts(ErrhKind::Edom, at);
        let erange = self.refs.asserts(ErrhKind::Erange, at) && !edom;

        let mut raised = FeFlags::NONE;
        for (kind, flag) in [
            (ErrhKind::FeInvalid, FeFlags::INVALID),
            (ErrhKind::FeDivByZero, FeFlags::DIVBYZERO),
            (ErrhKind::FeOverflow, FeFlags::OVERFLOW),
        ] {
            if self.refs.asserts(kind, at) {
                raised.insert(flag);
            }
        }

        Expected {
            edom,
            erange,
            flags: (raised | self.preset).with_implied_inexact(),
        }
    }

    /// Compares the state sampled after a call with the reference.
    ///
    /// Returns the mismatches; any mismatch moves the verifier to
    /// [`ErrhStatus::Failed`] for the rest of the case.
    pub fn verify_after_call(&mut self, actual: ExceptionState, at: Position) -> Vec<ErrhMismatch> {
        if !self.is_enabled() {
            return Vec::new();
        }
        let expected = self.expected(at);
        let mut mismatches = Vec::new();

        for (wanted, errno) in [(expected.edom, Errno::Edom), (expected.erange, Errno::Erange)] {
            match (wanted, actual.errno == errno) {
                (true, false) => mismatches.push(ErrhMismatch::Missing(Indicator::Errno(errno))),
                (false, true) => mismatches.push(ErrhMismatch::Unexpected(Indicator::Errno(errno))),
                _ => {}
            }
        }
        if let Errno::Other(_) = actual.errno {
            mismatches.push(ErrhMismatch::Unexpected(Indicator::Errno(actual.errno)));
        }

        let mask = self.options.mask();
        for flag in (expected.flags & mask).iter() {
            if !actual.flags.contains(flag) {
                mismatches.push(ErrhMismatch::Missing(Indicator::Flag(flag)));
            }
        }
        for flag in ((actual.flags & mask) - expected.flags).iter() {
            mismatches.push(ErrhMismatch::Unexpected(Indicator::Flag(flag)));
        }

        if mismatches.is_empty() {
            if self.status == ErrhStatus::Armed {
                self.status = ErrhStatus::Passed;
            }
        } else {
            for m in &mismatches {
                warn!(%at, mismatch = %m, "error-handling mismatch");
            }
            if self.status != ErrhStatus::Failed {
                debug!(%at, "error-handling verification failed");
            }
            self.status = ErrhStatus::Failed;
        }
        mismatches
    }
}
