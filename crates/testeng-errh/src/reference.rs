//! Reference index sets loaded from a SEQ file.

use std::fmt;
use std::io::BufRead;

use testeng_seq::SeqReader;
use testeng_vec::{Alignment, BaseFormat, Format, Vector};
use tracing::{debug, trace};

use crate::error::ErrhError;

/// Index value meaning "asserted for the whole call".
pub const GLOBAL_SENTINEL: i32 = -1;

const INDEX_FORMAT: Format = Format::real(BaseFormat::I32);

/// One of the five reference index sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrhKind {
    Edom,
    Erange,
    FeInvalid,
    FeDivByZero,
    FeOverflow,
}

impl ErrhKind {
    pub const ALL: [Self; 5] = [
        Self::Edom,
        Self::Erange,
        Self::FeInvalid,
        Self::FeDivByZero,
        Self::FeOverflow,
    ];

    /// Block keyword in SEQ files.
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Edom => "ERRH_EDOM",
            Self::Erange => "ERRH_ERANGE",
            Self::FeInvalid => "ERRH_FE_INVALID",
            Self::FeDivByZero => "ERRH_FE_DIVBYZERO",
            Self::FeOverflow => "ERRH_FE_OVERFLOW",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.keyword() == keyword)
    }

    const fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ErrhKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.keyword()["ERRH_".len()..])
    }
}

/// Where a call's exception state is attributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// One element of a per-element invocation.
    Index(usize),
    /// A whole-vector invocation.
    Global,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "element {i}"),
            Self::Global => f.write_str("whole call"),
        }
    }
}

/// The five reference index sets of one test case.
///
/// Sets absent from the SEQ file are empty.
#[derive(Debug, Default)]
pub struct RefState {
    sets: [Option<Vector>; 5],
}

impl RefState {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads every `ERRH_<SET> <count>` block that follows the header.
    pub fn load<R: BufRead>(reader: &mut SeqReader<R>) -> Result<Self, ErrhError> {
        let mut refs = Self::empty();
        while reader.peek_keyword("ERRH_")? {
            let line = reader.line();
            let scan = reader.scan("%s %d")?;
            let name = scan.fields.first().and_then(|f| f.as_str()).unwrap_or_default();
            let kind = ErrhKind::from_keyword(name).ok_or_else(|| ErrhError::UnknownSet {
                line,
                name: name.to_owned(),
            })?;
            let count = scan
                .fields
                .get(1)
                .and_then(|f| f.as_int())
                .and_then(|n| usize::try_from(n).ok())
                .ok_or(ErrhError::BadCount { line })?;
            if refs.sets[kind.slot()].is_some() {
                return Err(ErrhError::Duplicate { line, kind });
            }
            let mut v = Vector::zeroed(count, Alignment::Aligned, INDEX_FORMAT)?;
            reader.read_vector(&mut v)?;
            trace!(%kind, count, line, "loaded reference index set");
            refs.sets[kind.slot()] = Some(v);
        }
        debug!(sets = refs.sets.iter().flatten().count(), "loaded error-handling reference");
        Ok(refs)
    }

    /// Replaces one index set.
    pub fn set(&mut self, kind: ErrhKind, indices: &[i32]) -> Result<(), ErrhError> {
        let v = Vector::from_slice(Alignment::Aligned, INDEX_FORMAT, indices)?;
        if let Some(old) = self.sets[kind.slot()].replace(v) {
            old.free().map_err(|violation| ErrhError::Guard { kind, violation })?;
        }
        Ok(())
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, kind: ErrhKind, indices: &[i32]) -> Result<Self, ErrhError> {
        self.set(kind, indices)?;
        Ok(self)
    }

    pub fn indices(&self, kind: ErrhKind) -> &[i32] {
        self.sets[kind.slot()]
            .as_ref()
            .and_then(|v| v.as_slice::<i32>().ok())
            .unwrap_or_default()
    }

    /// Whether `kind` is asserted at `at`.
    ///
    /// For an element, the set must list its index or the global
    /// sentinel. For a whole call, any entry asserts it.
    pub fn asserts(&self, kind: ErrhKind, at: Position) -> bool {
        let indices = self.indices(kind);
        match at {
            Position::Global => !indices.is_empty(),
            Position::Index(i) => indices
                .iter()
                .any(|&idx| idx == GLOBAL_SENTINEL || usize::try_from(idx).is_ok_and(|idx| idx == i)),
        }
    }

    pub fn is_empty(&self) -> bool {
        ErrhKind::ALL.iter().all(|&kind| self.indices(kind).is_empty())
    }

    /// Releases every set, reporting the first corrupted one.
    pub fn free(self) -> Result<(), ErrhError> {
        let mut result = Ok(());
        for (kind, set) in ErrhKind::ALL.into_iter().zip(self.sets) {
            if let Some(v) = set
                && let Err(violation) = v.free()
                && result.is_ok()
            {
                result = Err(ErrhError::Guard { kind, violation });
            }
        }
        result
    }
}

/// Reads the optional `ERRH_ENABLE: ON|OFF` directive at the end of a
/// header line. A missing directive means OFF.
pub fn read_enable_directive<R: BufRead>(reader: &mut SeqReader<R>) -> Result<bool, ErrhError> {
    let line = reader.line();
    match reader.rest_of_line_keyword()?.as_deref() {
        None => Ok(false),
        Some("ERRH_ENABLE:") => match reader.rest_of_line_keyword()?.as_deref() {
            Some("ON") => Ok(true),
            Some("OFF") => Ok(false),
            other => Err(ErrhError::BadDirective {
                line,
                value: other.unwrap_or_default().to_owned(),
            }),
        },
        Some(other) => Err(ErrhError::BadDirective {
            line,
            value: other.to_owned(),
        }),
    }
}
