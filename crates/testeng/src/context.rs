//! Per-file test context and the per-case data set.

use std::fmt;

use testeng_errh::{ErrhOptions, ErrhVerifier};
use testeng_vec::{GuardViolation, RangeCheck, Vector, check_range};
use tracing::warn;

use crate::desc::MAX_DIMS;
use crate::error::EngineError;

/// Named vector of a data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    X,
    Y,
    U,
    V,
    Z,
    W,
    Zlo,
    Zhi,
    Wlo,
    Whi,
}

impl Slot {
    pub const ALL: [Self; 10] = [
        Self::X,
        Self::Y,
        Self::U,
        Self::V,
        Self::Z,
        Self::W,
        Self::Zlo,
        Self::Zhi,
        Self::Wlo,
        Self::Whi,
    ];

    /// Inputs and outputs, without the reference bounds.
    const PROCESSED: [Self; 6] = [Self::X, Self::Y, Self::U, Self::V, Self::Z, Self::W];

    pub const fn name(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::U => "U",
            Self::V => "V",
            Self::Z => "Z",
            Self::W => "W",
            Self::Zlo => "Zlo",
            Self::Zhi => "Zhi",
            Self::Wlo => "Wlo",
            Self::Whi => "Whi",
        }
    }

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Vectors of one test case: ten named slots plus any number of
/// auxiliary vectors.
#[derive(Debug, Default)]
pub struct DataSet {
    slots: [Option<Vector>; 10],
    aux: Vec<Vector>,
}

impl DataSet {
    pub fn get(&self, slot: Slot) -> Option<&Vector> {
        self.slots[slot.index()].as_ref()
    }

    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut Vector> {
        self.slots[slot.index()].as_mut()
    }

    pub fn require(&self, slot: Slot) -> Result<&Vector, EngineError> {
        self.get(slot).ok_or(EngineError::MissingVector(slot))
    }

    pub fn require_mut(&mut self, slot: Slot) -> Result<&mut Vector, EngineError> {
        self.get_mut(slot).ok_or(EngineError::MissingVector(slot))
    }

    /// Stores `v`, returning the vector previously held by the slot.
    pub fn insert(&mut self, slot: Slot, v: Vector) -> Option<Vector> {
        self.slots[slot.index()].replace(v)
    }

    pub fn take(&mut self, slot: Slot) -> Option<Vector> {
        self.slots[slot.index()].take()
    }

    /// Mutable access to several distinct slots at once.
    pub fn many_mut<const N: usize>(
        &mut self,
        slots: [Slot; N],
    ) -> Result<[&mut Vector; N], EngineError> {
        if let Some(&missing) = slots.iter().find(|s| self.get(**s).is_none()) {
            return Err(EngineError::MissingVector(missing));
        }
        let refs = self
            .slots
            .get_disjoint_mut(slots.map(Slot::index))
            .map_err(|_| EngineError::Config(format!("slots {slots:?} requested twice")))?;
        Ok(refs.map(|v| v.as_mut().expect("presence checked above")))
    }

    /// Appends an auxiliary vector and returns its index.
    pub fn push_aux(&mut self, v: Vector) -> usize {
        self.aux.push(v);
        self.aux.len() - 1
    }

    pub fn aux(&self, index: usize) -> Option<&Vector> {
        self.aux.get(index)
    }

    pub fn aux_mut(&mut self, index: usize) -> Option<&mut Vector> {
        self.aux.get_mut(index)
    }

    /// Mutable access to several distinct aux vectors at once.
    pub fn aux_many_mut<const N: usize>(
        &mut self,
        indices: [usize; N],
    ) -> Result<[&mut Vector; N], EngineError> {
        let len = self.aux.len();
        self.aux.get_disjoint_mut(indices).map_err(|_| {
            EngineError::Config(format!("aux vectors {indices:?} requested, {len} loaded"))
        })
    }

    pub fn aux_len(&self) -> usize {
        self.aux.len()
    }

    /// Payload bytes of inputs and outputs.
    pub fn byte_size(&self) -> usize {
        Slot::PROCESSED
            .iter()
            .filter_map(|&s| self.get(s))
            .chain(&self.aux)
            .map(Vector::byte_len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none) && self.aux.is_empty()
    }

    /// Frees every vector, returning the guard violations by vector name.
    pub fn free_all(&mut self) -> Vec<(String, GuardViolation)> {
        let mut violations = Vec::new();
        for slot in Slot::ALL {
            if let Some(v) = self.take(slot)
                && let Err(violation) = v.free()
            {
                violations.push((slot.name().to_owned(), violation));
            }
        }
        for (i, v) in self.aux.drain(..).enumerate() {
            if let Err(violation) = v.free() {
                violations.push((format!("aux[{i}]"), violation));
            }
        }
        violations
    }
}

/// Diagnostics of the current case, in the order they were raised.
#[derive(Debug, Default)]
pub struct Diagnostics {
    lines: Vec<String>,
}

impl Diagnostics {
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.lines.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = String> + '_ {
        self.lines.drain(..)
    }
}

/// State of one SEQ-file run.
///
/// Domain resources are owned by the adapter, not the context.
#[derive(Debug)]
pub struct Context {
    dims: Vec<i64>,
    case_num: i64,
    case_type: i64,
    header_line: usize,
    retake: usize,
    pub(crate) aliased: Option<Slot>,
    pub(crate) reference_run: bool,
    /// Vectors of the current case.
    pub data: DataSet,
    pub errh: ErrhVerifier,
    pub diagnostics: Diagnostics,
}

impl Context {
    pub fn new(errh: ErrhOptions, errh_seed: u64) -> Self {
        Self {
            dims: Vec::with_capacity(MAX_DIMS),
            case_num: 0,
            case_type: 0,
            header_line: 0,
            retake: 0,
            aliased: None,
            reference_run: false,
            data: DataSet::default(),
            errh: ErrhVerifier::new(errh, errh_seed),
            diagnostics: Diagnostics::default(),
        }
    }

    pub(crate) fn begin_case(&mut self, case_num: i64, case_type: i64, dims: Vec<i64>, line: usize) {
        self.case_num = case_num;
        self.case_type = case_type;
        self.dims = dims;
        self.header_line = line;
        self.retake = 0;
        self.aliased = None;
    }

    pub(crate) fn next_retake(&mut self) {
        self.retake += 1;
        self.aliased = None;
    }

    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    /// Dimension `i` as a size.
    pub fn dim(&self, i: usize) -> Result<usize, EngineError> {
        let value = *self.dims.get(i).ok_or_else(|| {
            EngineError::format(self.header_line, format!("case header has no dimension {i}"))
        })?;
        usize::try_from(value).map_err(|_| {
            EngineError::format(self.header_line, format!("dimension {i} is negative ({value})"))
        })
    }

    #[inline]
    pub fn case_num(&self) -> i64 {
        self.case_num
    }

    #[inline]
    pub fn case_type(&self) -> i64 {
        self.case_type
    }

    /// Line of the current case header.
    #[inline]
    pub fn header_line(&self) -> usize {
        self.header_line
    }

    /// Index of the current sub-case within a case.
    #[inline]
    pub fn retake(&self) -> usize {
        self.retake
    }

    /// Input slot sharing its contents with Z in the current sub-case.
    #[inline]
    pub fn aliased(&self) -> Option<Slot> {
        self.aliased
    }

    /// Whether the reference variant is being run for a bit-exact check.
    #[inline]
    pub fn is_reference_run(&self) -> bool {
        self.reference_run
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.diagnostics.push(message);
    }

    /// Range-checks Z against Zlo/Zhi and W against Wlo/Whi, where loaded.
    pub fn validate_outputs(&mut self) -> Result<bool, EngineError> {
        let mut ok = true;
        for (out, lo, hi) in [(Slot::Z, Slot::Zlo, Slot::Zhi), (Slot::W, Slot::Wlo, Slot::Whi)] {
            let (Some(v), Some(l), Some(h)) = (self.data.get(out), self.data.get(lo), self.data.get(hi))
            else {
                continue;
            };
            if let RangeCheck::Violation(violation) = check_range(v, l, h)? {
                ok = false;
                self.diagnostics.push(format!("{out}{violation}"));
            }
        }
        Ok(ok)
    }

    /// Frees the data set; guard violations fail the case.
    pub fn free_data(&mut self) -> bool {
        let violations = self.data.free_all();
        for (name, violation) in &violations {
            self.diagnostics.push(format!("{name}: {violation}"));
        }
        violations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testeng_vec::{Alignment, BaseFormat, Format};

    const Q15: Format = Format::real(BaseFormat::Fract16);

    fn q15(data: &[i16]) -> Vector {
        Vector::from_slice(Alignment::Aligned, Q15, data).unwrap()
    }

    #[test]
    fn many_mut_rejects_missing_and_repeated_slots() {
        let mut data = DataSet::default();
        data.insert(Slot::X, q15(&[1]));
        data.insert(Slot::Z, q15(&[0]));
        let [x, z] = data.many_mut([Slot::X, Slot::Z]).unwrap();
        z.copy_from(x).unwrap();
        assert!(matches!(
            data.many_mut([Slot::X, Slot::Y]),
            Err(EngineError::MissingVector(Slot::Y))
        ));
        assert!(matches!(
            data.many_mut([Slot::X, Slot::X]),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn validate_reports_vector_and_index() {
        let mut cx = Context::new(ErrhOptions::default(), 0);
        cx.data.insert(Slot::Z, q15(&[1, 5]));
        cx.data.insert(Slot::Zlo, q15(&[0, 0]));
        cx.data.insert(Slot::Zhi, q15(&[2, 2]));
        assert!(!cx.validate_outputs().unwrap());
        assert_eq!(cx.diagnostics.lines(), ["Z[1] = 5 outside [0, 2]"]);
        assert!(cx.free_data());
        assert!(cx.data.is_empty());
    }

    #[test]
    fn guard_damage_in_aux_is_named() {
        let mut cx = Context::new(ErrhOptions::default(), 0);
        let mut v = q15(&[0; 4]);
        let (storage, payload) = v.whole_mut();
        storage[payload.end] ^= 1;
        cx.data.push_aux(v);
        assert!(!cx.free_data());
        assert!(cx.diagnostics.lines()[0].starts_with("aux[0]: guard zone corrupted"));
    }

    #[test]
    fn negative_dimension_is_a_format_error() {
        let mut cx = Context::new(ErrhOptions::default(), 0);
        cx.begin_case(1, 0, vec![8, -1], 4);
        assert_eq!(cx.dim(0).unwrap(), 8);
        assert!(matches!(cx.dim(1), Err(EngineError::Format { line: 4, .. })));
        assert!(cx.dim(2).is_err());
    }
}
