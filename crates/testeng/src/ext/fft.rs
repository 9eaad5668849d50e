//! FFT kernels: complex and real transforms, frame by frame.
//!
//! Header dimensions are `N scale_method frames`. Each frame is a sub-case
//! with its own blocks: X, Zlo, Zhi and, with [`EXTRA_BEXP`], the expected
//! block exponent.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::f64::consts::TAU;
use std::mem;

use testeng_errh::Position;
use testeng_vec::{Alignment, BaseFormat, Domain, Format, GuardViolation, Vector, VectorError};
use tracing::debug;

use super::{
    EXTRA_BEXP, EXTRA_IN_PLACE, exponent_matches, frame_count, read_exponent, scale_method,
};
use crate::context::{Context, Slot};
use crate::convention::{read_bounds, read_new, split_guarded};
use crate::desc::TestDesc;
use crate::engine::{Adapter, LoadStatus, SeqStream};
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FftKind {
    /// N complex in, N complex out.
    Complex,
    /// N real in, N/2+1 complex out.
    RealForward,
    /// N/2+1 complex in, N real out.
    RealInverse,
}

impl FftKind {
    /// Element counts of input and output for a size-`n` transform.
    pub fn sizes(self, n: usize) -> (usize, usize) {
        match self {
            Self::Complex => (n, n),
            Self::RealForward => (n, n / 2 + 1),
            Self::RealInverse => (n / 2 + 1, n),
        }
    }
}

/// Twiddle factors `exp(-2πik/N)` for `k` in `0..N`.
#[derive(Debug)]
pub struct Twiddles {
    table: Vector,
}

impl Twiddles {
    pub fn new(n: usize) -> Result<Self, VectorError> {
        let values: Vec<f64> = (0..n)
            .flat_map(|k| {
                let phase = TAU * k as f64 / n as f64;
                [phase.cos(), -phase.sin()]
            })
            .collect();
        let table = Vector::from_slice(
            Alignment::Aligned,
            Format::complex(BaseFormat::Float64),
            &values,
        )?;
        Ok(Self { table })
    }

    /// Transform size.
    pub fn len(&self) -> usize {
        self.table.count()
    }

    pub fn is_empty(&self) -> bool {
        self.table.count() == 0
    }

    /// Interleaved (re, im) factors.
    pub fn values(&self) -> &[f64] {
        self.table.as_slice().unwrap_or_default()
    }

    /// Factor `k mod N` as (re, im).
    pub fn get(&self, k: usize) -> (f64, f64) {
        let values = self.values();
        let i = 2 * (k % self.len().max(1));
        (values[i], values[i + 1])
    }

    fn free(self) -> Result<(), GuardViolation> {
        self.table.free()
    }
}

/// Buffers of one transform call.
#[derive(Debug)]
pub enum FftIo<'a> {
    OutOfPlace { x: &'a Vector, y: &'a mut Vector },
    /// The input has been copied into the output buffer.
    InPlace(&'a mut Vector),
}

/// Arguments of one transform call.
#[derive(Debug)]
pub struct FftCall<'a> {
    pub io: FftIo<'a>,
    pub twiddles: &'a Twiddles,
    pub scale_method: i32,
    /// Work buffer of 2N complex elements in the output base format, kept
    /// for the whole file run.
    pub scratch: &'a mut Vector,
    /// Frame index within the case.
    pub frame: usize,
}

/// An FFT kernel; returns the block exponent of the output.
pub type FftKernel = Box<dyn FnMut(FftCall<'_>) -> Result<i32, VectorError>>;

/// Adapter for FFT kernels.
///
/// Twiddle tables and scratch buffers are created per transform size on
/// first use and released, with a guard check, when the file run ends.
#[derive(derive_more::Debug)]
pub struct FftAdapter {
    names: Vec<String>,
    kind: FftKind,
    #[debug(skip)]
    kernel: Option<FftKernel>,
    twiddles: BTreeMap<usize, Twiddles>,
    scratch: BTreeMap<usize, Vector>,
    /// Aux index of the expected exponent of the current frame.
    exponent: Option<usize>,
}

impl FftAdapter {
    pub fn new(
        name: impl Into<String>,
        kind: FftKind,
        kernel: impl FnMut(FftCall<'_>) -> Result<i32, VectorError> + 'static,
    ) -> Self {
        Self {
            kernel: Some(Box::new(kernel)),
            ..Self::absent(name, kind)
        }
    }

    pub fn absent(name: impl Into<String>, kind: FftKind) -> Self {
        Self {
            names: vec![name.into()],
            kind,
            kernel: None,
            twiddles: BTreeMap::new(),
            scratch: BTreeMap::new(),
            exponent: None,
        }
    }

    pub fn kind(&self) -> FftKind {
        self.kind
    }

    /// Transform sizes with cached tables.
    pub fn cached_sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.twiddles.keys().copied()
    }
}

impl Adapter for FftAdapter {
    fn names(&self) -> &[String] {
        &self.names
    }

    fn is_present(&self) -> bool {
        self.kernel.is_some()
    }

    fn load(
        &mut self,
        reader: &mut SeqStream,
        cx: &mut Context,
        desc: &TestDesc,
    ) -> Result<LoadStatus, EngineError> {
        let n = cx.dim(0)?;
        if n == 0 {
            return Err(EngineError::format(cx.header_line(), "transform size must be positive"));
        }
        let frames = frame_count(cx, 2)?;
        let (n_in, n_out) = self.kind.sizes(n);

        let x = read_new(reader, n_in, desc.alignment, desc.fmt)?;
        cx.data.insert(Slot::X, x);
        let (lo, hi) = read_bounds(reader, n_out, desc.alignment, desc.z_format())?;
        cx.data.insert(Slot::Zlo, lo);
        cx.data.insert(Slot::Zhi, hi);
        cx.data
            .insert(Slot::Z, Vector::zeroed(n_out, desc.alignment, desc.z_format())?);
        self.exponent = if desc.has_extra(EXTRA_BEXP) {
            Some(read_exponent(reader, cx)?)
        } else {
            None
        };

        Ok(LoadStatus::Loaded {
            retake: cx.retake() + 1 < frames,
        })
    }

    fn process(&mut self, cx: &mut Context, desc: &TestDesc) -> Result<bool, EngineError> {
        let Some(kernel) = self.kernel.as_mut() else {
            return Ok(false);
        };
        let n = cx.dim(0)?;
        let scale = scale_method(cx, 1)?;
        let frame = cx.retake();

        let twiddles = match self.twiddles.entry(n) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                debug!(n, "building twiddle table");
                e.insert(Twiddles::new(n)?)
            }
        };
        let scratch = match self.scratch.entry(n) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let format = desc.z_format().with_domain(Domain::Complex);
                e.insert(Vector::zeroed(2 * n, Alignment::Aligned, format)?)
            }
        };

        let (data, mut guard) = split_guarded(cx);
        let [x, z] = data.many_mut([Slot::X, Slot::Z])?;
        let mut exponent = 0;
        let io = if desc.has_extra(EXTRA_IN_PLACE) {
            match z.copy_from(x) {
                Ok(()) => FftIo::InPlace(z),
                Err(VectorError::Mismatch { .. }) => {
                    guard.note(format!(
                        "in-place transform needs equal buffers, got {} x {} in and {} x {} out",
                        x.format(),
                        x.count(),
                        z.format(),
                        z.count()
                    ));
                    return Ok(false);
                }
                Err(err) => return Err(err.into()),
            }
        } else {
            FftIo::OutOfPlace { x, y: z }
        };
        guard.call(Position::Global, || {
            exponent = kernel(FftCall {
                io,
                twiddles,
                scale_method: scale,
                scratch,
                frame,
            })?;
            Ok(())
        })?;

        if let Some(i) = self.exponent {
            let expected = data.aux(i).ok_or_else(|| {
                EngineError::Config("expected block exponent was not loaded".into())
            })?;
            if let Some(message) = exponent_matches(expected, exponent)? {
                guard.note(message);
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn destroy(&mut self, cx: &mut Context) -> Result<bool, EngineError> {
        let mut intact = true;
        for (n, twiddles) in mem::take(&mut self.twiddles) {
            if let Err(violation) = twiddles.free() {
                cx.note(format!("twiddle table (N={n}): {violation}"));
                intact = false;
            }
        }
        for (n, scratch) in mem::take(&mut self.scratch) {
            if let Err(violation) = scratch.free() {
                cx.note(format!("FFT scratch (N={n}): {violation}"));
                intact = false;
            }
        }
        Ok(intact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twiddles_are_unit_roots() {
        let w = Twiddles::new(4).unwrap();
        assert_eq!(w.len(), 4);
        let (re, im) = w.get(1);
        assert!(re.abs() < 1e-12);
        assert!((im + 1.0).abs() < 1e-12);
        assert_eq!(w.get(5), w.get(1));
        w.free().unwrap();
    }

    #[test]
    fn real_transforms_use_half_spectrum() {
        assert_eq!(FftKind::RealForward.sizes(16), (16, 9));
        assert_eq!(FftKind::RealInverse.sizes(16), (9, 16));
        assert_eq!(FftKind::Complex.sizes(16), (16, 16));
    }
}
