//! DCT kernels over real data.
//!
//! Header dimensions are `N scale_method`. Blocks: X, Zlo, Zhi and, with
//! [`EXTRA_BEXP`], the expected block exponent.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::f64::consts::PI;
use std::mem;

use testeng_errh::Position;
use testeng_vec::{Alignment, BaseFormat, Format, Vector, VectorError};
use tracing::debug;

use super::{EXTRA_BEXP, exponent_matches, read_exponent, scale_method};
use crate::context::{Context, Slot};
use crate::convention::{read_bounds, read_new, split_guarded};
use crate::desc::TestDesc;
use crate::engine::{Adapter, LoadStatus, SeqStream};
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DctKind {
    /// Forward transform.
    Dct2,
    /// Inverse of [`Dct2`](Self::Dct2), up to scaling.
    Dct3,
}

/// `cos(πm / 2N)` for `m` in `0..4N`.
///
/// DCT-II coefficient `k` of input `j` is `cos(π(2j+1)k / 2N)`, i.e.
/// [`cos`](Self::cos)`((2j+1)k)`.
#[derive(Debug)]
pub struct DctTables {
    n: usize,
    cos: Vector,
}

impl DctTables {
    pub fn new(n: usize) -> Result<Self, VectorError> {
        let values: Vec<f64> = (0..4 * n)
            .map(|m| (PI * m as f64 / (2 * n) as f64).cos())
            .collect();
        let format = Format::real(BaseFormat::Float64);
        let cos = Vector::from_slice(Alignment::Aligned, format, &values)?;
        Ok(Self { n, cos })
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// `cos(πm / 2N)`, for any `m`.
    pub fn cos(&self, m: usize) -> f64 {
        let table = self.cos.as_slice::<f64>().unwrap_or_default();
        table.get(m % (4 * self.n)).copied().unwrap_or(1.0)
    }
}

/// Arguments of one DCT call.
#[derive(Debug)]
pub struct DctCall<'a> {
    pub kind: DctKind,
    pub x: &'a Vector,
    pub z: &'a mut Vector,
    pub tables: &'a DctTables,
    pub scale_method: i32,
}

/// A DCT kernel; returns the block exponent of the output.
pub type DctKernel = Box<dyn FnMut(DctCall<'_>) -> Result<i32, VectorError>>;

/// Adapter for DCT kernels, with cosine tables cached per size.
#[derive(derive_more::Debug)]
pub struct DctAdapter {
    names: Vec<String>,
    kind: DctKind,
    #[debug(skip)]
    kernel: Option<DctKernel>,
    tables: BTreeMap<usize, DctTables>,
    exponent: Option<usize>,
}

impl DctAdapter {
    pub fn new(
        name: impl Into<String>,
        kind: DctKind,
        kernel: impl FnMut(DctCall<'_>) -> Result<i32, VectorError> + 'static,
    ) -> Self {
        Self {
            kernel: Some(Box::new(kernel)),
            ..Self::absent(name, kind)
        }
    }

    pub fn absent(name: impl Into<String>, kind: DctKind) -> Self {
        Self {
            names: vec![name.into()],
            kind,
            kernel: None,
            tables: BTreeMap::new(),
            exponent: None,
        }
    }
}

impl Adapter for DctAdapter {
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
        cx.data.insert(Slot::X, read_new(reader, n, desc.alignment, desc.fmt)?);
        let (lo, hi) = read_bounds(reader, n, desc.alignment, desc.z_format())?;
        cx.data.insert(Slot::Zlo, lo);
        cx.data.insert(Slot::Zhi, hi);
        cx.data
            .insert(Slot::Z, Vector::zeroed(n, desc.alignment, desc.z_format())?);
        self.exponent = if desc.has_extra(EXTRA_BEXP) {
            Some(read_exponent(reader, cx)?)
        } else {
            None
        };
        Ok(LoadStatus::ONCE)
    }

    fn process(&mut self, cx: &mut Context, _desc: &TestDesc) -> Result<bool, EngineError> {
        let Some(kernel) = self.kernel.as_mut() else {
            return Ok(false);
        };
        let n = cx.dim(0)?;
        let scale = scale_method(cx, 1)?;
        let tables = match self.tables.entry(n) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                debug!(n, "building cosine table");
                e.insert(DctTables::new(n)?)
            }
        };
        let kind = self.kind;

        let (data, mut guard) = split_guarded(cx);
        let [x, z] = data.many_mut([Slot::X, Slot::Z])?;
        let mut exponent = 0;
        guard.call(Position::Global, || {
            exponent = kernel(DctCall {
                kind,
                x,
                z,
                tables,
                scale_method: scale,
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
        for (n, tables) in mem::take(&mut self.tables) {
            if let Err(violation) = tables.cos.free() {
                cx.note(format!("cosine table (N={n}): {violation}"));
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
    fn cosine_table_wraps() {
        let t = DctTables::new(4).unwrap();
        assert!((t.cos(0) - 1.0).abs() < 1e-12);
        assert!(t.cos(4).abs() < 1e-12);
        assert!((t.cos(8) + 1.0).abs() < 1e-12);
        assert_eq!(t.cos(17), t.cos(1));
    }
}
