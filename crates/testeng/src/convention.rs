//! Load and process functions for the calling-convention families.

use testeng_errh::{ErrhVerifier, Position, fenv};
use testeng_vec::{Alignment, Format, Vector, VectorError, allocate_many};
use tracing::{debug, trace};

use crate::context::{Context, DataSet, Diagnostics, Slot};
use crate::desc::TestDesc;
use crate::engine::{Adapter, LoadStatus, Reference, SeqStream};
use crate::error::EngineError;
use crate::fut::{Family, Fut, Src, Target};

/// Adapter for kernels with one of the [`Fut`] shapes.
///
/// X is read in `desc.fmt`, Y in `desc.y_format()`, the outputs and their
/// bounds in `desc.z_format()`.
#[derive(Debug)]
pub struct ConventionAdapter {
    target: Target,
}

impl ConventionAdapter {
    pub fn new(target: Target) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }
}

impl Adapter for ConventionAdapter {
    fn names(&self) -> &[String] {
        self.target.names()
    }

    fn is_present(&self) -> bool {
        self.target.is_present()
    }

    fn create(&mut self, _cx: &mut Context, _desc: &TestDesc) -> Result<(), EngineError> {
        if let (Some(fut), Some(twin)) = (self.target.fut(), self.target.twin())
            && fut.family() != twin.family()
        {
            return Err(EngineError::Config(format!(
                "{fut:?} and its reference variant {twin:?} load different data sets"
            )));
        }
        Ok(())
    }

    fn load(
        &mut self,
        reader: &mut SeqStream,
        cx: &mut Context,
        desc: &TestDesc,
    ) -> Result<LoadStatus, EngineError> {
        let Some(fut) = self.target.fut() else {
            return Ok(LoadStatus::Absent);
        };
        load_family(fut.family(), reader, cx, desc)?;
        Ok(LoadStatus::ONCE)
    }

    fn process(&mut self, cx: &mut Context, desc: &TestDesc) -> Result<bool, EngineError> {
        let Some(fut) = self.target.fut_mut() else {
            return Ok(false);
        };
        invoke(fut, cx, desc)
    }

    fn process_reference(
        &mut self,
        cx: &mut Context,
        desc: &TestDesc,
    ) -> Result<Reference, EngineError> {
        let Some(twin) = self.target.twin_mut() else {
            return Ok(Reference::Unavailable);
        };
        if invoke(twin, cx, desc)? {
            Ok(Reference::Computed)
        } else {
            Ok(Reference::Unavailable)
        }
    }
}

/// Allocates a vector and fills it from the next SEQ block.
pub fn read_new(
    reader: &mut SeqStream,
    count: usize,
    alignment: Alignment,
    format: Format,
) -> Result<Vector, EngineError> {
    let mut v = Vector::zeroed(count, alignment, format)?;
    reader.read_vector(&mut v)?;
    Ok(v)
}

/// Reads a lower/upper bound pair of `count` elements.
pub fn read_bounds(
    reader: &mut SeqStream,
    count: usize,
    alignment: Alignment,
    format: Format,
) -> Result<(Vector, Vector), EngineError> {
    let pair: [Vector; 2] = allocate_many(alignment, format, &[count, count])?
        .try_into()
        .map_err(|_| EngineError::Config("bound pair allocation".into()))?;
    let [mut lo, mut hi] = pair;
    reader.read_vector(&mut lo)?;
    reader.read_vector(&mut hi)?;
    Ok((lo, hi))
}

fn load_family(
    family: Family,
    reader: &mut SeqStream,
    cx: &mut Context,
    desc: &TestDesc,
) -> Result<(), EngineError> {
    let n = cx.dim(0)?;
    let alignment = desc.alignment;
    let z_format = desc.z_format();

    let x = read_new(reader, n, alignment, desc.fmt)?;
    cx.data.insert(Slot::X, x);
    let y_len = match family {
        Family::Binary | Family::ReduceBinary => Some(n),
        Family::VecScalar => Some(1),
        _ => None,
    };
    if let Some(len) = y_len {
        let y = read_new(reader, len, alignment, desc.y_format())?;
        cx.data.insert(Slot::Y, y);
    }
    if family == Family::Streaming && cx.dim(1)? == 0 {
        return Err(EngineError::format(
            cx.header_line(),
            "streaming block length must be positive",
        ));
    }

    let out_len = match family {
        Family::Reduce | Family::ReduceBinary => 1,
        _ => n,
    };
    let (lo, hi) = read_bounds(reader, out_len, alignment, z_format)?;
    cx.data.insert(Slot::Zlo, lo);
    cx.data.insert(Slot::Zhi, hi);
    cx.data.insert(Slot::Z, Vector::zeroed(out_len, alignment, z_format)?);

    if family == Family::Pair {
        let (lo, hi) = read_bounds(reader, out_len, alignment, z_format)?;
        cx.data.insert(Slot::Wlo, lo);
        cx.data.insert(Slot::Whi, hi);
        cx.data.insert(Slot::W, Vector::zeroed(out_len, alignment, z_format)?);
    }
    trace!(?family, n, "loaded data set");
    Ok(())
}

/// Input that shares Z's buffer in this sub-case, if any.
///
/// Odd-numbered cases of descriptors with an overlap flag run aliased.
fn alias_slot(cx: &Context, desc: &TestDesc, fut: &Fut) -> Option<Slot> {
    if cx.case_num().rem_euclid(2) != 1 {
        return None;
    }
    match fut {
        Fut::VecToVec(_) | Fut::VecScalarToVec(_) | Fut::VecVecToVec(_) if desc.overlap.xz => {
            Some(Slot::X)
        }
        Fut::VecVecToVec(_) if desc.overlap.yz => Some(Slot::Y),
        _ => None,
    }
}

/// Copies the aliased input into Z. Returns `false`, with a diagnostic,
/// when the two buffers differ in size.
fn prepare_alias(cx: &mut Context, slot: Slot) -> Result<bool, EngineError> {
    let [src, z] = cx.data.many_mut([slot, Slot::Z])?;
    match z.copy_from(src) {
        Ok(()) => {
            debug!(%slot, "aliasing input with Z");
            cx.aliased = Some(slot);
            Ok(true)
        }
        Err(VectorError::Mismatch { left, right, .. }) => {
            cx.note(format!(
                "cannot alias {slot} ({} x {}) with Z ({} x {}): sizes differ",
                right.0, right.1, left.0, left.1
            ));
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

/// Calls `fut` on the current data set.
fn invoke(fut: &mut Fut, cx: &mut Context, desc: &TestDesc) -> Result<bool, EngineError> {
    cx.aliased = None;
    if let Some(slot) = alias_slot(cx, desc, fut)
        && !prepare_alias(cx, slot)?
    {
        return Ok(false);
    }
    let aliased = cx.aliased;
    let block = match fut {
        // Block length in base values.
        Fut::Streaming(_) => cx.dim(1)? * cx.data.require(Slot::X)?.format().parts(),
        _ => 0,
    };

    let (data, mut guard) = split_guarded(cx);

    match fut {
        Fut::VecToVec(f) => {
            let [x, z] = data.many_mut([Slot::X, Slot::Z])?;
            guard.call(Position::Global, || f(src(aliased, Slot::X, x), z))?;
        }
        Fut::VecVecToVec(f) => {
            let [x, y, z] = data.many_mut([Slot::X, Slot::Y, Slot::Z])?;
            guard.call(Position::Global, || {
                f(src(aliased, Slot::X, x), src(aliased, Slot::Y, y), z)
            })?;
        }
        Fut::VecToScalar(f) => {
            let [x, z] = data.many_mut([Slot::X, Slot::Z])?;
            guard.call(Position::Global, || f(x, z))?;
        }
        Fut::VecVecToScalar(f) => {
            let [x, y, z] = data.many_mut([Slot::X, Slot::Y, Slot::Z])?;
            guard.call(Position::Global, || f(x, y, z))?;
        }
        Fut::VecScalarToVec(f) => {
            let [x, y, z] = data.many_mut([Slot::X, Slot::Y, Slot::Z])?;
            guard.call(Position::Global, || f(src(aliased, Slot::X, x), y, z))?;
        }
        Fut::VecToVecPair(f) => {
            let [x, z, w] = data.many_mut([Slot::X, Slot::Z, Slot::W])?;
            guard.call(Position::Global, || f(x, z, w))?;
        }
        Fut::Streaming(f) => {
            let [x, z] = data.many_mut([Slot::X, Slot::Z])?;
            same_base_len(x, z)?;
            let len = x.base_len();
            for (index, start) in (0..len).step_by(block).enumerate() {
                let range = start..(start + block).min(len);
                guard.call(Position::Global, || f(x, &mut *z, range, index))?;
            }
        }
        Fut::Scalar(f) => {
            let [x, z] = data.many_mut([Slot::X, Slot::Z])?;
            same_base_len(x, z)?;
            for i in 0..x.base_len() {
                guard.call(Position::Index(i), || f(x, &mut *z, i))?;
            }
        }
        Fut::ScalarPair(f) => {
            let [x, y, z] = data.many_mut([Slot::X, Slot::Y, Slot::Z])?;
            same_base_len(x, z)?;
            same_base_len(y, z)?;
            for i in 0..x.base_len() {
                guard.call(Position::Index(i), || f(x, y, &mut *z, i))?;
            }
        }
    }
    Ok(true)
}

/// Splits the context into its data set and a wrapper that runs kernel
/// calls under error-state verification. Reference runs are not verified.
pub(crate) fn split_guarded(cx: &mut Context) -> (&mut DataSet, ErrhGuard<'_>) {
    let checked = cx.errh.is_enabled() && !cx.reference_run;
    let Context {
        data,
        errh,
        diagnostics,
        ..
    } = cx;
    (
        data,
        ErrhGuard {
            errh,
            diagnostics,
            checked,
        },
    )
}

pub(crate) struct ErrhGuard<'a> {
    errh: &'a mut ErrhVerifier,
    diagnostics: &'a mut Diagnostics,
    checked: bool,
}

impl ErrhGuard<'_> {
    pub(crate) fn call(
        &mut self,
        at: Position,
        call: impl FnOnce() -> Result<(), VectorError>,
    ) -> Result<(), VectorError> {
        if !self.checked {
            return call();
        }
        fenv::install(self.errh.reset_before_call());
        let result = call();
        let actual = fenv::sample();
        for mismatch in self.errh.verify_after_call(actual, at) {
            self.diagnostics.push(format!("{at}: {mismatch}"));
        }
        result
    }

    pub(crate) fn note(&mut self, message: impl Into<String>) {
        self.diagnostics.push(message);
    }
}

fn src(aliased: Option<Slot>, slot: Slot, v: &Vector) -> Src<'_, Vector> {
    if aliased == Some(slot) {
        Src::Aliased
    } else {
        Src::Separate(v)
    }
}

fn same_base_len(a: &Vector, b: &Vector) -> Result<(), EngineError> {
    if a.base_len() != b.base_len() {
        return Err(EngineError::Config(format!(
            "element-wise kernel over {} x {} and {} x {}",
            a.format(),
            a.count(),
            b.format(),
            b.count()
        )));
    }
    Ok(())
}
