//! Functions under test, as a closed set of calling-convention shapes.
//!
//! Each shape is built from a strongly typed closure over base-value
//! slices; the constructor erases the element types so that the
//! dispatcher only handles [`Vector`]s. Complex vectors are passed as
//! interleaved (re, im) slices.

use std::fmt;
use std::ops::Range;

use testeng_vec::{Element, Vector, VectorError};

/// An input operand that may share storage with the output.
#[derive(Debug)]
pub enum Src<'a, T: ?Sized> {
    /// Independent input buffer.
    Separate(&'a T),
    /// The input was copied into the output buffer, which the kernel must
    /// read in place.
    Aliased,
}

impl<T: ?Sized> Clone for Src<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Src<'_, T> {}

impl<'a> Src<'a, Vector> {
    fn typed<T: Element>(self) -> Result<Src<'a, [T]>, VectorError> {
        Ok(match self {
            Self::Separate(v) => Src::Separate(v.as_slice()?),
            Self::Aliased => Src::Aliased,
        })
    }
}

pub type UnaryFn = Box<dyn FnMut(Src<'_, Vector>, &mut Vector) -> Result<(), VectorError>>;
pub type BinaryFn =
    Box<dyn FnMut(Src<'_, Vector>, Src<'_, Vector>, &mut Vector) -> Result<(), VectorError>>;
pub type ReduceFn = Box<dyn FnMut(&Vector, &mut Vector) -> Result<(), VectorError>>;
pub type ReduceBinaryFn = Box<dyn FnMut(&Vector, &Vector, &mut Vector) -> Result<(), VectorError>>;
pub type VecScalarFn =
    Box<dyn FnMut(Src<'_, Vector>, &Vector, &mut Vector) -> Result<(), VectorError>>;
pub type PairFn = Box<dyn FnMut(&Vector, &mut Vector, &mut Vector) -> Result<(), VectorError>>;
/// Arguments: input, output, base-value range of the block, block index.
pub type BlockFn =
    Box<dyn FnMut(&Vector, &mut Vector, Range<usize>, usize) -> Result<(), VectorError>>;
/// Arguments: input, output, base-value index.
pub type ElementFn = Box<dyn FnMut(&Vector, &mut Vector, usize) -> Result<(), VectorError>>;
pub type ElementPairFn =
    Box<dyn FnMut(&Vector, &Vector, &mut Vector, usize) -> Result<(), VectorError>>;

/// A function under test.
///
/// | shape | call | header dims | SEQ vectors |
/// |-------|------|-------------|-------------|
/// | `VecToVec` | `z = f(x)` | N | X, Zlo, Zhi |
/// | `VecVecToVec` | `z = f(x, y)` | N | X, Y, Zlo, Zhi |
/// | `VecToScalar` | `z[0] = f(x)` | N | X, Zlo(1), Zhi(1) |
/// | `VecVecToScalar` | `z[0] = f(x, y)` | N | X, Y, Zlo(1), Zhi(1) |
/// | `VecScalarToVec` | `z = f(x, y[0])` | N | X, Y(1), Zlo, Zhi |
/// | `VecToVecPair` | `(z, w) = f(x)` | N | X, Zlo, Zhi, Wlo, Whi |
/// | `Streaming` | `z = f(x)` in blocks of L | N, L | X, Zlo, Zhi |
/// | `Scalar` | `z[i] = f(x[i])` | N | X, Zlo, Zhi |
/// | `ScalarPair` | `z[i] = f(x[i], y[i])` | N | X, Y, Zlo, Zhi |
pub enum Fut {
    VecToVec(UnaryFn),
    VecVecToVec(BinaryFn),
    VecToScalar(ReduceFn),
    VecVecToScalar(ReduceBinaryFn),
    VecScalarToVec(VecScalarFn),
    VecToVecPair(PairFn),
    Streaming(BlockFn),
    Scalar(ElementFn),
    ScalarPair(ElementPairFn),
}

/// Shapes that share one load layout. A reference variant must belong to
/// the same family as the kernel it checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// X in, Z out, both of length N.
    Unary,
    /// X and Y in, Z out.
    Binary,
    /// X in, one Z value out.
    Reduce,
    /// X and Y in, one Z value out.
    ReduceBinary,
    /// X and one Y value in, Z out.
    VecScalar,
    /// X in, Z and W out.
    Pair,
    /// X in, Z out, processed block-wise.
    Streaming,
}

impl Fut {
    pub fn shape(&self) -> &'static str {
        match self {
            Self::VecToVec(_) => "VecToVec",
            Self::VecVecToVec(_) => "VecVecToVec",
            Self::VecToScalar(_) => "VecToScalar",
            Self::VecVecToScalar(_) => "VecVecToScalar",
            Self::VecScalarToVec(_) => "VecScalarToVec",
            Self::VecToVecPair(_) => "VecToVecPair",
            Self::Streaming(_) => "Streaming",
            Self::Scalar(_) => "Scalar",
            Self::ScalarPair(_) => "ScalarPair",
        }
    }

    pub fn family(&self) -> Family {
        match self {
            Self::VecToVec(_) | Self::Scalar(_) => Family::Unary,
            Self::VecVecToVec(_) | Self::ScalarPair(_) => Family::Binary,
            Self::VecToScalar(_) => Family::Reduce,
            Self::VecVecToScalar(_) => Family::ReduceBinary,
            Self::VecScalarToVec(_) => Family::VecScalar,
            Self::VecToVecPair(_) => Family::Pair,
            Self::Streaming(_) => Family::Streaming,
        }
    }

    /// `z = f(x)`. With aliasing, X has been copied into `z`.
    pub fn vec_to_vec<X: Element, Z: Element>(
        mut f: impl FnMut(Src<'_, [X]>, &mut [Z]) + 'static,
    ) -> Self {
        Self::VecToVec(Box::new(move |x: Src<'_, Vector>, z: &mut Vector| {
            f(x.typed()?, z.as_mut_slice()?);
            Ok(())
        }))
    }

    /// `z = f(x, y)`. At most one of the inputs is aliased.
    pub fn vec_vec_to_vec<X: Element, Y: Element, Z: Element>(
        mut f: impl FnMut(Src<'_, [X]>, Src<'_, [Y]>, &mut [Z]) + 'static,
    ) -> Self {
        Self::VecVecToVec(Box::new(
            move |x: Src<'_, Vector>, y: Src<'_, Vector>, z: &mut Vector| {
                f(x.typed()?, y.typed()?, z.as_mut_slice()?);
                Ok(())
            },
        ))
    }

    /// `z[0] = f(x)`.
    pub fn vec_to_scalar<X: Element, Z: Element>(mut f: impl FnMut(&[X]) -> Z + 'static) -> Self {
        Self::VecToScalar(Box::new(move |x: &Vector, z: &mut Vector| {
            let value = f(x.as_slice()?);
            store_first(z, value)
        }))
    }

    /// `z[0] = f(x, y)`.
    pub fn vec_vec_to_scalar<X: Element, Y: Element, Z: Element>(
        mut f: impl FnMut(&[X], &[Y]) -> Z + 'static,
    ) -> Self {
        Self::VecVecToScalar(Box::new(move |x: &Vector, y: &Vector, z: &mut Vector| {
            let value = f(x.as_slice()?, y.as_slice()?);
            store_first(z, value)
        }))
    }

    /// `z = f(x, y[0])`.
    pub fn vec_scalar_to_vec<X: Element, Y: Element, Z: Element>(
        mut f: impl FnMut(Src<'_, [X]>, Y, &mut [Z]) + 'static,
    ) -> Self {
        Self::VecScalarToVec(Box::new(
            move |x: Src<'_, Vector>, y: &Vector, z: &mut Vector| {
                let y0 = first(y)?;
                f(x.typed()?, y0, z.as_mut_slice()?);
                Ok(())
            },
        ))
    }

    /// `(z, w) = f(x)`.
    pub fn vec_to_vec_pair<X: Element, Z: Element, W: Element>(
        mut f: impl FnMut(&[X], &mut [Z], &mut [W]) + 'static,
    ) -> Self {
        Self::VecToVecPair(Box::new(move |x: &Vector, z: &mut Vector, w: &mut Vector| {
            f(x.as_slice()?, z.as_mut_slice()?, w.as_mut_slice()?);
            Ok(())
        }))
    }

    /// Block-wise `z = f(x)`. The closure receives each block in order with
    /// its index; block 0 starts a new stream.
    pub fn streaming<X: Element, Z: Element>(
        mut f: impl FnMut(&[X], &mut [Z], usize) + 'static,
    ) -> Self {
        Self::Streaming(Box::new(
            move |x: &Vector, z: &mut Vector, range: Range<usize>, index: usize| {
                let x = x.as_slice::<X>()?;
                let z = z.as_mut_slice::<Z>()?;
                f(&x[range.clone()], &mut z[range], index);
                Ok(())
            },
        ))
    }

    /// Element-wise `z[i] = f(x[i])`, called once per base value.
    pub fn scalar<X: Element, Z: Element>(mut f: impl FnMut(X) -> Z + 'static) -> Self {
        Self::Scalar(Box::new(move |x: &Vector, z: &mut Vector, i: usize| {
            let value = f(x.as_slice::<X>()?[i]);
            z.as_mut_slice::<Z>()?[i] = value;
            Ok(())
        }))
    }

    /// Element-wise `z[i] = f(x[i], y[i])`.
    pub fn scalar_pair<X: Element, Y: Element, Z: Element>(
        mut f: impl FnMut(X, Y) -> Z + 'static,
    ) -> Self {
        Self::ScalarPair(Box::new(
            move |x: &Vector, y: &Vector, z: &mut Vector, i: usize| {
                let value = f(x.as_slice::<X>()?[i], y.as_slice::<Y>()?[i]);
                z.as_mut_slice::<Z>()?[i] = value;
                Ok(())
            },
        ))
    }
}

impl fmt::Debug for Fut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fut::{}", self.shape())
    }
}

fn first<T: Element>(v: &Vector) -> Result<T, VectorError> {
    v.as_slice::<T>()?
        .first()
        .copied()
        .ok_or(VectorError::InitSize {
            expected: size_of::<T>(),
            actual: 0,
        })
}

fn store_first<T: Element>(z: &mut Vector, value: T) -> Result<(), VectorError> {
    let slot = z
        .as_mut_slice::<T>()?
        .first_mut()
        .ok_or(VectorError::InitSize {
            expected: size_of::<T>(),
            actual: 0,
        })?;
    *slot = value;
    Ok(())
}

/// A kernel bound to its names and optional reference variant.
#[derive(Debug)]
pub struct Target {
    names: Vec<String>,
    fut: Option<Fut>,
    twin: Option<Fut>,
}

impl Target {
    pub fn new(name: impl Into<String>, fut: Fut) -> Self {
        Self {
            names: vec![name.into()],
            fut: Some(fut),
            twin: None,
        }
    }

    /// A kernel missing from the current build; runs report NOT TESTED.
    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
            fut: None,
            twin: None,
        }
    }

    /// Adds the reference variant used by bit-exact tests.
    pub fn with_twin(mut self, name: impl Into<String>, twin: Fut) -> Self {
        self.names.push(name.into());
        self.twin = Some(twin);
        self
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_present(&self) -> bool {
        self.fut.is_some()
    }

    pub fn fut(&self) -> Option<&Fut> {
        self.fut.as_ref()
    }

    pub(crate) fn fut_mut(&mut self) -> Option<&mut Fut> {
        self.fut.as_mut()
    }

    pub(crate) fn twin_mut(&mut self) -> Option<&mut Fut> {
        self.twin.as_mut()
    }

    pub fn twin(&self) -> Option<&Fut> {
        self.twin.as_ref()
    }
}
