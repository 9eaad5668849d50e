//! Element-wise range validation against lower/upper bound vectors.

use std::fmt;

use half::f16;

use crate::error::VectorError;
use crate::format::{BaseFormat, Element, Scalar};
use crate::vector::Vector;

/// Which part of an element failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Real,
    Re,
    Im,
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Real => "",
            Self::Re => ".re",
            Self::Im => ".im",
        })
    }
}

/// The first base value that fell outside its bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Violation {
    /// Element index.
    pub index: usize,
    pub part: Part,
    pub value: Scalar,
    pub lo: Scalar,
    pub hi: Scalar,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}]{} = {} outside [{}, {}]",
            self.index, self.part, self.value, self.lo, self.hi
        )
    }
}

/// Outcome of [`check_range`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeCheck {
    Ok,
    Violation(Violation),
}

impl RangeCheck {
    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Self::Ok => None,
            Self::Violation(v) => Some(v),
        }
    }
}

/// Checks `lo[i] <= v[i] <= hi[i]` for every base value.
///
/// Real and imaginary parts of complex elements are checked independently.
/// For float formats a NaN in either bound passes only when the value is
/// NaN as well. All three vectors must share format and count.
pub fn check_range(v: &Vector, lo: &Vector, hi: &Vector) -> Result<RangeCheck, VectorError> {
    for bound in [lo, hi] {
        if bound.format() != v.format() || bound.count() != v.count() {
            return Err(VectorError::Mismatch {
                what: "range check",
                left: (v.format(), v.count()),
                right: (bound.format(), bound.count()),
            });
        }
    }
    match v.format().base {
        BaseFormat::U8 => check_typed::<u8>(v, lo, hi),
        BaseFormat::I8 => check_typed::<i8>(v, lo, hi),
        BaseFormat::U16 => check_typed::<u16>(v, lo, hi),
        BaseFormat::I16 | BaseFormat::Fract16 => check_typed::<i16>(v, lo, hi),
        BaseFormat::U32 => check_typed::<u32>(v, lo, hi),
        BaseFormat::I32 | BaseFormat::Fract32 => check_typed::<i32>(v, lo, hi),
        BaseFormat::U64 => check_typed::<u64>(v, lo, hi),
        BaseFormat::I64 => check_typed::<i64>(v, lo, hi),
        BaseFormat::Float16 => check_typed::<f16>(v, lo, hi),
        BaseFormat::Float32 => check_typed::<f32>(v, lo, hi),
        BaseFormat::Float64 => check_typed::<f64>(v, lo, hi),
    }
}

fn check_typed<T: Element>(v: &Vector, lo: &Vector, hi: &Vector) -> Result<RangeCheck, VectorError> {
    let parts = v.format().parts();
    let values = v.as_slice::<T>()?;
    let lo = lo.as_slice::<T>()?;
    let hi = hi.as_slice::<T>()?;
    let failing = values
        .iter()
        .zip(lo.iter().zip(hi))
        .position(|(&x, (&l, &h))| !in_range(x, l, h));
    Ok(match failing {
        None => RangeCheck::Ok,
        Some(i) => RangeCheck::Violation(Violation {
            index: i / parts,
            part: match (parts, i % parts) {
                (1, _) => Part::Real,
                (_, 0) => Part::Re,
                _ => Part::Im,
            },
            value: values[i].to_scalar(),
            lo: lo[i].to_scalar(),
            hi: hi[i].to_scalar(),
        }),
    })
}

#[inline]
fn in_range<T: Element>(x: T, lo: T, hi: T) -> bool {
    if T::IS_FLOAT && (lo.is_nan() || hi.is_nan()) {
        return x.is_nan();
    }
    lo <= x && x <= hi
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use crate::vector::Alignment;

    fn vec<T: Element>(format: Format, data: &[T]) -> Vector {
        Vector::from_slice(Alignment::Aligned, format, data).unwrap()
    }

    #[test]
    fn inclusive_bounds_pass() {
        let f = Format::real(BaseFormat::Fract16);
        let v = vec::<i16>(f, &[1, 2, 3]);
        let lo = vec::<i16>(f, &[1, 0, 3]);
        let hi = vec::<i16>(f, &[1, 5, 3]);
        assert!(check_range(&v, &lo, &hi).unwrap().is_ok());
    }

    #[test]
    fn reports_first_failing_element() {
        let f = Format::real(BaseFormat::I32);
        let v = vec::<i32>(f, &[0, 9, -9]);
        let lo = vec::<i32>(f, &[0, 0, 0]);
        let hi = vec::<i32>(f, &[1, 1, 1]);
        let check = check_range(&v, &lo, &hi).unwrap();
        let violation = check.violation().unwrap();
        assert_eq!(violation.index, 1);
        assert_eq!(violation.part, Part::Real);
        assert_eq!(violation.value, Scalar::Int(9));
        assert_eq!(violation.to_string(), "[1] = 9 outside [0, 1]");
    }

    #[test]
    fn complex_parts_checked_independently() {
        let f = Format::complex(BaseFormat::Float32);
        let v = vec::<f32>(f, &[0.0, 0.0, 1.0, 5.0]);
        let lo = vec::<f32>(f, &[0.0, 0.0, 1.0, 0.0]);
        let hi = vec::<f32>(f, &[0.0, 0.0, 1.0, 1.0]);
        let check = check_range(&v, &lo, &hi).unwrap();
        let violation = check.violation().unwrap();
        assert_eq!((violation.index, violation.part), (1, Part::Im));
    }

    #[test]
    fn nan_bound_requires_nan_value() {
        let f = Format::real(BaseFormat::Float64);
        let lo = vec::<f64>(f, &[f64::NAN]);
        let hi = vec::<f64>(f, &[0.0]);
        assert!(check_range(&vec(f, &[f64::NAN]), &lo, &hi).unwrap().is_ok());
        assert!(!check_range(&vec(f, &[0.0f64]), &lo, &hi).unwrap().is_ok());
    }

    #[test]
    fn nan_value_fails_finite_bounds() {
        let f = Format::real(BaseFormat::Float16);
        let b = vec::<f16>(f, &[f16::MAX, f16::MAX]);
        let v = vec::<f16>(f, &[f16::ZERO, f16::NAN]);
        let check = check_range(&v, &vec(f, &[f16::MIN, f16::MIN]), &b).unwrap();
        assert_eq!(check.violation().map(|v| v.index), Some(1));
    }

    #[test]
    fn mismatched_formats_are_errors() {
        let v = vec::<i16>(Format::real(BaseFormat::I16), &[0; 4]);
        let lo = vec::<i16>(Format::real(BaseFormat::Fract16), &[0; 4]);
        assert!(matches!(
            check_range(&v, &lo, &v),
            Err(VectorError::Mismatch { .. })
        ));
        let short = vec::<i16>(Format::real(BaseFormat::I16), &[0; 3]);
        assert!(check_range(&v, &v, &short).is_err());
    }
}
