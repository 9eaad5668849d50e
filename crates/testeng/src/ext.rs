//! Adapters for kernels that need more than a calling convention: per-file
//! tables, scratch memory, strided buffers or state across frames.

use testeng_vec::{Alignment, BaseFormat, Format, Vector};

use crate::context::Context;
use crate::engine::SeqStream;
use crate::error::EngineError;

pub mod dct;
pub mod fft;
pub mod image;
pub mod mfcc;

pub use dct::{DctAdapter, DctCall, DctKind, DctTables};
pub use fft::{FftAdapter, FftCall, FftIo, FftKind, Twiddles};
pub use image::{ImageAdapter, ImageCall};
pub use mfcc::{MfccAdapter, MfccKernel, MfccParams};

/// [`TestDesc::extra`](crate::TestDesc::extra) bit: the transform runs in
/// place on the output buffer.
pub const EXTRA_IN_PLACE: u32 = 1 << 0;
/// [`TestDesc::extra`](crate::TestDesc::extra) bit: the SEQ file carries
/// the expected block exponent after the bounds.
pub const EXTRA_BEXP: u32 = 1 << 1;

const EXPONENT_FORMAT: Format = Format::real(BaseFormat::I32);

/// Header dimension `i` as a scale-method selector.
fn scale_method(cx: &Context, i: usize) -> Result<i32, EngineError> {
    let value = cx.dims().get(i).copied().unwrap_or_default();
    i32::try_from(value).map_err(|_| {
        EngineError::format(cx.header_line(), format!("scale method {value} out of range"))
    })
}

/// Reads the expected block exponent into a new aux vector and returns
/// its index.
fn read_exponent(reader: &mut SeqStream, cx: &mut Context) -> Result<usize, EngineError> {
    let mut v = Vector::zeroed(1, Alignment::Aligned, EXPONENT_FORMAT)?;
    reader.read_vector(&mut v)?;
    Ok(cx.data.push_aux(v))
}

/// Compares a returned block exponent with the expected one.
fn exponent_matches(expected: &Vector, actual: i32) -> Result<Option<String>, EngineError> {
    let expected = expected.as_slice::<i32>()?.first().copied().unwrap_or_default();
    Ok((expected != actual)
        .then(|| format!("block exponent {actual}, expected {expected}")))
}

/// `a * b` for sizes derived from header dimensions; overflow is a format
/// error.
fn dim_product(cx: &Context, what: &str, a: usize, b: usize) -> Result<usize, EngineError> {
    a.checked_mul(b).ok_or_else(|| {
        EngineError::format(cx.header_line(), format!("{what} size {a} x {b} overflows"))
    })
}

/// Number of frames of a multi-frame case; must be positive.
fn frame_count(cx: &Context, i: usize) -> Result<usize, EngineError> {
    match cx.dim(i)? {
        0 => Err(EngineError::format(
            cx.header_line(),
            "frame count must be positive",
        )),
        n => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testeng_errh::ErrhOptions;

    #[test]
    fn exponent_mismatch_is_described() {
        let expected = Vector::from_slice(Alignment::Aligned, EXPONENT_FORMAT, &[3i32]).unwrap();
        assert_eq!(exponent_matches(&expected, 3).unwrap(), None);
        assert_eq!(
            exponent_matches(&expected, 2).unwrap().as_deref(),
            Some("block exponent 2, expected 3")
        );
    }

    #[test]
    fn oversized_dimension_products_are_format_errors() {
        let mut cx = Context::new(ErrhOptions::default(), 0);
        cx.begin_case(0, 0, vec![1, 4], 3);
        assert_eq!(dim_product(&cx, "input", 4, 5).unwrap(), 20);
        let err = dim_product(&cx, "input", 1 << 62, 4).unwrap_err();
        assert_eq!(
            err.to_string(),
            "format error at line 3: input size 4611686018427387904 x 4 overflows"
        );
    }

    #[test]
    fn scale_method_defaults_to_zero() {
        let mut cx = Context::new(ErrhOptions::default(), 0);
        cx.begin_case(0, 0, vec![16], 1);
        assert_eq!(scale_method(&cx, 1).unwrap(), 0);
        cx.begin_case(0, 0, vec![16, 3, 0], 1);
        assert_eq!(scale_method(&cx, 1).unwrap(), 3);
        assert!(frame_count(&cx, 2).is_err());
    }
}
