//! Typed, guard-zoned test vectors.
//!
//! A [`Vector`] owns a payload of `count` elements of a [`Format`],
//! surrounded by guard zones that detect out-of-bounds writes by the code
//! under test. [`check_range`] validates a vector element-wise against a
//! pair of bound vectors.
//!
//! ```
//! use testeng_vec::{check_range, Alignment, BaseFormat, Format, Vector};
//!
//! let q15 = Format::real(BaseFormat::Fract16);
//! let mut z = Vector::zeroed(4, Alignment::Unaligned, q15)?;
//! z.as_mut_slice::<i16>()?.copy_from_slice(&[1, 2, 3, 4]);
//!
//! let bounds = z.try_clone()?;
//! assert!(check_range(&z, &bounds, &bounds)?.is_ok());
//! assert!(z.free().is_ok());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]

pub mod error;
pub mod format;
pub mod range;
pub mod vector;

pub use error::{GuardSide, GuardViolation, VectorError};
pub use format::{BaseFormat, Domain, Element, Format, Scalar};
pub use range::{Part, RangeCheck, Violation, check_range};
pub use vector::{ALIGNMENT, Alignment, GUARD_BYTES, MAX_VECTOR_BYTES, Vector, allocate_many};

pub use half::f16;
