//! Element format tags and the Rust types that can view them.

use std::fmt;

use half::f16;

/// Numeric kind of one base value.
///
/// The two fractional kinds share storage with the equally wide signed
/// integers; they differ only in how reference data was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseFormat {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    /// Q15 fixed point.
    Fract16,
    /// Q31 fixed point.
    Fract32,
    Float16,
    Float32,
    Float64,
}

impl BaseFormat {
    /// Every base format, in tag order.
    pub const ALL: [Self; 13] = [
        Self::U8,
        Self::I8,
        Self::U16,
        Self::I16,
        Self::U32,
        Self::I32,
        Self::U64,
        Self::I64,
        Self::Fract16,
        Self::Fract32,
        Self::Float16,
        Self::Float32,
        Self::Float64,
    ];

    /// Size of one base value in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 | Self::Fract16 | Self::Float16 => 2,
            Self::U32 | Self::I32 | Self::Fract32 | Self::Float32 => 4,
            Self::U64 | Self::I64 | Self::Float64 => 8,
        }
    }

    /// Whether values of this kind can be NaN.
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    /// Upper-case tag name as used in descriptor tables.
    pub const fn name(self) -> &'static str {
        match self {
            Self::U8 => "UINT8",
            Self::I8 => "INT8",
            Self::U16 => "UINT16",
            Self::I16 => "INT16",
            Self::U32 => "UINT32",
            Self::I32 => "INT32",
            Self::U64 => "UINT64",
            Self::I64 => "INT64",
            Self::Fract16 => "FRACT16",
            Self::Fract32 => "FRACT32",
            Self::Float16 => "FLOAT16",
            Self::Float32 => "FLOAT32",
            Self::Float64 => "FLOAT64",
        }
    }
}

impl fmt::Display for BaseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Real or complex (interleaved re/im) elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Domain {
    #[default]
    Real,
    Complex,
}

/// Element format of a vector: base kind plus domain.
///
/// The format fully determines the element size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Format {
    pub base: BaseFormat,
    pub domain: Domain,
}

impl Format {
    pub const fn real(base: BaseFormat) -> Self {
        Self {
            base,
            domain: Domain::Real,
        }
    }

    pub const fn complex(base: BaseFormat) -> Self {
        Self {
            base,
            domain: Domain::Complex,
        }
    }

    /// Number of base values per element (1 for real, 2 for complex).
    #[inline]
    pub const fn parts(self) -> usize {
        match self.domain {
            Domain::Real => 1,
            Domain::Complex => 2,
        }
    }

    #[inline]
    pub const fn is_complex(self) -> bool {
        matches!(self.domain, Domain::Complex)
    }

    /// Size of one element in bytes.
    #[inline]
    pub const fn element_size(self) -> usize {
        self.base.size() * self.parts()
    }

    /// Same base kind in the other domain.
    pub const fn with_domain(self, domain: Domain) -> Self {
        Self {
            base: self.base,
            domain,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let domain = match self.domain {
            Domain::Real => "REAL",
            Domain::Complex => "CPLX",
        };
        write!(f, "{domain}|{}", self.base)
    }
}

/// A single base value widened for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i64),
    Uint(u64),
    Float(f64),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:e}"),
        }
    }
}

/// Rust types that may view the payload of a vector.
pub trait Element: bytemuck::Pod + PartialOrd + fmt::Debug + Send + 'static {
    /// Whether the type can represent NaN.
    const IS_FLOAT: bool;

    /// Whether this type may view base values of `base`.
    fn accepts(base: BaseFormat) -> bool;

    fn to_scalar(self) -> Scalar;

    #[inline]
    fn is_nan(self) -> bool {
        false
    }
}

macro_rules! int_element {
    ($ty:ty, $scalar:ident, $($base:ident)|+) => {
        impl Element for $ty {
            const IS_FLOAT: bool = false;

            #[inline]
            fn accepts(base: BaseFormat) -> bool {
                matches!(base, $(BaseFormat::$base)|+)
            }

            #[inline]
            fn to_scalar(self) -> Scalar {
                Scalar::$scalar(self.into())
            }
        }
    };
}

int_element!(u8, Uint, U8);
int_element!(i8, Int, I8);
int_element!(u16, Uint, U16);
int_element!(i16, Int, I16 | Fract16);
int_element!(u32, Uint, U32);
int_element!(i32, Int, I32 | Fract32);
int_element!(u64, Uint, U64);
int_element!(i64, Int, I64);

impl Element for f16 {
    const IS_FLOAT: bool = true;

    fn accepts(base: BaseFormat) -> bool {
        base == BaseFormat::Float16
    }

    fn to_scalar(self) -> Scalar {
        Scalar::Float(self.to_f64())
    }

    fn is_nan(self) -> bool {
        f16::is_nan(self)
    }
}

impl Element for f32 {
    const IS_FLOAT: bool = true;

    fn accepts(base: BaseFormat) -> bool {
        base == BaseFormat::Float32
    }

    fn to_scalar(self) -> Scalar {
        Scalar::Float(self.into())
    }

    fn is_nan(self) -> bool {
        f32::is_nan(self)
    }
}

impl Element for f64 {
    const IS_FLOAT: bool = true;

    fn accepts(base: BaseFormat) -> bool {
        base == BaseFormat::Float64
    }

    fn to_scalar(self) -> Scalar {
        Scalar::Float(self)
    }

    fn is_nan(self) -> bool {
        f64::is_nan(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_size_follows_domain() {
        for base in BaseFormat::ALL {
            assert_eq!(Format::real(base).element_size(), base.size());
            assert_eq!(Format::complex(base).element_size(), 2 * base.size());
        }
    }

    #[test]
    fn display_matches_descriptor_tags() {
        assert_eq!(Format::real(BaseFormat::Fract16).to_string(), "REAL|FRACT16");
        assert_eq!(Format::complex(BaseFormat::Float32).to_string(), "CPLX|FLOAT32");
    }

    #[test]
    fn fractional_kinds_share_integer_views() {
        assert!(i16::accepts(BaseFormat::Fract16));
        assert!(i16::accepts(BaseFormat::I16));
        assert!(!i16::accepts(BaseFormat::U16));
        assert!(i32::accepts(BaseFormat::Fract32));
        assert!(!f32::accepts(BaseFormat::I32));
        assert!(f16::accepts(BaseFormat::Float16));
    }

    #[test]
    fn nan_detection_only_for_floats() {
        assert!(f32::NAN.is_nan());
        assert!(Element::is_nan(f16::NAN));
        assert!(!Element::is_nan(0i16));
    }
}
