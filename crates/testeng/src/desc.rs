//! Test descriptors.

use testeng_errh::ErrhOptions;
use testeng_vec::{Alignment, Format};

/// Which input a deliberately aliased case shares with the output Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Overlap {
    /// X aliases Z.
    pub xz: bool,
    /// Y aliases Z.
    pub yz: bool,
}

impl Overlap {
    pub const NONE: Self = Self {
        xz: false,
        yz: false,
    };
    pub const XZ: Self = Self { xz: true, yz: false };
    pub const YZ: Self = Self { xz: false, yz: true };

    #[inline]
    pub fn any(self) -> bool {
        self.xz || self.yz
    }
}

/// Describes how one kernel is loaded and checked.
///
/// # Example
///
/// ```
/// use testeng::{Overlap, TestDesc};
/// use testeng_vec::{Alignment, BaseFormat, Format};
///
/// let desc = TestDesc::new(Format::real(BaseFormat::Fract16), 1)
///     .with_z_format(Format::real(BaseFormat::Fract32))
///     .with_alignment(Alignment::Unaligned)
///     .with_overlap(Overlap::XZ);
/// assert_eq!(desc.z_format(), Format::real(BaseFormat::Fract32));
/// assert_eq!(desc.y_format(), desc.fmt);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDesc {
    /// Format of X.
    pub fmt: Format,
    /// Format of Y; defaults to `fmt`.
    pub fmt_y: Option<Format>,
    /// Format of Z and W; defaults to `fmt`.
    pub fmt_z: Option<Format>,
    /// Opaque parameter bits interpreted by domain adapters.
    pub extra: u32,
    /// Number of dimension integers in each case header (1 to 5).
    pub dim_num: usize,
    /// Placement of inputs and outputs.
    pub alignment: Alignment,
    pub overlap: Overlap,
    /// Error-state verification, `None` to ignore `ERRH_ENABLE`.
    pub errh: Option<ErrhOptions>,
    /// Cross-check outputs against the reference variant bit for bit.
    pub bitexact: bool,
    /// Short free-text note for the report sink.
    pub annotation: String,
}

/// Largest number of header dimensions.
pub const MAX_DIMS: usize = 5;

impl TestDesc {
    pub fn new(fmt: Format, dim_num: usize) -> Self {
        Self {
            fmt,
            fmt_y: None,
            fmt_z: None,
            extra: 0,
            dim_num,
            alignment: Alignment::Aligned,
            overlap: Overlap::NONE,
            errh: None,
            bitexact: false,
            annotation: String::new(),
        }
    }

    pub fn with_y_format(mut self, fmt: Format) -> Self {
        self.fmt_y = Some(fmt);
        self
    }

    pub fn with_z_format(mut self, fmt: Format) -> Self {
        self.fmt_z = Some(fmt);
        self
    }

    pub fn with_extra(mut self, extra: u32) -> Self {
        self.extra = extra;
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_overlap(mut self, overlap: Overlap) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_errh(mut self, options: ErrhOptions) -> Self {
        self.errh = Some(options);
        self
    }

    pub fn with_bitexact(mut self) -> Self {
        self.bitexact = true;
        self
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = annotation.into();
        self
    }

    #[inline]
    pub fn y_format(&self) -> Format {
        self.fmt_y.unwrap_or(self.fmt)
    }

    #[inline]
    pub fn z_format(&self) -> Format {
        self.fmt_z.unwrap_or(self.fmt)
    }

    #[inline]
    pub fn has_extra(&self, bits: u32) -> bool {
        self.extra & bits == bits
    }
}
