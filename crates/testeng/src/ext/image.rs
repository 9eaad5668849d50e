//! Image kernels over strided buffers.
//!
//! Header dimensions are `in_width in_height in_stride out_width
//! out_height`; blocks are the packed input X, then Zlo and Zhi of the
//! packed output. The kernel reads a strided copy of X and writes a
//! strided output whose row padding must come back untouched.

use testeng_errh::Position;
use testeng_vec::{Vector, VectorError};
use tracing::trace;

use super::dim_product;
use crate::context::{Context, Slot};
use crate::convention::{read_bounds, read_new, split_guarded};
use crate::desc::TestDesc;
use crate::engine::{Adapter, LoadStatus, SeqStream};
use crate::error::EngineError;

/// Output rows hold at least one padding element and are a multiple of
/// this many elements.
const OUT_STRIDE_MULTIPLE: usize = 8;

/// Arguments of one image kernel call. Widths and strides are in
/// elements.
#[derive(Debug)]
pub struct ImageCall<'a> {
    pub src: &'a Vector,
    pub src_width: usize,
    pub src_height: usize,
    pub src_stride: usize,
    pub dst: &'a mut Vector,
    pub dst_width: usize,
    pub dst_height: usize,
    pub dst_stride: usize,
}

pub type ImageKernel = Box<dyn FnMut(ImageCall<'_>) -> Result<(), VectorError>>;

#[derive(Debug, Clone, Copy)]
struct Layout {
    in_width: usize,
    in_height: usize,
    in_stride: usize,
    out_width: usize,
    out_height: usize,
    out_stride: usize,
    src: usize,
    dst: usize,
}

/// Adapter for image kernels.
#[derive(derive_more::Debug)]
pub struct ImageAdapter {
    names: Vec<String>,
    #[debug(skip)]
    kernel: Option<ImageKernel>,
    layout: Option<Layout>,
}

impl ImageAdapter {
    pub fn new(
        name: impl Into<String>,
        kernel: impl FnMut(ImageCall<'_>) -> Result<(), VectorError> + 'static,
    ) -> Self {
        Self {
            names: vec![name.into()],
            kernel: Some(Box::new(kernel)),
            layout: None,
        }
    }

    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
            kernel: None,
            layout: None,
        }
    }
}

/// Output row stride for `width` elements, `None` when it does not fit in
/// `usize`.
pub fn output_stride(width: usize) -> Option<usize> {
    width
        .checked_add(1)?
        .checked_next_multiple_of(OUT_STRIDE_MULTIPLE)
}

fn pad_byte(pos: usize) -> u8 {
    (pos as u8).wrapping_mul(0x9d) ^ 0xa5
}

/// Fills the bytes past `width` elements of every row with the padding
/// pattern.
fn fill_padding(v: &mut Vector, width: usize, stride: usize) {
    let es = v.element_size();
    let (row, used) = (stride * es, width * es);
    for (r, chunk) in v.bytes_mut().chunks_exact_mut(row).enumerate() {
        for (i, b) in chunk[used..].iter_mut().enumerate() {
            *b = pad_byte(r * row + used + i);
        }
    }
}

/// First padding element that lost its pattern, as (row, column).
fn padding_damage(v: &Vector, width: usize, stride: usize) -> Option<(usize, usize)> {
    let es = v.element_size();
    let (row, used) = (stride * es, width * es);
    v.bytes().chunks_exact(row).enumerate().find_map(|(r, chunk)| {
        chunk[used..]
            .iter()
            .enumerate()
            .position(|(i, &b)| b != pad_byte(r * row + used + i))
            .map(|i| (r, width + i / es))
    })
}

/// Copies `height` rows of `width` elements between buffers of different
/// strides.
fn copy_rows(
    dst: &mut [u8],
    dst_stride: usize,
    src: &[u8],
    src_stride: usize,
    width: usize,
    height: usize,
) {
    for r in 0..height {
        let d = r * dst_stride;
        let s = r * src_stride;
        dst[d..d + width].copy_from_slice(&src[s..s + width]);
    }
}

impl Adapter for ImageAdapter {
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
        let [in_width, in_height, in_stride, out_width, out_height] =
            [0, 1, 2, 3, 4].map(|i| cx.dim(i));
        let (in_width, in_height, in_stride) = (in_width?, in_height?, in_stride?);
        let (out_width, out_height) = (out_width?, out_height?);
        if in_width == 0 || in_height == 0 {
            return Err(EngineError::format(cx.header_line(), "input image is empty"));
        }
        if out_width == 0 || out_height == 0 {
            return Err(EngineError::format(cx.header_line(), "output image is empty"));
        }
        if in_stride < in_width {
            return Err(EngineError::format(
                cx.header_line(),
                format!("input stride {in_stride} is narrower than the image ({in_width})"),
            ));
        }
        let out_stride = output_stride(out_width).ok_or_else(|| {
            EngineError::format(
                cx.header_line(),
                format!("output width {out_width} has no row stride"),
            )
        })?;
        let in_len = dim_product(cx, "input image", in_width, in_height)?;
        let src_len = dim_product(cx, "strided input", in_stride, in_height)?;
        let out_len = dim_product(cx, "output image", out_width, out_height)?;
        let dst_len = dim_product(cx, "strided output", out_stride, out_height)?;

        let x = read_new(reader, in_len, desc.alignment, desc.fmt)?;
        let (lo, hi) = read_bounds(reader, out_len, desc.alignment, desc.z_format())?;

        let mut src = Vector::zeroed(src_len, desc.alignment, desc.fmt)?;
        let es = x.element_size();
        copy_rows(
            src.bytes_mut(),
            in_stride * es,
            x.bytes(),
            in_width * es,
            in_width * es,
            in_height,
        );
        fill_padding(&mut src, in_width, in_stride);
        let mut dst = Vector::zeroed(dst_len, desc.alignment, desc.z_format())?;
        fill_padding(&mut dst, 0, out_stride);

        cx.data.insert(Slot::X, x);
        cx.data.insert(Slot::Zlo, lo);
        cx.data.insert(Slot::Zhi, hi);
        cx.data
            .insert(Slot::Z, Vector::zeroed(out_len, desc.alignment, desc.z_format())?);
        self.layout = Some(Layout {
            in_width,
            in_height,
            in_stride,
            out_width,
            out_height,
            out_stride,
            src: cx.data.push_aux(src),
            dst: cx.data.push_aux(dst),
        });
        trace!(in_stride, out_stride, "loaded strided image buffers");
        Ok(LoadStatus::ONCE)
    }

    fn process(&mut self, cx: &mut Context, _desc: &TestDesc) -> Result<bool, EngineError> {
        let (Some(kernel), Some(l)) = (self.kernel.as_mut(), self.layout) else {
            return Ok(false);
        };
        let (data, mut guard) = split_guarded(cx);
        let [src, dst] = data.aux_many_mut([l.src, l.dst])?;
        guard.call(Position::Global, || {
            kernel(ImageCall {
                src: &*src,
                src_width: l.in_width,
                src_height: l.in_height,
                src_stride: l.in_stride,
                dst: &mut *dst,
                dst_width: l.out_width,
                dst_height: l.out_height,
                dst_stride: l.out_stride,
            })
        })?;

        let mut ok = true;
        if let Some((row, col)) = padding_damage(src, l.in_width, l.in_stride) {
            guard.note(format!("input padding overwritten at row {row}, column {col}"));
            ok = false;
        }
        if let Some((row, col)) = padding_damage(dst, l.out_width, l.out_stride) {
            guard.note(format!("output padding overwritten at row {row}, column {col}"));
            ok = false;
        }

        let es = dst.element_size();
        let packed = dst.bytes().to_vec();
        let z = data.require_mut(Slot::Z)?;
        copy_rows(
            z.bytes_mut(),
            l.out_width * es,
            &packed,
            l.out_stride * es,
            l.out_width * es,
            l.out_height,
        );
        Ok(ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testeng_vec::{Alignment, BaseFormat, Format};

    const U8: Format = Format::real(BaseFormat::U8);

    #[test]
    fn output_rows_keep_a_padding_element() {
        assert_eq!(output_stride(7), Some(8));
        assert_eq!(output_stride(8), Some(16));
        assert_eq!(output_stride(1), Some(8));
        assert_eq!(output_stride(usize::MAX - 3), None);
    }

    #[test]
    fn padding_damage_is_located() {
        let mut v = Vector::zeroed(3 * 8, Alignment::Aligned, U8).unwrap();
        fill_padding(&mut v, 5, 8);
        assert_eq!(padding_damage(&v, 5, 8), None);
        v.bytes_mut()[8 + 6] ^= 0xff;
        assert_eq!(padding_damage(&v, 5, 8), Some((1, 6)));
    }

    #[test]
    fn rows_are_restrided() {
        let src = [1u8, 2, 3, 4, 5, 6];
        let mut dst = [0u8; 8];
        copy_rows(&mut dst, 4, &src, 3, 3, 2);
        assert_eq!(dst, [1, 2, 3, 0, 4, 5, 6, 0]);
    }
}
