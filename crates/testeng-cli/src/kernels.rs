//! Portable reference kernels for the demo table.
//!
//! Plain scalar code, one function per kernel. Fixed-point kernels use
//! Q15/Q31 with round-half-up and saturation.

use std::f64::consts::{PI, TAU};
use std::iter;

use testeng_errh::{Errno, FeFlags, fenv};

#[inline]
fn sat16(v: i64) -> i16 {
    v.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
}

#[inline]
fn sat32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Saturating Q15 addition.
pub(crate) fn add16(x: i16, y: i16) -> i16 {
    x.saturating_add(y)
}

/// Q15 product, rounded.
pub(crate) fn mul16(x: i16, y: i16) -> i16 {
    sat16((i64::from(x) * i64::from(y) + (1 << 14)) >> 15)
}

/// Q15 dot product accumulated into Q31.
pub(crate) fn dot16x16(x: &[i16], y: &[i16]) -> i32 {
    let acc: i64 = x
        .iter()
        .zip(y)
        .map(|(&a, &b)| i64::from(a) * i64::from(b))
        .sum();
    sat32(acc << 1)
}

pub(crate) fn max16(x: &[i16]) -> i16 {
    x.iter().copied().max().unwrap_or(i16::MIN)
}

/// Q15 vector scaled by a Q15 scalar.
pub(crate) fn scale16(x: &[i16], s: i16, z: &mut [i16]) {
    for (z, &x) in z.iter_mut().zip(x) {
        *z = mul16(x, s);
    }
}

/// Integer and fractional parts, both with the sign of the input.
pub(crate) fn modf(x: &[f32], int: &mut [f32], frac: &mut [f32]) {
    for ((&x, i), f) in x.iter().zip(int).zip(frac) {
        *i = x.trunc();
        *f = x - x.trunc();
    }
}

/// Reciprocal reporting the pole at zero.
pub(crate) fn recipf(x: f32) -> f32 {
    if x == 0.0 {
        fenv::set_errno(Errno::Erange);
        fenv::raise(FeFlags::DIVBYZERO);
        f32::INFINITY.copysign(x)
    } else {
        1.0 / x
    }
}

/// Natural logarithm reporting domain and pole errors.
pub(crate) fn logf(x: f32) -> f32 {
    if x < 0.0 || x.is_nan() {
        if !x.is_nan() {
            fenv::set_errno(Errno::Edom);
            fenv::raise(FeFlags::INVALID);
        }
        f32::NAN
    } else if x == 0.0 {
        fenv::set_errno(Errno::Erange);
        fenv::raise(FeFlags::DIVBYZERO);
        f32::NEG_INFINITY
    } else {
        x.ln()
    }
}

/// Moving average over the last `TAPS` samples, history kept across
/// blocks.
#[derive(Debug, Default)]
pub(crate) struct MovingAverage {
    history: [f32; Self::TAPS],
    pos: usize,
}

impl MovingAverage {
    pub(crate) const TAPS: usize = 4;

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn process(&mut self, x: &[f32], z: &mut [f32]) {
        for (z, &x) in z.iter_mut().zip(x) {
            self.history[self.pos] = x;
            self.pos = (self.pos + 1) % Self::TAPS;
            *z = self.history.iter().sum::<f32>() / Self::TAPS as f32;
        }
    }
}

/// Direct complex DFT over interleaved values, `exp(-2πik/N)` kernel.
pub(crate) fn dft(x: &[f32], z: &mut [f32], twiddle: impl Fn(usize) -> (f64, f64)) {
    let n = x.len() / 2;
    for k in 0..n {
        let (mut re, mut im) = (0.0f64, 0.0f64);
        for j in 0..n {
            let (wr, wi) = twiddle(j * k % n);
            let (xr, xi) = (f64::from(x[2 * j]), f64::from(x[2 * j + 1]));
            re += xr * wr - xi * wi;
            im += xr * wi + xi * wr;
        }
        z[2 * k] = re as f32;
        z[2 * k + 1] = im as f32;
    }
}

/// Twiddle factor `exp(-2πik/N)` computed directly.
pub(crate) fn twiddle(n: usize, k: usize) -> (f64, f64) {
    let phase = TAU * k as f64 / n as f64;
    (phase.cos(), -phase.sin())
}

/// Unnormalised DCT-II.
pub(crate) fn dct2(x: &[f32], z: &mut [f32], cos: impl Fn(usize) -> f64) {
    for (k, z) in z.iter_mut().enumerate() {
        *z = x
            .iter()
            .enumerate()
            .map(|(i, &v)| f64::from(v) * cos((2 * i + 1) * k))
            .sum::<f64>() as f32;
    }
}

/// `cos(πm / 2N)`.
pub(crate) fn dct_cos(n: usize, m: usize) -> f64 {
    (PI * m as f64 / (2 * n) as f64).cos()
}

/// 2:1 decimation in both directions over strided rows.
pub(crate) fn decimate(
    src: &[u8],
    src_stride: usize,
    dst: &mut [u8],
    dst_stride: usize,
    dst_width: usize,
    dst_height: usize,
) {
    for r in 0..dst_height {
        for c in 0..dst_width {
            dst[r * dst_stride + c] = src[2 * r * src_stride + 2 * c];
        }
    }
}

/// Log energy of `bands` equal slices of a frame.
pub(crate) fn band_log_energy(frame: &[f32], bands: &mut [f32]) {
    let width = frame.len().div_ceil(bands.len().max(1)).max(1);
    let chunks = frame.chunks(width).chain(iter::repeat(&[][..]));
    for (band, chunk) in bands.iter_mut().zip(chunks) {
        let energy: f64 = chunk.iter().map(|&v| f64::from(v) * f64::from(v)).sum();
        *band = energy.max(1e-10).log10() as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn q15_arithmetic_saturates() {
        assert_eq!(add16(i16::MAX, 1), i16::MAX);
        assert_eq!(mul16(i16::MIN, i16::MIN), i16::MAX);
        assert_eq!(mul16(0x4000, 0x4000), 0x2000);
        assert_eq!(dot16x16(&[i16::MIN; 4], &[i16::MIN; 4]), i32::MAX);
        assert_eq!(dot16x16(&[0x4000], &[0x4000]), 0x2000_0000);
    }

    #[test]
    fn poles_and_domain_errors_are_reported() {
        fenv::clear();
        assert_eq!(recipf(0.0), f32::INFINITY);
        assert_eq!(fenv::sample().errno, Errno::Erange);
        fenv::clear();
        assert!(logf(-1.0).is_nan());
        assert_eq!(fenv::sample().errno, Errno::Edom);
        assert!(fenv::sample().flags.contains(FeFlags::INVALID));
        fenv::clear();
    }

    #[test]
    fn moving_average_carries_history() {
        let mut avg = MovingAverage::default();
        let mut z = [0.0; 2];
        avg.process(&[4.0, 4.0], &mut z);
        assert_eq!(z, [1.0, 2.0]);
        avg.process(&[4.0, 4.0], &mut z);
        assert_eq!(z, [3.0, 4.0]);
        avg.reset();
        avg.process(&[4.0], &mut z[..1]);
        assert_eq!(z[0], 1.0);
    }

    #[test]
    fn dft_of_impulse_is_flat() {
        let mut z = [0.0f32; 8];
        dft(&[1., 0., 0., 0., 0., 0., 0., 0.], &mut z, |k| twiddle(4, k));
        assert_eq!(z, [1., 0., 1., 0., 1., 0., 1., 0.]);
    }

    #[test]
    fn band_energy_is_logarithmic() {
        let mut bands = [0.0f32; 2];
        band_log_energy(&[10.0, 0.0, 1.0, 0.0], &mut bands);
        assert!((bands[0] - 2.0).abs() < 1e-6);
        assert!(bands[1].abs() < 1e-6);
    }
}
