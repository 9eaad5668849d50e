//! The demo test table: one entry per calling shape and domain adapter,
//! each with a generator for its SEQ file.

use std::fs;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use testeng::ext::{
    DctAdapter, DctCall, DctKind, FftAdapter, FftCall, FftIo, FftKind, ImageAdapter, ImageCall,
    MfccAdapter, MfccKernel, MfccParams, image,
};
use testeng::{Adapter, ConventionAdapter, Fut, Overlap, Src, Suite, SuiteEntry, Target, TestDesc};
use testeng_errh::ErrhOptions;
use testeng_proptest::SeqWriter;
use testeng_seq::{VectorDirs, VectorSet};
use testeng_vec::{BaseFormat, Element, Format};
use tracing::debug;

use crate::kernels::{
    MovingAverage, add16, band_log_energy, dct_cos, dct2, decimate, dft, dot16x16, logf, max16,
    modf, mul16, recipf, scale16, twiddle,
};

const Q15: Format = Format::real(BaseFormat::Fract16);
const Q31: Format = Format::real(BaseFormat::Fract32);
const F32: Format = Format::real(BaseFormat::Float32);
const CF32: Format = Format::complex(BaseFormat::Float32);
const U8: Format = Format::real(BaseFormat::U8);

/// Streaming block length of the moving-average entry.
const FIR_BLOCK: i64 = 16;

/// One row of the demo table.
pub(crate) struct Demo {
    pub(crate) file: &'static str,
    desc: fn() -> TestDesc,
    adapter: fn() -> Box<dyn Adapter>,
    vectors: fn(&mut SeqWriter, &mut StdRng, VectorSet),
}

pub(crate) const CATALOG: &[Demo] = &[
    Demo {
        file: "vec_abs16x16.seq",
        desc: || TestDesc::new(Q15, 1).with_overlap(Overlap::XZ),
        adapter: abs16_adapter,
        vectors: abs16_vectors,
    },
    Demo {
        file: "vec_add16x16.seq",
        desc: || {
            TestDesc::new(Q15, 1)
                .with_overlap(Overlap::XZ)
                .with_bitexact()
                .with_annotation("saturating")
        },
        adapter: add16_adapter,
        vectors: add16_vectors,
    },
    Demo {
        file: "vec_scale16x16.seq",
        desc: || TestDesc::new(Q15, 1).with_overlap(Overlap::XZ),
        adapter: scale16_adapter,
        vectors: scale16_vectors,
    },
    Demo {
        file: "vec_dot16x16.seq",
        desc: || TestDesc::new(Q15, 1).with_z_format(Q31),
        adapter: || boxed(Target::new("vec_dot16x16", Fut::vec_vec_to_scalar(dot16x16))),
        vectors: dot16_vectors,
    },
    Demo {
        file: "vec_max16x16.seq",
        desc: || TestDesc::new(Q15, 1),
        adapter: || boxed(Target::new("vec_max16x16", Fut::vec_to_scalar(max16))),
        vectors: max16_vectors,
    },
    Demo {
        file: "vec_modff.seq",
        desc: || TestDesc::new(F32, 1),
        adapter: || boxed(Target::new("vec_modff", Fut::vec_to_vec_pair(modf))),
        vectors: modf_vectors,
    },
    Demo {
        file: "scl_recipf.seq",
        desc: || TestDesc::new(F32, 1).with_errh(ErrhOptions::default()),
        adapter: || boxed(Target::new("scl_recipf", Fut::scalar(recipf))),
        vectors: recipf_vectors,
    },
    Demo {
        file: "scl_logf.seq",
        desc: || TestDesc::new(F32, 1).with_errh(ErrhOptions::default()),
        adapter: || boxed(Target::new("scl_logf", Fut::scalar(logf))),
        vectors: logf_vectors,
    },
    Demo {
        file: "fir_movavgf.seq",
        desc: || TestDesc::new(F32, 2),
        adapter: movavg_adapter,
        vectors: movavg_vectors,
    },
    Demo {
        file: "fft_cplx32.seq",
        desc: || TestDesc::new(CF32, 3),
        adapter: fft_adapter,
        vectors: fft_vectors,
    },
    Demo {
        file: "dct2_32.seq",
        desc: || TestDesc::new(F32, 2),
        adapter: dct_adapter,
        vectors: dct_vectors,
    },
    Demo {
        file: "img_decimate8.seq",
        desc: || TestDesc::new(U8, 5),
        adapter: image_adapter,
        vectors: image_vectors,
    },
    Demo {
        file: "mfcc_bands32.seq",
        desc: || TestDesc::new(F32, 3),
        adapter: || Box::new(MfccAdapter::new("mfcc_bands32", BandEnergy::default())),
        vectors: mfcc_vectors,
    },
];

/// The demo table as a runnable suite.
pub(crate) fn suite() -> Suite {
    let mut suite = Suite::new();
    for demo in CATALOG {
        suite.push(SuiteEntry {
            adapter: (demo.adapter)(),
            desc: (demo.desc)(),
            seq_file: demo.file.to_owned(),
        });
    }
    suite
}

/// Writes every demo SEQ file of `set` below `dirs`. Returns the number of
/// files written.
pub(crate) fn generate(dirs: &VectorDirs, set: VectorSet, seed: u64) -> Result<usize> {
    let root = dirs.root(set);
    fs::create_dir_all(&root).with_context(|| format!("creating {}", root.display()))?;
    let mut rng = StdRng::seed_from_u64(seed);
    for demo in CATALOG {
        let mut seq = SeqWriter::new();
        (demo.vectors)(&mut seq, &mut rng, set);
        let path = dirs.resolve(set, demo.file);
        seq.write_to(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        debug!(path = %path.display(), bytes = seq.as_bytes().len(), "wrote SEQ file");
    }
    Ok(CATALOG.len())
}

fn boxed(target: Target) -> Box<dyn Adapter> {
    Box::new(ConventionAdapter::new(target))
}

/// Vector lengths per set.
fn sizes(set: VectorSet) -> &'static [usize] {
    match set {
        VectorSet::Sanity => &[8],
        VectorSet::Brief => &[1, 8, 33],
        VectorSet::Full => &[1, 2, 7, 8, 33, 256, 1000],
    }
}

/// Contents of an input that may be aliased with the output.
fn input<T: Copy>(src: Src<'_, [T]>, z: &[T]) -> Vec<T> {
    match src {
        Src::Separate(x) => x.to_vec(),
        Src::Aliased => z.to_vec(),
    }
}

fn q15s(rng: &mut StdRng, n: usize) -> Vec<i16> {
    (0..n).map(|_| rng.random()).collect()
}

fn floats(rng: &mut StdRng, n: usize, lo: f32, hi: f32) -> Vec<f32> {
    (0..n).map(|_| rng.random_range(lo..hi)).collect()
}

/// Float bounds around `expected`: NaN and infinities are kept exact,
/// finite values get `abs + rel·|v|` either side.
fn around(expected: &[f64], abs: f64, rel: f64) -> (Vec<f32>, Vec<f32>) {
    expected
        .iter()
        .map(|&v| {
            if v.is_finite() {
                let t = abs + rel * v.abs();
                ((v - t) as f32, (v + t) as f32)
            } else {
                (v as f32, v as f32)
            }
        })
        .unzip()
}

/// A case whose bounds are the exact expected output.
fn exact_case<Z: Element>(
    seq: &mut SeqWriter,
    case_num: usize,
    n: usize,
    inputs: &[&[i16]],
    expected: &[Z],
) {
    seq.header(case_num as i32, 1, &[n as i64]);
    for x in inputs {
        seq.vector(*x);
    }
    seq.vector(expected).vector(expected);
}

fn abs16_adapter() -> Box<dyn Adapter> {
    let abs = Fut::vec_to_vec(|x: Src<'_, [i16]>, z: &mut [i16]| {
        let x = input(x, z);
        for (z, x) in z.iter_mut().zip(x) {
            *z = x.saturating_abs();
        }
    });
    boxed(Target::new("vec_abs16x16", abs))
}

fn abs16_vectors(seq: &mut SeqWriter, rng: &mut StdRng, set: VectorSet) {
    for (case, &n) in sizes(set).iter().enumerate() {
        let mut x = q15s(rng, n);
        x[0] = i16::MIN;
        let z: Vec<i16> = x.iter().map(|v| v.saturating_abs()).collect();
        exact_case(seq, case, n, &[&x[..]], &z);
    }
}

fn add16_adapter() -> Box<dyn Adapter> {
    let add = Fut::vec_vec_to_vec(|x: Src<'_, [i16]>, y: Src<'_, [i16]>, z: &mut [i16]| {
        let (x, y) = (input(x, z), input(y, z));
        for ((z, a), b) in z.iter_mut().zip(x).zip(y) {
            *z = add16(a, b);
        }
    });
    let target = Target::new("vec_add16x16", add)
        .with_twin("scl_add16x16", Fut::scalar_pair(add16));
    boxed(target)
}

fn add16_vectors(seq: &mut SeqWriter, rng: &mut StdRng, set: VectorSet) {
    for (case, &n) in sizes(set).iter().enumerate() {
        let x = q15s(rng, n);
        let y = q15s(rng, n);
        let z: Vec<i16> = x.iter().zip(&y).map(|(&a, &b)| add16(a, b)).collect();
        exact_case(seq, case, n, &[&x[..], &y[..]], &z);
    }
}

fn scale16_adapter() -> Box<dyn Adapter> {
    let scale = Fut::vec_scalar_to_vec(|x: Src<'_, [i16]>, s: i16, z: &mut [i16]| {
        let x = input(x, z);
        scale16(&x, s, z);
    });
    boxed(Target::new("vec_scale16x16", scale))
}

fn scale16_vectors(seq: &mut SeqWriter, rng: &mut StdRng, set: VectorSet) {
    for (case, &n) in sizes(set).iter().enumerate() {
        let x = q15s(rng, n);
        let s: i16 = rng.random();
        let z: Vec<i16> = x.iter().map(|&v| mul16(v, s)).collect();
        exact_case(seq, case, n, &[&x[..], &[s][..]], &z);
    }
}

fn dot16_vectors(seq: &mut SeqWriter, rng: &mut StdRng, set: VectorSet) {
    for (case, &n) in sizes(set).iter().enumerate() {
        let x = q15s(rng, n);
        let y = q15s(rng, n);
        exact_case(seq, case, n, &[&x[..], &y[..]], &[dot16x16(&x, &y)]);
    }
}

fn max16_vectors(seq: &mut SeqWriter, rng: &mut StdRng, set: VectorSet) {
    for (case, &n) in sizes(set).iter().enumerate() {
        let x = q15s(rng, n);
        exact_case(seq, case, n, &[&x[..]], &[max16(&x)]);
    }
}

fn modf_vectors(seq: &mut SeqWriter, rng: &mut StdRng, set: VectorSet) {
    for (case, &n) in sizes(set).iter().enumerate() {
        let x = floats(rng, n, -100.0, 100.0);
        let mut int = vec![0.0f32; n];
        let mut frac = vec![0.0f32; n];
        modf(&x, &mut int, &mut frac);
        seq.header(case as i32, 1, &[n as i64])
            .vector(&x)
            .vector(&int)
            .vector(&int)
            .vector(&frac)
            .vector(&frac);
    }
}

/// Scalar float case with an error-state reference.
fn errh_case(
    seq: &mut SeqWriter,
    case_num: usize,
    x: &[f32],
    expected: &[f64],
    sets: &[(&str, Vec<i32>)],
) {
    seq.header_errh(case_num as i32, 1, &[x.len() as i64], true);
    for (name, indices) in sets {
        if !indices.is_empty() {
            seq.errh_block(name, indices);
        }
    }
    let (lo, hi) = around(expected, 1e-6, 1e-6);
    seq.vector(x).vector(&lo).vector(&hi);
}

fn recipf_vectors(seq: &mut SeqWriter, rng: &mut StdRng, set: VectorSet) {
    for (case, &n) in sizes(set).iter().enumerate() {
        let mut x = floats(rng, n, 0.25, 4.0);
        for v in x.iter_mut().skip(1).step_by(2) {
            *v = -*v;
        }
        x[0] = 0.0;
        let expected: Vec<f64> = x
            .iter()
            .map(|&v| if v == 0.0 { f64::INFINITY } else { 1.0 / f64::from(v) })
            .collect();
        let pole = vec![0];
        errh_case(
            seq,
            case,
            &x,
            &expected,
            &[("ERANGE", pole.clone()), ("FE_DIVBYZERO", pole)],
        );
    }
}

fn logf_vectors(seq: &mut SeqWriter, rng: &mut StdRng, set: VectorSet) {
    for (case, &n) in sizes(set).iter().enumerate() {
        let mut x = floats(rng, n, 0.01, 1000.0);
        x[0] = -1.0;
        let pole: Vec<i32> = if n > 1 {
            x[1] = 0.0;
            vec![1]
        } else {
            Vec::new()
        };
        let expected: Vec<f64> = x
            .iter()
            .map(|&v| match v {
                v if v < 0.0 => f64::NAN,
                0.0 => f64::NEG_INFINITY,
                v => f64::from(v).ln(),
            })
            .collect();
        errh_case(
            seq,
            case,
            &x,
            &expected,
            &[
                ("EDOM", vec![0]),
                ("ERANGE", pole.clone()),
                ("FE_INVALID", vec![0]),
                ("FE_DIVBYZERO", pole),
            ],
        );
    }
}

fn movavg_adapter() -> Box<dyn Adapter> {
    let mut avg = MovingAverage::default();
    let fir = Fut::streaming(move |x: &[f32], z: &mut [f32], block: usize| {
        if block == 0 {
            avg.reset();
        }
        avg.process(x, z);
    });
    boxed(Target::new("fir_movavgf", fir))
}

fn movavg_vectors(seq: &mut SeqWriter, rng: &mut StdRng, set: VectorSet) {
    let taps = MovingAverage::TAPS;
    for (case, &n) in sizes(set).iter().enumerate() {
        let x = floats(rng, n, -1.0, 1.0);
        let expected: Vec<f64> = (0..n)
            .map(|i| {
                let window = &x[i.saturating_sub(taps - 1)..=i];
                window.iter().map(|&v| f64::from(v)).sum::<f64>() / taps as f64
            })
            .collect();
        let (lo, hi) = around(&expected, 1e-6, 1e-5);
        seq.header(case as i32, 1, &[n as i64, FIR_BLOCK])
            .vector(&x)
            .vector(&lo)
            .vector(&hi);
    }
}

fn fft_adapter() -> Box<dyn Adapter> {
    Box::new(FftAdapter::new(
        "fft_cplx32",
        FftKind::Complex,
        |call: FftCall<'_>| {
            let twiddles = call.twiddles;
            match call.io {
                FftIo::OutOfPlace { x, y } => {
                    dft(x.as_slice()?, y.as_mut_slice()?, |k| twiddles.get(k));
                }
                FftIo::InPlace(z) => {
                    let x = z.as_slice::<f32>()?.to_vec();
                    dft(&x, z.as_mut_slice()?, |k| twiddles.get(k));
                }
            }
            Ok(0)
        },
    ))
}

fn fft_vectors(seq: &mut SeqWriter, rng: &mut StdRng, set: VectorSet) {
    let (sizes, frames): (&[usize], usize) = match set {
        VectorSet::Sanity => (&[16], 1),
        VectorSet::Brief => (&[4, 16, 64], 2),
        VectorSet::Full => (&[2, 4, 16, 64, 256, 512], 4),
    };
    for (case, &n) in sizes.iter().enumerate() {
        seq.header(case as i32, 1, &[n as i64, 0, frames as i64]);
        for _ in 0..frames {
            let x = floats(rng, 2 * n, -1.0, 1.0);
            let mut expected = vec![0.0f64; 2 * n];
            for k in 0..n {
                for j in 0..n {
                    let (wr, wi) = twiddle(n, j * k % n);
                    let (xr, xi) = (f64::from(x[2 * j]), f64::from(x[2 * j + 1]));
                    expected[2 * k] += xr * wr - xi * wi;
                    expected[2 * k + 1] += xr * wi + xi * wr;
                }
            }
            let (lo, hi) = around(&expected, 1e-5 * n as f64, 1e-5);
            seq.vector(&x).vector(&lo).vector(&hi);
        }
    }
}

fn dct_adapter() -> Box<dyn Adapter> {
    Box::new(DctAdapter::new("dct2_32", DctKind::Dct2, |call: DctCall<'_>| {
        let tables = call.tables;
        dct2(call.x.as_slice()?, call.z.as_mut_slice()?, |m| tables.cos(m));
        Ok(0)
    }))
}

fn dct_vectors(seq: &mut SeqWriter, rng: &mut StdRng, set: VectorSet) {
    for (case, &n) in sizes(set).iter().enumerate() {
        let x = floats(rng, n, -1.0, 1.0);
        let expected: Vec<f64> = (0..n)
            .map(|k| {
                x.iter()
                    .enumerate()
                    .map(|(i, &v)| f64::from(v) * dct_cos(n, (2 * i + 1) * k))
                    .sum()
            })
            .collect();
        let (lo, hi) = around(&expected, 1e-5 * n as f64, 1e-5);
        seq.header(case as i32, 1, &[n as i64, 0])
            .vector(&x)
            .vector(&lo)
            .vector(&hi);
    }
}

fn image_adapter() -> Box<dyn Adapter> {
    Box::new(ImageAdapter::new("img_decimate8", |call: ImageCall<'_>| {
        decimate(
            call.src.as_slice()?,
            call.src_stride,
            call.dst.as_mut_slice()?,
            call.dst_stride,
            call.dst_width,
            call.dst_height,
        );
        Ok(())
    }))
}

fn image_vectors(seq: &mut SeqWriter, rng: &mut StdRng, set: VectorSet) {
    let shapes: &[(usize, usize)] = match set {
        VectorSet::Sanity => &[(8, 8)],
        VectorSet::Brief => &[(2, 2), (8, 6), (17, 9)],
        VectorSet::Full => &[(2, 2), (8, 6), (17, 9), (64, 48), (321, 17)],
    };
    for (case, &(w, h)) in shapes.iter().enumerate() {
        let pixels: Vec<u8> = (0..w * h).map(|_| rng.random()).collect();
        let (ow, oh) = (w / 2, h / 2);
        let out: Vec<u8> = (0..oh)
            .flat_map(|r| (0..ow).map(move |c| (r, c)))
            .map(|(r, c)| pixels[2 * r * w + 2 * c])
            .collect();
        debug!(w, h, out_stride = ?image::output_stride(ow), "image case");
        let dims = [w, h, w + 5, ow, oh].map(|d| d as i64);
        seq.header(case as i32, 1, &dims)
            .vector(&pixels)
            .vector(&out)
            .vector(&out);
    }
}

/// Log energy per band, frame by frame.
#[derive(Debug, Default)]
struct BandEnergy {
    bands: usize,
}

impl MfccKernel for BandEnergy {
    type In = f32;
    type Out = f32;

    fn init(&mut self, params: &MfccParams) {
        self.bands = params.cepstra;
    }

    fn process_frame(&mut self, frame: &[f32], cepstrum: &mut [f32]) {
        let n = self.bands.min(cepstrum.len());
        band_log_energy(frame, &mut cepstrum[..n]);
    }
}

fn mfcc_vectors(seq: &mut SeqWriter, rng: &mut StdRng, set: VectorSet) {
    let shapes: &[(usize, usize, usize)] = match set {
        VectorSet::Sanity => &[(32, 2, 8)],
        VectorSet::Brief => &[(32, 2, 8), (64, 5, 13)],
        VectorSet::Full => &[(32, 2, 8), (64, 5, 13), (256, 20, 13)],
    };
    for (case, &(frame_len, frames, cepstra)) in shapes.iter().enumerate() {
        let x = floats(rng, frame_len * frames, -1.0, 1.0);
        let mut z = vec![0.0f32; frames * cepstra];
        for (frame, out) in x.chunks_exact(frame_len).zip(z.chunks_exact_mut(cepstra)) {
            band_log_energy(frame, out);
        }
        let expected: Vec<f64> = z.iter().map(|&v| f64::from(v)).collect();
        let (lo, hi) = around(&expected, 1e-5, 1e-5);
        seq.header(case as i32, 1, &[frame_len as i64, frames as i64, cepstra as i64])
            .vector(&x)
            .vector(&lo)
            .vector(&hi);
    }
}
