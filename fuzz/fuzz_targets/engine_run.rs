#![no_main]

use std::io::{Cursor, sink};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use testeng::ext::{ImageAdapter, ImageCall, MfccAdapter, MfccKernel, MfccParams};
use testeng::{
    Adapter, ConventionAdapter, EngineConfig, Fut, Overlap, Src, Target, TestDesc, TestEngine,
};
use testeng_errh::ErrhOptions;
use testeng_seq::SeqReader;
use testeng_vec::{BaseFormat, Format, VectorError};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    shape: u8,
    overlap: bool,
    errh: bool,
    bitexact: bool,
    verbose: bool,
    seq: Vec<u8>,
}

fn target(shape: u8) -> Target {
    match shape {
        0 => Target::new(
            "vec_neg",
            Fut::vec_to_vec(|x: Src<'_, [i16]>, z: &mut [i16]| {
                if let Src::Separate(x) = x {
                    z.copy_from_slice(x);
                }
                z.iter_mut().for_each(|v| *v = v.saturating_neg());
            }),
        )
        .with_twin("scl_neg", Fut::scalar(|x: i16| x.saturating_neg())),
        1 => Target::new(
            "vec_add",
            Fut::scalar_pair(|x: i16, y: i16| x.saturating_add(y)),
        ),
        2 => Target::new(
            "vec_sum",
            Fut::vec_to_scalar(|x: &[i16]| x.iter().fold(0i16, |a, &b| a.saturating_add(b))),
        ),
        _ => Target::new(
            "fir_copy",
            Fut::streaming(|x: &[i16], z: &mut [i16], _block: usize| z.copy_from_slice(x)),
        ),
    }
}

/// Copies the overlapping part of the image, row by row.
fn copy_image(call: ImageCall<'_>) -> Result<(), VectorError> {
    let src = call.src.as_slice::<u8>()?;
    let dst = call.dst.as_mut_slice::<u8>()?;
    for r in 0..call.dst_height.min(call.src_height) {
        for c in 0..call.dst_width.min(call.src_width) {
            dst[r * call.dst_stride + c] = src[r * call.src_stride + c];
        }
    }
    Ok(())
}

/// Fills every coefficient with the frame mean.
struct FrameMean;

impl MfccKernel for FrameMean {
    type In = f32;
    type Out = f32;

    fn init(&mut self, _params: &MfccParams) {}

    fn process_frame(&mut self, frame: &[f32], cepstrum: &mut [f32]) {
        let mean = frame.iter().sum::<f32>() / frame.len() as f32;
        cepstrum.fill(mean);
    }
}

fn adapter(shape: u8) -> (Box<dyn Adapter>, TestDesc) {
    match shape % 6 {
        4 => (
            Box::new(ImageAdapter::new("img_copy", copy_image)),
            TestDesc::new(Format::real(BaseFormat::U8), 5),
        ),
        5 => (
            Box::new(MfccAdapter::new("mfcc_mean", FrameMean)),
            TestDesc::new(Format::real(BaseFormat::Float32), 3),
        ),
        shape => {
            let dim_num = if shape == 3 { 2 } else { 1 };
            (
                Box::new(ConventionAdapter::new(target(shape))),
                TestDesc::new(Format::real(BaseFormat::Fract16), dim_num),
            )
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    let (mut adapter, mut desc) = adapter(input.shape);
    if input.overlap {
        desc = desc.with_overlap(Overlap::XZ);
    }
    if input.errh {
        desc = desc.with_errh(ErrhOptions::default());
    }
    if input.bitexact {
        desc = desc.with_bitexact();
    }
    let config = EngineConfig {
        verbose: input.verbose,
        ..Default::default()
    };

    let mut engine = TestEngine::with_output(config, sink());
    let stream = SeqReader::new(Cursor::new(input.seq)).boxed();
    // Any verdict is acceptable; malformed input must not panic.
    let _ = engine.run_stream(&mut *adapter, &desc, "fuzz.seq", stream);
});
