//! MFCC feature extraction, frame by frame with kernel state.
//!
//! Header dimensions are `frame_len frames cepstra`; blocks are X holding
//! every frame back to back, then Zlo and Zhi holding every cepstrum.

use testeng_errh::Position;
use testeng_vec::{Element, Vector};

use super::{dim_product, frame_count};
use crate::context::{Context, Slot};
use crate::convention::{read_bounds, read_new, split_guarded};
use crate::desc::TestDesc;
use crate::engine::{Adapter, LoadStatus, SeqStream};
use crate::error::EngineError;

/// Parameters of one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MfccParams {
    /// Samples per frame.
    pub frame_len: usize,
    pub frames: usize,
    /// Coefficients per frame.
    pub cepstra: usize,
    pub case_type: i64,
}

/// A stateful MFCC kernel.
pub trait MfccKernel {
    type In: Element;
    type Out: Element;

    /// Resets the kernel for a new case.
    fn init(&mut self, params: &MfccParams);

    fn process_frame(&mut self, frame: &[Self::In], cepstrum: &mut [Self::Out]);
}

/// Adapter for [`MfccKernel`]s.
#[derive(derive_more::Debug)]
pub struct MfccAdapter<K> {
    names: Vec<String>,
    #[debug(skip)]
    kernel: Option<K>,
}

impl<K: MfccKernel> MfccAdapter<K> {
    pub fn new(name: impl Into<String>, kernel: K) -> Self {
        Self {
            names: vec![name.into()],
            kernel: Some(kernel),
        }
    }

    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
            kernel: None,
        }
    }
}

fn params(cx: &Context) -> Result<MfccParams, EngineError> {
    let p = MfccParams {
        frame_len: cx.dim(0)?,
        frames: frame_count(cx, 1)?,
        cepstra: cx.dim(2)?,
        case_type: cx.case_type(),
    };
    if p.frame_len == 0 || p.cepstra == 0 {
        return Err(EngineError::format(
            cx.header_line(),
            format!(
                "frame length {} and cepstral count {} must be positive",
                p.frame_len, p.cepstra
            ),
        ));
    }
    Ok(p)
}

impl<K: MfccKernel> Adapter for MfccAdapter<K> {
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
        let p = params(cx)?;
        let in_len = dim_product(cx, "frame block", p.frames, p.frame_len)?;
        let out_len = dim_product(cx, "cepstrum block", p.frames, p.cepstra)?;
        let x = read_new(reader, in_len, desc.alignment, desc.fmt)?;
        cx.data.insert(Slot::X, x);
        let (lo, hi) = read_bounds(reader, out_len, desc.alignment, desc.z_format())?;
        cx.data.insert(Slot::Zlo, lo);
        cx.data.insert(Slot::Zhi, hi);
        cx.data
            .insert(Slot::Z, Vector::zeroed(out_len, desc.alignment, desc.z_format())?);
        Ok(LoadStatus::ONCE)
    }

    fn process(&mut self, cx: &mut Context, _desc: &TestDesc) -> Result<bool, EngineError> {
        let Some(kernel) = self.kernel.as_mut() else {
            return Ok(false);
        };
        let p = params(cx)?;
        kernel.init(&p);

        let (data, mut guard) = split_guarded(cx);
        let [x, z] = data.many_mut([Slot::X, Slot::Z])?;
        let frames = x.as_slice::<K::In>()?;
        let cepstra = z.as_mut_slice::<K::Out>()?;
        // Both steps are positive: `params` rejects empty frames and cepstra.
        let in_step = frames.len() / p.frames;
        let out_step = cepstra.len() / p.frames;
        for (f, (frame, cepstrum)) in frames
            .chunks_exact(in_step)
            .zip(cepstra.chunks_exact_mut(out_step))
            .enumerate()
        {
            guard.call(Position::Index(f), || {
                kernel.process_frame(frame, cepstrum);
                Ok(())
            })?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testeng_errh::ErrhOptions;

    #[derive(Default)]
    struct Energy {
        frames_seen: usize,
    }

    impl MfccKernel for Energy {
        type In = f32;
        type Out = f32;

        fn init(&mut self, _params: &MfccParams) {
            self.frames_seen = 0;
        }

        fn process_frame(&mut self, frame: &[f32], cepstrum: &mut [f32]) {
            self.frames_seen += 1;
            cepstrum.fill(frame.iter().map(|v| v * v).sum());
        }
    }

    #[test]
    fn params_come_from_the_header() {
        let mut cx = Context::new(ErrhOptions::default(), 0);
        cx.begin_case(1, 2, vec![256, 4, 13], 1);
        let p = params(&cx).unwrap();
        assert_eq!((p.frame_len, p.frames, p.cepstra, p.case_type), (256, 4, 13, 2));
        let adapter = MfccAdapter::new("mfcc32", Energy::default());
        assert!(adapter.is_present());
        assert!(!MfccAdapter::<Energy>::absent("mfcc16").is_present());
    }

    #[test]
    fn empty_frames_or_cepstra_are_rejected() {
        let mut cx = Context::new(ErrhOptions::default(), 0);
        cx.begin_case(0, 1, vec![0, 4, 13], 5);
        let err = params(&cx).unwrap_err();
        assert_eq!(
            err.to_string(),
            "format error at line 5: frame length 0 and cepstral count 13 must be positive"
        );
        cx.begin_case(0, 1, vec![256, 4, 0], 6);
        assert!(params(&cx).is_err());
    }
}
