//! Data-driven verification harness for DSP kernels.
//!
//! A [`TestEngine`] runs one kernel against one SEQ test-vector file. An
//! [`Adapter`] knows how to load each case's vectors and how to call the
//! kernel; [`ConventionAdapter`] covers the calling-convention shapes of
//! [`Fut`], and [`ext`] holds adapters for FFT, DCT, image and MFCC
//! kernels.
//!
//! ```
//! use std::io::Cursor;
//!
//! use testeng::{ConventionAdapter, EngineConfig, Fut, SeqStream, Src, Target, TestDesc, TestEngine, Verdict};
//! use testeng_seq::SeqReader;
//! use testeng_vec::{BaseFormat, Format};
//!
//! // One case: N = 2, X = [3, -4], bounds [0, 0]..[5, 5].
//! let mut seq = b"0 0 2\n".to_vec();
//! for block in [[3i16, -4], [0, 0], [5, 5]] {
//!     seq.extend(block.iter().flat_map(|v| v.to_le_bytes()));
//!     seq.push(b'\n');
//! }
//!
//! let abs = Fut::vec_to_vec(|x: Src<'_, [i16]>, z: &mut [i16]| {
//!     if let Src::Separate(x) = x {
//!         z.copy_from_slice(x);
//!     }
//!     z.iter_mut().for_each(|v| *v = v.saturating_abs());
//! });
//! let mut adapter = ConventionAdapter::new(Target::new("vec_abs16x16", abs));
//! let desc = TestDesc::new(Format::real(BaseFormat::Fract16), 1);
//!
//! let mut engine = TestEngine::with_output(EngineConfig::default(), Vec::new());
//! let stream: SeqStream = SeqReader::new(Cursor::new(seq)).boxed();
//! let verdict = engine.run_stream(&mut adapter, &desc, "vec_abs16x16.seq", stream);
//! assert_eq!(verdict, Verdict::Pass);
//! assert_eq!(engine.into_output(), b"vec_abs16x16.seq... OK\n");
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod convention;
pub mod desc;
pub mod engine;
pub mod error;
pub mod ext;
pub mod fut;
pub mod report;
pub mod suite;

pub use config::EngineConfig;
pub use context::{Context, DataSet, Diagnostics, Slot};
pub use convention::ConventionAdapter;
pub use desc::{MAX_DIMS, Overlap, TestDesc};
pub use engine::{Adapter, LoadStatus, Reference, SeqStream, TestEngine, Verdict};
pub use error::EngineError;
pub use fut::{Family, Fut, Src, Target};
pub use report::{ReportEntry, ReportLog, ReportSink};
pub use suite::{Suite, SuiteEntry, SuiteReport};
