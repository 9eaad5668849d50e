//! The test-case dispatcher.
//!
//! A file run walks the SEQ file case by case:
//!
//! ```text
//! OPEN -> per case: header -> ERRH reference -> RETAKE loop {
//!             LOAD -> PROCESS -> VALIDATE -> bit-exact -> FREE
//!         } -> CLOSE
//! ```
//!
//! Format and resource errors stop the run. Correctness failures fail the
//! case; a non-verbose run stops at the first failed case.

use std::fmt;
use std::io::{self, BufRead, Stdout, Write};

use testeng_errh::{RefState, read_enable_directive};
use testeng_seq::SeqReader;
use testeng_vec::Vector;
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::context::{Context, Slot};
use crate::desc::{MAX_DIMS, TestDesc};
use crate::error::EngineError;
use crate::report::{ReportEntry, ReportSink};

/// SEQ stream handed to adapters.
pub type SeqStream = SeqReader<Box<dyn BufRead>>;

/// Outcome of [`Adapter::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// The data set is ready. With `retake`, the dispatcher calls `load`
    /// again for another sub-case of the same header after this one.
    Loaded { retake: bool },
    /// The kernel variant this case needs is missing from the build.
    Absent,
}

impl LoadStatus {
    pub const ONCE: Self = Self::Loaded { retake: false };
}

/// Outcome of [`Adapter::process_reference`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    /// Z and W now hold the reference variant's output.
    Computed,
    /// No reference variant is available.
    Unavailable,
}

/// Result of one file run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    NotTested,
}

impl Verdict {
    /// Whether the run counts as successful.
    #[inline]
    pub fn is_success(self) -> bool {
        self != Self::Fail
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "OK",
            Self::Fail => "FAIL",
            Self::NotTested => "NOT TESTED",
        })
    }
}

/// How to load and run one kind of kernel.
///
/// Implemented once per calling-convention family
/// ([`ConventionAdapter`](crate::ConventionAdapter)) and once per domain
/// extension ([`ext`](crate::ext)).
pub trait Adapter {
    /// Kernel name followed by its reference variant's name, if any.
    fn names(&self) -> &[String];

    /// Whether the kernel exists in this build. Absent kernels are
    /// reported as NOT TESTED without reading the SEQ file.
    fn is_present(&self) -> bool;

    /// Allocates per-file resources.
    fn create(&mut self, _cx: &mut Context, _desc: &TestDesc) -> Result<(), EngineError> {
        Ok(())
    }

    /// Releases per-file resources. `Ok(false)` reports damage found while
    /// releasing them.
    fn destroy(&mut self, _cx: &mut Context) -> Result<bool, EngineError> {
        Ok(true)
    }

    /// Allocates and reads the data set of the current (sub-)case.
    fn load(
        &mut self,
        reader: &mut SeqStream,
        cx: &mut Context,
        desc: &TestDesc,
    ) -> Result<LoadStatus, EngineError>;

    /// Calls the kernel. `Ok(false)` fails the case; the reason must have
    /// been noted in the context's diagnostics.
    fn process(&mut self, cx: &mut Context, desc: &TestDesc) -> Result<bool, EngineError>;

    /// Recomputes Z and W with the reference variant.
    fn process_reference(
        &mut self,
        _cx: &mut Context,
        _desc: &TestDesc,
    ) -> Result<Reference, EngineError> {
        Ok(Reference::Unavailable)
    }

    /// Checks the outputs of the current sub-case.
    fn validate(&mut self, cx: &mut Context, _desc: &TestDesc) -> Result<bool, EngineError> {
        cx.validate_outputs()
    }
}

impl<A: Adapter + ?Sized> Adapter for Box<A> {
    fn names(&self) -> &[String] {
        (**self).names()
    }

    fn is_present(&self) -> bool {
        (**self).is_present()
    }

    fn create(&mut self, cx: &mut Context, desc: &TestDesc) -> Result<(), EngineError> {
        (**self).create(cx, desc)
    }

    fn destroy(&mut self, cx: &mut Context) -> Result<bool, EngineError> {
        (**self).destroy(cx)
    }

    fn load(
        &mut self,
        reader: &mut SeqStream,
        cx: &mut Context,
        desc: &TestDesc,
    ) -> Result<LoadStatus, EngineError> {
        (**self).load(reader, cx, desc)
    }

    fn process(&mut self, cx: &mut Context, desc: &TestDesc) -> Result<bool, EngineError> {
        (**self).process(cx, desc)
    }

    fn process_reference(
        &mut self,
        cx: &mut Context,
        desc: &TestDesc,
    ) -> Result<Reference, EngineError> {
        (**self).process_reference(cx, desc)
    }

    fn validate(&mut self, cx: &mut Context, desc: &TestDesc) -> Result<bool, EngineError> {
        (**self).validate(cx, desc)
    }
}

/// Runs kernels against SEQ files and prints their progress.
///
/// # Example
///
/// ```no_run
/// use testeng::{ConventionAdapter, EngineConfig, Fut, Src, Target, TestDesc, TestEngine};
/// use testeng_vec::{BaseFormat, Format};
///
/// let negate = Fut::vec_to_vec(|x: Src<'_, [i16]>, z: &mut [i16]| {
///     if let Src::Separate(x) = x {
///         z.copy_from_slice(x);
///     }
///     z.iter_mut().for_each(|v| *v = v.saturating_neg());
/// });
/// let mut adapter = ConventionAdapter::new(Target::new("vec_neg16x16", negate));
/// let desc = TestDesc::new(Format::real(BaseFormat::Fract16), 1);
///
/// let mut engine = TestEngine::new(EngineConfig::default());
/// let passed = engine.run(&mut adapter, &desc, "vec_neg16x16.seq");
/// ```
#[derive(derive_more::Debug)]
pub struct TestEngine<W: Write = Stdout> {
    config: EngineConfig,
    #[debug(skip)]
    out: W,
    #[debug(skip)]
    sink: Option<Box<dyn ReportSink>>,
    /// The last progress write did not end its line.
    mid_line: bool,
}

impl TestEngine {
    /// Engine printing to standard output.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_output(config, io::stdout())
    }
}

impl<W: Write> TestEngine<W> {
    pub fn with_output(config: EngineConfig, out: W) -> Self {
        Self {
            config,
            out,
            sink: None,
            mid_line: false,
        }
    }

    /// Sends a [`ReportEntry`] for every processed sub-case to `sink`.
    pub fn with_report_sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs `adapter` over the SEQ file `seq_name` of the configured vector
    /// set. Returns `false` only when the kernel failed.
    pub fn run(&mut self, adapter: &mut dyn Adapter, desc: &TestDesc, seq_name: &str) -> bool {
        self.run_verdict(adapter, desc, seq_name).is_success()
    }

    /// Like [`run`](Self::run), distinguishing NOT TESTED from a pass.
    pub fn run_verdict(
        &mut self,
        adapter: &mut dyn Adapter,
        desc: &TestDesc,
        seq_name: &str,
    ) -> Verdict {
        self.begin_file(seq_name);
        if !adapter.is_present() {
            info!(file = seq_name, "kernel absent from this build");
            return self.finish_file(Verdict::NotTested);
        }
        let path = self.config.dirs.resolve(self.config.vector_set, seq_name);
        match SeqReader::open(&path) {
            Ok(reader) => self.run_opened(adapter, desc, seq_name, reader.boxed()),
            Err(err) => {
                info!(%err, "SEQ file unavailable");
                self.finish_file(Verdict::NotTested)
            }
        }
    }

    /// Runs `adapter` over an already opened stream, reported as `name`.
    pub fn run_stream(
        &mut self,
        adapter: &mut dyn Adapter,
        desc: &TestDesc,
        name: &str,
        reader: SeqStream,
    ) -> Verdict {
        self.begin_file(name);
        if !adapter.is_present() {
            info!(file = name, "kernel absent from this build");
            return self.finish_file(Verdict::NotTested);
        }
        self.run_opened(adapter, desc, name, reader)
    }

    fn run_opened(
        &mut self,
        adapter: &mut dyn Adapter,
        desc: &TestDesc,
        name: &str,
        mut reader: SeqStream,
    ) -> Verdict {
        let mut cx = Context::new(desc.errh.unwrap_or_default(), self.config.errh_seed);
        let verdict = match self.run_file(adapter, desc, name, &mut reader, &mut cx) {
            Ok(Some(true)) => Verdict::Pass,
            Ok(Some(false)) => Verdict::Fail,
            Ok(None) => Verdict::NotTested,
            Err(err) => {
                error!(%err, file = name, "file run stopped");
                self.progress_line(&err.to_string());
                Verdict::Fail
            }
        };
        reader.close();
        self.finish_file(verdict)
    }

    /// `Ok(None)` when the kernel turned out to be absent.
    fn run_file(
        &mut self,
        adapter: &mut dyn Adapter,
        desc: &TestDesc,
        name: &str,
        reader: &mut SeqStream,
        cx: &mut Context,
    ) -> Result<Option<bool>, EngineError> {
        if !(1..=MAX_DIMS).contains(&desc.dim_num) {
            return Err(EngineError::Config(format!(
                "{} header dimensions requested, 1 to {MAX_DIMS} supported",
                desc.dim_num
            )));
        }
        adapter.create(cx, desc)?;

        let outcome = self.run_cases(adapter, desc, name, reader, cx);

        // Leftovers of a stopped case still get their guard zones checked.
        let mut clean = cx.free_data();
        if let Err(err) = cx.errh.end_case() {
            cx.note(err.to_string());
            clean = false;
        }
        let destroyed = adapter.destroy(cx);
        self.flush_diagnostics(cx);

        let outcome = outcome?;
        let destroyed = destroyed?;
        Ok(outcome.map(|ok| ok && clean && destroyed))
    }

    fn run_cases(
        &mut self,
        adapter: &mut dyn Adapter,
        desc: &TestDesc,
        name: &str,
        reader: &mut SeqStream,
        cx: &mut Context,
    ) -> Result<Option<bool>, EngineError> {
        let pattern = header_pattern(desc.dim_num);
        let mut file_ok = true;

        loop {
            let line = reader.line();
            let header = reader.scan(&pattern)?;
            if header.eof {
                debug!(file = name, "SEQ file exhausted");
                break;
            }
            let values: Vec<i64> = header.fields.iter().filter_map(|f| f.as_int()).collect();
            if values.len() < 2 + desc.dim_num {
                return Err(EngineError::format(
                    line,
                    format!(
                        "case header has {} of {} fields",
                        values.len(),
                        2 + desc.dim_num
                    ),
                ));
            }
            let (case_num, case_type) = (values[0], values[1]);
            cx.begin_case(case_num, case_type, values[2..].to_vec(), line);
            debug!(case_num, case_type, dims = ?cx.dims(), "case header");

            let enabled = read_enable_directive(reader)?;
            let refs = if enabled {
                RefState::load(reader)?
            } else {
                RefState::empty()
            };
            cx.errh.begin_case(enabled && desc.errh.is_some(), refs)?;

            let Some(mut case_ok) = self.run_case(adapter, desc, name, reader, cx)? else {
                return Ok(None);
            };
            if let Err(err) = cx.errh.end_case() {
                cx.note(err.to_string());
                case_ok = false;
            }

            self.flush_diagnostics(cx);
            if self.config.verbose {
                let status = if case_ok { "OK" } else { "FAIL" };
                self.progress_line(&format!("  case {case_num} ({case_type}): {status}"));
            }
            debug!(case_num, ok = case_ok, "case finished");

            file_ok &= case_ok;
            if !case_ok && !self.config.verbose {
                break;
            }
        }
        Ok(Some(file_ok))
    }

    /// The RETAKE loop of one case.
    fn run_case(
        &mut self,
        adapter: &mut dyn Adapter,
        desc: &TestDesc,
        name: &str,
        reader: &mut SeqStream,
        cx: &mut Context,
    ) -> Result<Option<bool>, EngineError> {
        let mut case_ok = true;
        loop {
            let retake = match adapter.load(reader, cx, desc)? {
                LoadStatus::Absent => {
                    info!(file = name, case = cx.case_num(), "kernel variant absent");
                    cx.free_data();
                    return Ok(None);
                }
                LoadStatus::Loaded { retake } => retake,
            };
            debug!(retake = cx.retake(), bytes = cx.data.byte_size(), "data set loaded");

            let mut ok = adapter.process(cx, desc)?;
            if ok {
                ok = adapter.validate(cx, desc)?;
            }
            ok &= cx.errh.is_passed();
            if ok && desc.bitexact {
                ok = self.cross_check(adapter, cx, desc)?;
            }
            self.report(adapter, desc, name, cx);
            ok &= cx.free_data();

            case_ok &= ok;
            if !retake {
                return Ok(Some(case_ok));
            }
            cx.next_retake();
        }
    }

    /// Compares Z and W bit for bit with the reference variant's output.
    fn cross_check(
        &mut self,
        adapter: &mut dyn Adapter,
        cx: &mut Context,
        desc: &TestDesc,
    ) -> Result<bool, EngineError> {
        let mut produced = Vec::new();
        for slot in [Slot::Z, Slot::W] {
            if let Some(v) = cx.data.get(slot) {
                produced.push((slot, v.try_clone()?));
            }
        }

        cx.reference_run = true;
        let reference = adapter.process_reference(cx, desc);
        cx.reference_run = false;

        let same = match reference {
            Ok(Reference::Unavailable) => {
                cx.note("bit-exact test requested but no reference variant is available");
                Ok(false)
            }
            Ok(Reference::Computed) => compare_outputs(cx, &produced),
            Err(err) => Err(err),
        };

        let mut intact = true;
        for (slot, v) in produced {
            if let Err(violation) = v.free() {
                cx.note(format!("{slot} copy: {violation}"));
                intact = false;
            }
        }
        Ok(same? && intact)
    }

    fn report(&mut self, adapter: &dyn Adapter, desc: &TestDesc, name: &str, cx: &Context) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        sink.record(&ReportEntry {
            functions: adapter.names().to_vec(),
            annotation: desc.annotation.clone(),
            file: name.to_owned(),
            case_type: cx.case_type(),
            data_size: cx.data.byte_size(),
        });
    }

    fn begin_file(&mut self, name: &str) {
        info!(file = name, "running SEQ file");
        self.write(format_args!("{name}... "));
        self.mid_line = true;
        self.flush();
    }

    fn finish_file(&mut self, verdict: Verdict) -> Verdict {
        self.write(format_args!("{verdict}\n"));
        self.mid_line = false;
        self.flush();
        verdict
    }

    fn flush_diagnostics(&mut self, cx: &mut Context) {
        let lines: Vec<String> = cx.diagnostics.drain().collect();
        for line in lines {
            self.progress_line(&format!("  {line}"));
        }
    }

    /// Writes a full line, ending a pending `"<file>... "` first.
    fn progress_line(&mut self, line: &str) {
        if self.mid_line {
            self.write(format_args!("\n"));
            self.mid_line = false;
        }
        self.write(format_args!("{line}\n"));
    }

    fn write(&mut self, args: fmt::Arguments<'_>) {
        if let Err(err) = self.out.write_fmt(args) {
            error!(%err, "progress output failed");
        }
    }

    fn flush(&mut self) {
        if let Err(err) = self.out.flush() {
            error!(%err, "progress output failed");
        }
    }
}

fn header_pattern(dim_num: usize) -> String {
    let mut pattern = String::from("%d %d");
    for _ in 0..dim_num {
        pattern.push_str(" %d");
    }
    pattern
}

fn compare_outputs(cx: &mut Context, produced: &[(Slot, Vector)]) -> Result<bool, EngineError> {
    let mut same = true;
    for (slot, ours) in produced {
        let reference = cx.data.require(*slot)?;
        if (ours.format(), ours.count()) != (reference.format(), reference.count()) {
            let message = format!(
                "{slot} is {} x {} but reference variant gives {} x {}",
                ours.format(),
                ours.count(),
                reference.format(),
                reference.count()
            );
            cx.note(message);
            same = false;
        } else if let Some(i) = ours.first_difference(reference) {
            let message = format!(
                "{slot}[{i}] = {} but reference variant gives {}",
                show(ours, i),
                show(reference, i)
            );
            cx.note(message);
            same = false;
        }
    }
    Ok(same)
}

fn show(v: &Vector, i: usize) -> String {
    v.get_scalar(i)
        .map_or_else(|| "<missing>".to_owned(), |s| s.to_string())
}
