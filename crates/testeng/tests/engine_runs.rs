//! End-to-end runs of the dispatcher over in-memory SEQ files.

use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use testeng::{
    Adapter, Context, ConventionAdapter, EngineConfig, EngineError, Fut, LoadStatus, Overlap,
    Reference, ReportLog, SeqStream, Slot, Src, Target, TestDesc, TestEngine, Verdict,
};
use testeng_errh::{ErrhOptions, Errno, FeFlags, fenv};
use testeng_proptest::SeqWriter;
use testeng_seq::SeqReader;
use testeng_vec::{Alignment, BaseFormat, Format, Vector};

const Q15: Format = Format::real(BaseFormat::Fract16);
const Q31: Format = Format::real(BaseFormat::Fract32);
const F32: Format = Format::real(BaseFormat::Float32);

fn stream(seq: &SeqWriter) -> SeqStream {
    SeqReader::new(Cursor::new(seq.as_bytes().to_vec())).boxed()
}

fn run_with(
    config: EngineConfig,
    adapter: &mut dyn Adapter,
    desc: &TestDesc,
    seq: &SeqWriter,
) -> (Verdict, String) {
    let mut engine = TestEngine::with_output(config, Vec::new());
    let verdict = engine.run_stream(adapter, desc, "case.seq", stream(seq));
    let out = String::from_utf8(engine.into_output()).unwrap();
    (verdict, out)
}

fn run(adapter: &mut dyn Adapter, desc: &TestDesc, seq: &SeqWriter) -> (Verdict, String) {
    run_with(EngineConfig::default(), adapter, desc, seq)
}

fn verbose() -> EngineConfig {
    EngineConfig {
        verbose: true,
        ..Default::default()
    }
}

fn negate() -> Fut {
    Fut::vec_to_vec(|x: Src<'_, [i16]>, z: &mut [i16]| {
        if let Src::Separate(x) = x {
            z.copy_from_slice(x);
        }
        z.iter_mut().for_each(|v| *v = v.saturating_neg());
    })
}

/// One `vXvZ` case with bounds equal to the negated input.
fn negate_case(seq: &mut SeqWriter, case_num: i32, x: &[i16]) {
    let z: Vec<i16> = x.iter().map(|v| v.saturating_neg()).collect();
    seq.header(case_num, 1, &[x.len() as i64])
        .vector(x)
        .vector(&z)
        .vector(&z);
}

#[test]
fn q15_vector_kernel_passes_and_frees_cleanly() {
    let mut seq = SeqWriter::new();
    negate_case(&mut seq, 0, &[1, 2, 3, 4, 5, 6, 7, 8]);

    let log = ReportLog::new();
    let mut engine = TestEngine::with_output(EngineConfig::default(), Vec::new())
        .with_report_sink(log.clone());
    let mut adapter = ConventionAdapter::new(Target::new("vec_neg16x16", negate()));
    let desc = TestDesc::new(Q15, 1).with_annotation("aligned");
    let verdict = engine.run_stream(&mut adapter, &desc, "vec_neg16x16.seq", stream(&seq));

    assert_eq!(verdict, Verdict::Pass);
    assert_eq!(engine.into_output(), b"vec_neg16x16.seq... OK\n");
    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].functions, ["vec_neg16x16"]);
    assert_eq!(entries[0].annotation, "aligned");
    assert_eq!(entries[0].case_type, 1);
    // X and Z, 8 Q15 values each.
    assert_eq!(entries[0].data_size, 32);
}

#[test]
fn absent_kernel_is_not_tested() {
    let mut seq = SeqWriter::new();
    seq.raw(b"garbage that is never read");
    let mut adapter = ConventionAdapter::new(Target::absent("vec_neg16x16"));
    let (verdict, out) = run(&mut adapter, &TestDesc::new(Q15, 1), &seq);
    assert_eq!(verdict, Verdict::NotTested);
    assert!(verdict.is_success());
    assert_eq!(out, "case.seq... NOT TESTED\n");
}

#[test]
fn missing_seq_file_is_not_tested() {
    let config = EngineConfig {
        dirs: testeng_seq::VectorDirs::under("/nonexistent/testeng/vectors"),
        ..Default::default()
    };
    let mut engine = TestEngine::with_output(config, Vec::new());
    let mut adapter = ConventionAdapter::new(Target::new("vec_neg16x16", negate()));
    assert!(engine.run(&mut adapter, &TestDesc::new(Q15, 1), "vec_neg16x16.seq"));
    assert_eq!(engine.into_output(), b"vec_neg16x16.seq... NOT TESTED\n");
}

#[test]
fn range_violation_names_vector_index_and_bounds() {
    let mut seq = SeqWriter::new();
    seq.header(0, 1, &[3])
        .vector::<i16>(&[1, 2, 3])
        .vector::<i16>(&[-1, -2, -3])
        .vector::<i16>(&[-1, -2, -3]);
    let wrong = Fut::vec_to_vec(|_: Src<'_, [i16]>, z: &mut [i16]| z.copy_from_slice(&[-1, -2, 7]));
    let mut adapter = ConventionAdapter::new(Target::new("vec_neg16x16", wrong));
    let (verdict, out) = run(&mut adapter, &TestDesc::new(Q15, 1), &seq);
    assert_eq!(verdict, Verdict::Fail);
    assert_eq!(out, "case.seq... \n  Z[2] = 7 outside [-3, -3]\nFAIL\n");
}

#[test]
fn quiet_run_stops_at_first_failed_case() {
    let mut seq = SeqWriter::new();
    for case in 0..3 {
        seq.header(case, 0, &[1])
            .vector::<i16>(&[1])
            .vector::<i16>(&[0])
            .vector::<i16>(&[0]);
    }
    let calls = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&calls);
    let kernel = Fut::vec_to_vec(move |_: Src<'_, [i16]>, z: &mut [i16]| {
        *counter.borrow_mut() += 1;
        z[0] = 1;
    });
    let mut adapter = ConventionAdapter::new(Target::new("f", kernel));
    let (verdict, _) = run(&mut adapter, &TestDesc::new(Q15, 1), &seq);
    assert_eq!(verdict, Verdict::Fail);
    assert_eq!(*calls.borrow(), 1);
}

#[test]
fn verbose_run_reports_every_case() {
    let mut seq = SeqWriter::new();
    negate_case(&mut seq, 0, &[1, 2]);
    seq.header(1, 3, &[1])
        .vector::<i16>(&[5])
        .vector::<i16>(&[5])
        .vector::<i16>(&[5]);
    negate_case(&mut seq, 2, &[-4]);

    let mut adapter = ConventionAdapter::new(Target::new("vec_neg16x16", negate()));
    let (verdict, out) = run_with(verbose(), &mut adapter, &TestDesc::new(Q15, 1), &seq);
    assert_eq!(verdict, Verdict::Fail);
    assert_eq!(
        out,
        "case.seq... \n  case 0 (1): OK\n  Z[0] = -5 outside [5, 5]\n  case 1 (3): FAIL\n  case 2 (1): OK\nFAIL\n"
    );
}

#[test]
fn short_header_stops_the_run() {
    let mut seq = SeqWriter::new();
    seq.raw(b"0 0\n");
    let mut adapter = ConventionAdapter::new(Target::new("vec_neg16x16", negate()));
    let (verdict, out) = run(&mut adapter, &TestDesc::new(Q15, 1), &seq);
    assert_eq!(verdict, Verdict::Fail);
    assert!(
        out.contains("format error at line 1: case header has 2 of 3 fields"),
        "{out}"
    );
}

#[test]
fn truncated_vector_block_stops_the_run() {
    let mut seq = SeqWriter::new();
    seq.header(0, 0, &[4]).raw(&[1, 0, 2, 0]);
    let mut adapter = ConventionAdapter::new(Target::new("vec_neg16x16", negate()));
    let (verdict, out) = run(&mut adapter, &TestDesc::new(Q15, 1), &seq);
    assert_eq!(verdict, Verdict::Fail);
    assert!(out.ends_with("FAIL\n"));
}

#[test]
fn write_past_the_payload_fails_the_case() {
    let mut seq = SeqWriter::new();
    seq.header(0, 0, &[2])
        .vector::<i16>(&[1, 2])
        .vector::<i16>(&[0, 0])
        .vector::<i16>(&[0, 0]);
    let overrun = Fut::VecToVec(Box::new(|_x: Src<'_, Vector>, z: &mut Vector| {
        let (storage, payload) = z.whole_mut();
        storage[payload.end] ^= 0xff;
        Ok(())
    }));
    let mut adapter = ConventionAdapter::new(Target::new("vec_overrun", overrun));
    let (verdict, out) = run(&mut adapter, &TestDesc::new(Q15, 1), &seq);
    assert_eq!(verdict, Verdict::Fail);
    assert!(out.contains("  Z: guard zone corrupted"), "{out}");
}

#[test]
fn odd_cases_run_aliased() {
    let mut seq = SeqWriter::new();
    negate_case(&mut seq, 0, &[1, 2, 3]);
    negate_case(&mut seq, 1, &[4, 5, 6]);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&seen);
    let kernel = Fut::vec_to_vec(move |x: Src<'_, [i16]>, z: &mut [i16]| {
        match x {
            Src::Separate(x) => {
                record.borrow_mut().push(("separate", z.to_vec()));
                z.copy_from_slice(x);
            }
            Src::Aliased => record.borrow_mut().push(("aliased", z.to_vec())),
        }
        z.iter_mut().for_each(|v| *v = -*v);
    });
    let mut adapter = ConventionAdapter::new(Target::new("vec_neg16x16", kernel));
    let desc = TestDesc::new(Q15, 1).with_overlap(Overlap::XZ);
    let (verdict, _) = run(&mut adapter, &desc, &seq);

    assert_eq!(verdict, Verdict::Pass);
    assert_eq!(
        *seen.borrow(),
        [("separate", vec![0, 0, 0]), ("aliased", vec![4, 5, 6])]
    );
}

#[test]
fn alias_of_different_size_fails_with_diagnostic() {
    let mut seq = SeqWriter::new();
    seq.header(1, 0, &[2])
        .vector::<i16>(&[1, 2])
        .vector::<i32>(&[0, 0])
        .vector::<i32>(&[0, 0]);
    let widen = Fut::vec_to_vec(|_: Src<'_, [i16]>, _: &mut [i32]| {});
    let mut adapter = ConventionAdapter::new(Target::new("vec_widen", widen));
    let desc = TestDesc::new(Q15, 1)
        .with_z_format(Q31)
        .with_overlap(Overlap::XZ);
    let (verdict, out) = run(&mut adapter, &desc, &seq);
    assert_eq!(verdict, Verdict::Fail);
    assert!(
        out.contains("cannot alias X (REAL|FRACT16 x 2) with Z (REAL|FRACT32 x 2): sizes differ"),
        "{out}"
    );
}

#[test]
fn bitexact_twin_agreement_passes() {
    let mut seq = SeqWriter::new();
    negate_case(&mut seq, 0, &[1, -2, i16::MIN, 4]);
    let target = Target::new("vec_neg16x16", negate())
        .with_twin("scl_neg16x16", Fut::scalar(|x: i16| x.saturating_neg()));
    let mut adapter = ConventionAdapter::new(target);
    let (verdict, out) = run(&mut adapter, &TestDesc::new(Q15, 1).with_bitexact(), &seq);
    assert_eq!(verdict, Verdict::Pass, "{out}");
}

#[test]
fn bitexact_disagreement_fails() {
    let mut seq = SeqWriter::new();
    // Bounds wide enough that only the cross-check can fail.
    seq.header(0, 0, &[2])
        .vector::<i16>(&[10, 20])
        .vector::<i16>(&[-100, -100])
        .vector::<i16>(&[100, 100]);
    let target = Target::new("vec_neg16x16", negate())
        .with_twin("scl_neg16x16", Fut::scalar(|x: i16| -x + 1));
    let mut adapter = ConventionAdapter::new(target);
    let (verdict, out) = run(&mut adapter, &TestDesc::new(Q15, 1).with_bitexact(), &seq);
    assert_eq!(verdict, Verdict::Fail);
    assert!(out.contains("Z[0] = -10 but reference variant gives -9"), "{out}");
}

#[test]
fn bitexact_without_twin_fails() {
    let mut seq = SeqWriter::new();
    negate_case(&mut seq, 0, &[1]);
    let mut adapter = ConventionAdapter::new(Target::new("vec_neg16x16", negate()));
    let (verdict, out) = run(&mut adapter, &TestDesc::new(Q15, 1).with_bitexact(), &seq);
    assert_eq!(verdict, Verdict::Fail);
    assert!(out.contains("no reference variant"), "{out}");
}

#[test]
fn twin_of_other_family_is_rejected() {
    let mut seq = SeqWriter::new();
    negate_case(&mut seq, 0, &[1]);
    let target = Target::new("vec_neg16x16", negate())
        .with_twin("vec_sum16x16", Fut::vec_to_scalar(|x: &[i16]| x.iter().sum::<i16>()));
    let mut adapter = ConventionAdapter::new(target);
    let (verdict, out) = run(&mut adapter, &TestDesc::new(Q15, 1).with_bitexact(), &seq);
    assert_eq!(verdict, Verdict::Fail);
    assert!(out.contains("invalid test configuration"), "{out}");
}

/// A kernel whose reference variant returns Z with one extra element.
struct LongerReference(ConventionAdapter);

impl Adapter for LongerReference {
    fn names(&self) -> &[String] {
        self.0.names()
    }

    fn is_present(&self) -> bool {
        self.0.is_present()
    }

    fn load(
        &mut self,
        reader: &mut SeqStream,
        cx: &mut Context,
        desc: &TestDesc,
    ) -> Result<LoadStatus, EngineError> {
        self.0.load(reader, cx, desc)
    }

    fn process(&mut self, cx: &mut Context, desc: &TestDesc) -> Result<bool, EngineError> {
        self.0.process(cx, desc)
    }

    fn process_reference(
        &mut self,
        cx: &mut Context,
        _desc: &TestDesc,
    ) -> Result<Reference, EngineError> {
        let z = cx.data.require(Slot::Z)?;
        let mut values = z.as_slice::<i16>()?.to_vec();
        values.push(0);
        let longer = Vector::from_slice(Alignment::Aligned, z.format(), &values)?;
        let _replaced = cx.data.insert(Slot::Z, longer);
        Ok(Reference::Computed)
    }
}

#[test]
fn bitexact_reference_of_other_length_fails() {
    let mut seq = SeqWriter::new();
    negate_case(&mut seq, 0, &[1, 2]);
    let mut adapter = LongerReference(ConventionAdapter::new(Target::new(
        "vec_neg16x16",
        negate(),
    )));
    let (verdict, out) = run(&mut adapter, &TestDesc::new(Q15, 1).with_bitexact(), &seq);
    assert_eq!(verdict, Verdict::Fail);
    assert!(
        out.contains("Z is REAL|FRACT16 x 2 but reference variant gives REAL|FRACT16 x 3"),
        "{out}"
    );
}

/// Natural logarithm reporting domain and pole errors.
fn log_kernel(correct: bool) -> Fut {
    Fut::scalar(move |x: f32| {
        if x < 0.0 {
            if correct {
                fenv::set_errno(Errno::Edom);
            }
            fenv::raise(FeFlags::INVALID);
            f32::NAN
        } else if x == 0.0 {
            fenv::set_errno(Errno::Erange);
            fenv::raise(FeFlags::DIVBYZERO);
            f32::NEG_INFINITY
        } else {
            x.ln()
        }
    })
}

fn log_case(seq: &mut SeqWriter) {
    seq.header_errh(0, 0, &[3], true)
        .errh_block("EDOM", &[0])
        .errh_block("ERANGE", &[1])
        .errh_block("FE_INVALID", &[0])
        .errh_block("FE_DIVBYZERO", &[1])
        .vector::<f32>(&[-1.0, 0.0, 1.0])
        .vector::<f32>(&[f32::NAN, f32::NEG_INFINITY, 0.0])
        .vector::<f32>(&[f32::NAN, f32::NEG_INFINITY, 0.0]);
}

#[test]
fn error_state_matches_reference() {
    let mut seq = SeqWriter::new();
    log_case(&mut seq);
    let mut adapter = ConventionAdapter::new(Target::new("scl_logf", log_kernel(true)));
    let desc = TestDesc::new(F32, 1).with_errh(ErrhOptions::default());
    let (verdict, out) = run(&mut adapter, &desc, &seq);
    assert_eq!(verdict, Verdict::Pass, "{out}");
}

#[test]
fn missing_errno_fails_with_position() {
    let mut seq = SeqWriter::new();
    log_case(&mut seq);
    let mut adapter = ConventionAdapter::new(Target::new("scl_logf", log_kernel(false)));
    let desc = TestDesc::new(F32, 1).with_errh(ErrhOptions::default());
    let (verdict, out) = run(&mut adapter, &desc, &seq);
    assert_eq!(verdict, Verdict::Fail);
    assert!(out.contains("element 0: EDOM expected but not raised"), "{out}");
}

#[test]
fn error_state_is_ignored_without_options() {
    let mut seq = SeqWriter::new();
    log_case(&mut seq);
    let mut adapter = ConventionAdapter::new(Target::new("scl_logf", log_kernel(false)));
    let (verdict, out) = run(&mut adapter, &TestDesc::new(F32, 1), &seq);
    assert_eq!(verdict, Verdict::Pass, "{out}");
}

#[test]
fn streaming_kernel_sees_blocks_in_order() {
    let mut seq = SeqWriter::new();
    let x: Vec<f32> = (0..10).map(|v| v as f32).collect();
    seq.header(0, 0, &[10, 4]).vector(&x).vector(&x).vector(&x);

    let blocks = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&blocks);
    let copy = Fut::streaming(move |x: &[f32], z: &mut [f32], index: usize| {
        record.borrow_mut().push((index, x.len()));
        z.copy_from_slice(x);
    });
    let mut adapter = ConventionAdapter::new(Target::new("fir_copy", copy));
    let (verdict, out) = run(&mut adapter, &TestDesc::new(F32, 2), &seq);
    assert_eq!(verdict, Verdict::Pass, "{out}");
    assert_eq!(*blocks.borrow(), [(0, 4), (1, 4), (2, 2)]);
}

#[test]
fn pair_and_reduction_shapes_load_their_bounds() {
    let mut seq = SeqWriter::new();
    seq.header(0, 0, &[3])
        .vector::<f32>(&[1.0, 2.0, 3.0])
        .vector::<f32>(&[6.0])
        .vector::<f32>(&[6.0]);
    let sum = Fut::vec_to_scalar(|x: &[f32]| x.iter().sum::<f32>());
    let mut adapter = ConventionAdapter::new(Target::new("vec_sumf", sum));
    assert_eq!(run(&mut adapter, &TestDesc::new(F32, 1), &seq).0, Verdict::Pass);

    let mut seq = SeqWriter::new();
    seq.header(0, 0, &[2])
        .vector::<f32>(&[0.0, 1.0])
        .vector::<f32>(&[0.0, 1.0])
        .vector::<f32>(&[0.0, 1.0])
        .vector::<f32>(&[0.0, 2.0])
        .vector::<f32>(&[0.0, 2.0]);
    let split = Fut::vec_to_vec_pair(|x: &[f32], z: &mut [f32], w: &mut [f32]| {
        z.copy_from_slice(x);
        w.iter_mut().zip(x).for_each(|(w, x)| *w = 2.0 * x);
    });
    let mut adapter = ConventionAdapter::new(Target::new("vec_split", split));
    assert_eq!(run(&mut adapter, &TestDesc::new(F32, 1), &seq).0, Verdict::Pass);
}

#[test]
fn scalar_second_operand_is_read_as_one_element() {
    let mut seq = SeqWriter::new();
    seq.header(0, 0, &[3])
        .vector::<i16>(&[1, 2, 3])
        .vector::<i16>(&[10])
        .vector::<i16>(&[11, 12, 13])
        .vector::<i16>(&[11, 12, 13]);
    let offset = Fut::vec_scalar_to_vec(|x: Src<'_, [i16]>, y: i16, z: &mut [i16]| {
        if let Src::Separate(x) = x {
            z.copy_from_slice(x);
        }
        z.iter_mut().for_each(|v| *v += y);
    });
    let mut adapter = ConventionAdapter::new(Target::new("vec_offset16", offset));
    assert_eq!(run(&mut adapter, &TestDesc::new(Q15, 1), &seq).0, Verdict::Pass);
}
