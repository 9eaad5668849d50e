//! Test tables: sequences of (adapter, descriptor, SEQ file) entries.

use std::fmt;
use std::io::Write;

use tracing::info;

use crate::desc::TestDesc;
use crate::engine::{Adapter, TestEngine, Verdict};

/// One row of a test table.
#[derive(derive_more::Debug)]
pub struct SuiteEntry {
    #[debug(skip)]
    pub adapter: Box<dyn Adapter>,
    pub desc: TestDesc,
    /// SEQ file name relative to the vector set root.
    pub seq_file: String,
}

impl SuiteEntry {
    pub fn new(adapter: impl Adapter + 'static, desc: TestDesc, seq_file: impl Into<String>) -> Self {
        Self {
            adapter: Box::new(adapter),
            desc,
            seq_file: seq_file.into(),
        }
    }

    /// Whether any of `filters` occurs in the file name or a function name.
    /// An empty filter list selects everything.
    pub fn matches(&self, filters: &[String]) -> bool {
        filters.is_empty()
            || filters.iter().any(|f| {
                self.seq_file.contains(f.as_str())
                    || self.adapter.names().iter().any(|n| n.contains(f.as_str()))
            })
    }
}

/// Outcome of a suite run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteReport {
    pub passed: usize,
    pub failed: usize,
    pub not_tested: usize,
    /// SEQ files that failed, in run order.
    pub failures: Vec<String>,
    /// The run stopped after a failure with entries left.
    pub stopped_early: bool,
}

impl SuiteReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, file: &str, verdict: Verdict) {
        match verdict {
            Verdict::Pass => self.passed += 1,
            Verdict::NotTested => self.not_tested += 1,
            Verdict::Fail => {
                self.failed += 1;
                self.failures.push(file.to_owned());
            }
        }
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} not tested",
            self.passed, self.failed, self.not_tested
        )?;
        if self.stopped_early {
            f.write_str(" (stopped after first failure)")?;
        }
        Ok(())
    }
}

/// A test table, run file by file in order.
#[derive(Debug, Default)]
pub struct Suite {
    entries: Vec<SuiteEntry>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: SuiteEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SuiteEntry] {
        &self.entries
    }

    /// Runs every entry selected by `filters`.
    ///
    /// With `break_on_error` in the engine's configuration, no further
    /// files are scheduled once one has failed.
    pub fn run<W: Write>(&mut self, engine: &mut TestEngine<W>, filters: &[String]) -> SuiteReport {
        let mut report = SuiteReport::default();
        let break_on_error = engine.config().break_on_error;
        let selected: Vec<usize> = (0..self.entries.len())
            .filter(|&i| self.entries[i].matches(filters))
            .collect();

        for (k, &i) in selected.iter().enumerate() {
            let entry = &mut self.entries[i];
            let verdict = engine.run_verdict(&mut *entry.adapter, &entry.desc, &entry.seq_file);
            report.record(&entry.seq_file, verdict);
            if verdict == Verdict::Fail && break_on_error {
                report.stopped_early = k + 1 < selected.len();
                break;
            }
        }
        info!(%report, "suite finished");
        report
    }
}
