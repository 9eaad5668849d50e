//! Structured verification report.

use std::cell::RefCell;
use std::rc::Rc;

/// One processed sub-case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    /// Kernel name, followed by the reference variant's name if any.
    pub functions: Vec<String>,
    pub annotation: String,
    /// SEQ file name as passed to the engine.
    pub file: String,
    /// Semantic case type from the case header.
    pub case_type: i64,
    /// Payload bytes of the inputs and outputs of the sub-case.
    pub data_size: usize,
}

/// Receives a [`ReportEntry`] for every processed sub-case.
///
/// Closures taking `&ReportEntry` are sinks too.
pub trait ReportSink {
    fn record(&mut self, entry: &ReportEntry);
}

impl<F: FnMut(&ReportEntry)> ReportSink for F {
    fn record(&mut self, entry: &ReportEntry) {
        self(entry);
    }
}

/// In-memory sink. Clones share the same log, so one handle can be given
/// to the engine while another reads the entries back.
///
/// # Example
///
/// ```
/// use testeng::{ReportEntry, ReportLog, ReportSink};
///
/// let log = ReportLog::new();
/// let mut sink = log.clone();
/// sink.record(&ReportEntry {
///     functions: vec!["vec_add16x16".into()],
///     annotation: String::new(),
///     file: "vec_add16x16.seq".into(),
///     case_type: 1,
///     data_size: 48,
/// });
/// assert_eq!(log.len(), 1);
/// assert_eq!(log.total_bytes(), 48);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReportLog {
    entries: Rc<RefCell<Vec<ReportEntry>>>,
}

impl ReportLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ReportEntry> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Sum of `data_size` over all entries.
    pub fn total_bytes(&self) -> usize {
        self.entries.borrow().iter().map(|e| e.data_size).sum()
    }
}

impl ReportSink for ReportLog {
    fn record(&mut self, entry: &ReportEntry) {
        self.entries.borrow_mut().push(entry.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(case_type: i64) -> ReportEntry {
        ReportEntry {
            functions: vec!["vec_dot16x16".into()],
            annotation: "aligned".into(),
            file: "vec_dot16x16.seq".into(),
            case_type,
            data_size: 16,
        }
    }

    #[test]
    fn closures_are_sinks() {
        let mut types = Vec::new();
        {
            let mut sink = |e: &ReportEntry| types.push(e.case_type);
            sink.record(&entry(3));
            sink.record(&entry(1));
        }
        assert_eq!(types, [3, 1]);
    }

    #[test]
    fn log_clones_share_entries() {
        let log = ReportLog::new();
        let mut sink: Box<dyn ReportSink> = Box::new(log.clone());
        sink.record(&entry(0));
        sink.record(&entry(2));
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[1].case_type, 2);
        assert_eq!(log.total_bytes(), 32);
    }
}
