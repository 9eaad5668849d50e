//! In-memory SEQ file builder.

use std::fs;
use std::io;
use std::path::Path;

use testeng_vec::Element;

/// Builds a SEQ file case by case.
///
/// ```
/// use testeng_proptest::SeqWriter;
///
/// let mut seq = SeqWriter::new();
/// seq.header(1, 0, &[2]).vector::<i16>(&[1, 2]);
/// assert_eq!(seq.as_bytes(), b"1 0 2\n\x01\x00\x02\x00\n");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SeqWriter {
    buf: Vec<u8>,
}

impl SeqWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `caseNum caseType dims...` and ends the line.
    pub fn header(&mut self, case_num: i32, case_type: i32, dims: &[i64]) -> &mut Self {
        self.header_line(case_num, case_type, dims);
        self.buf.push(b'\n');
        self
    }

    /// Header with an `ERRH_ENABLE:` directive.
    pub fn header_errh(
        &mut self,
        case_num: i32,
        case_type: i32,
        dims: &[i64],
        enabled: bool,
    ) -> &mut Self {
        self.header_line(case_num, case_type, dims);
        let value = if enabled { "ON" } else { "OFF" };
        self.buf
            .extend_from_slice(format!(" ERRH_ENABLE: {value}\n").as_bytes());
        self
    }

    /// `ERRH_<name> <count>` followed by the index block. `name` is the
    /// set name without prefix, e.g. `EDOM` or `FE_OVERFLOW`.
    pub fn errh_block(&mut self, name: &str, indices: &[i32]) -> &mut Self {
        self.buf
            .extend_from_slice(format!("ERRH_{name} {}\n", indices.len()).as_bytes());
        self.vector(indices)
    }

    /// A binary block of little-endian base values.
    pub fn vector<T: Element>(&mut self, data: &[T]) -> &mut Self {
        for value in data {
            let bytes = bytemuck::bytes_of(value);
            if cfg!(target_endian = "big") {
                self.buf.extend(bytes.iter().rev());
            } else {
                self.buf.extend_from_slice(bytes);
            }
        }
        self.buf.push(b'\n');
        self
    }

    /// Arbitrary bytes, for malformed-file tests.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        fs::write(path, &self.buf)
    }

    fn header_line(&mut self, case_num: i32, case_type: i32, dims: &[i64]) {
        let mut line = format!("{case_num} {case_type}");
        for dim in dims {
            line.push(' ');
            line.push_str(&dim.to_string());
        }
        self.buf.extend_from_slice(line.as_bytes());
    }
}
