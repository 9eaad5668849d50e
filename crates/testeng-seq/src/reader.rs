//! Token and block reader over a SEQ stream.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use testeng_vec::Vector;
use tracing::{debug, trace};

use crate::error::SeqError;

/// One converted `scan` field.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
}

impl Field {
    /// Integer value of an `Int` or `Uint` field.
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::Uint(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Result of [`SeqReader::scan`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scan {
    /// Fields converted before the first mismatch.
    pub fields: Vec<Field>,
    /// Input ended before anything was converted.
    pub eof: bool,
}

impl Scan {
    /// Number of converted fields.
    #[inline]
    pub fn count(&self) -> usize {
        self.fields.len()
    }
}

/// Reader for one SEQ file.
///
/// Text is consumed byte by byte with a small lookahead so that binary
/// blocks can follow a header without losing bytes to the tokenizer.
#[derive(derive_more::Debug)]
pub struct SeqReader<R> {
    #[debug(skip)]
    inner: R,
    #[debug(skip)]
    pending: VecDeque<u8>,
    line: usize,
    at_line_start: bool,
}

impl SeqReader<BufReader<File>> {
    /// Opens a SEQ file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SeqError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SeqError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "opened SEQ file");
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead + 'static> SeqReader<R> {
    /// Erases the stream type, keeping position and lookahead.
    pub fn boxed(self) -> SeqReader<Box<dyn BufRead>> {
        SeqReader {
            inner: Box::new(self.inner),
            pending: self.pending,
            line: self.line,
            at_line_start: self.at_line_start,
        }
    }
}

impl<R: BufRead> SeqReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
            line: 1,
            at_line_start: true,
        }
    }

    /// Current text line, for diagnostics. Binary payload bytes are not
    /// counted.
    #[inline]
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn close(self) {
        trace!(line = self.line, "closed SEQ stream");
    }

    /// Reads fields following `scanf` semantics.
    ///
    /// Supported conversions are `%d %i %u %x %f %e %g %s %%`, optionally
    /// suppressed with `*`. Whitespace in `pattern` matches any run of
    /// whitespace, newlines included, so a pattern must not end in
    /// whitespace when a binary block follows. Scanning stops at the first
    /// mismatch, leaving the offending byte unread.
    pub fn scan(&mut self, pattern: &str) -> Result<Scan, SeqError> {
        let mut fields = Vec::new();
        let mut hit_eof = false;
        let mut spec = pattern.bytes().peekable();

        while let Some(c) = spec.next() {
            if c.is_ascii_whitespace() {
                hit_eof |= !self.skip_whitespace()?;
                continue;
            }
            if c != b'%' {
                if !self.match_literal(c, &mut hit_eof)? {
                    break;
                }
                continue;
            }

            let suppress = spec.next_if_eq(&b'*').is_some();
            let conv = spec.next().ok_or_else(|| SeqError::BadPattern {
                pattern: pattern.to_owned(),
            })?;
            if !self.skip_whitespace()? {
                hit_eof = true;
                break;
            }
            let field = match conv {
                b'%' => {
                    if !self.match_literal(b'%', &mut hit_eof)? {
                        break;
                    }
                    continue;
                }
                b'd' => self.scan_int(10)?.map(|v| Field::Int(saturate(v))),
                b'i' => self.scan_int(0)?.map(|v| Field::Int(saturate(v))),
                b'u' => self.scan_int(10)?.map(|v| Field::Uint(v as u64)),
                b'x' | b'X' => self.scan_int(16)?.map(|v| Field::Uint(v as u64)),
                b'f' | b'e' | b'g' | b'E' | b'G' => self.scan_float()?.map(Field::Float),
                b's' => self.scan_word()?.map(Field::Str),
                _ => {
                    return Err(SeqError::BadPattern {
                        pattern: pattern.to_owned(),
                    });
                }
            };
            match field {
                Some(field) if !suppress => fields.push(field),
                Some(_) => {}
                None => break,
            }
        }

        let eof = hit_eof && fields.is_empty();
        trace!(pattern, converted = fields.len(), eof, line = self.line, "scan");
        Ok(Scan { fields, eof })
    }

    /// Whether the next line starts with `prefix`.
    ///
    /// Trailing blanks and the newline of the current text line are
    /// consumed; the keyword itself is not.
    pub fn peek_keyword(&mut self, prefix: &str) -> Result<bool, SeqError> {
        if !self.at_line_start {
            self.skip_blanks()?;
            if self.peek()? == Some(b'\n') {
                self.bump();
            }
        }
        for (i, &c) in prefix.as_bytes().iter().enumerate() {
            if self.peek_at(i)? != Some(c) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Next whitespace-delimited token on the current line, if any.
    ///
    /// Never crosses the line end.
    pub fn rest_of_line_keyword(&mut self) -> Result<Option<String>, SeqError> {
        self.skip_blanks()?;
        match self.peek()? {
            None | Some(b'\n') => Ok(None),
            Some(_) => self.scan_word().map_err(SeqError::from),
        }
    }

    /// Fills the payload of `v` from the next binary block.
    pub fn read_vector(&mut self, v: &mut Vector) -> Result<(), SeqError> {
        self.to_line_start()?;
        let line = self.line;
        let mut src = (&mut self.pending).chain(&mut self.inner);
        v.read_from(&mut src).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => SeqError::UnexpectedEof {
                line,
                what: "vector data",
            },
            _ => SeqError::Io(err),
        })?;
        trace!(format = %v.format(), count = v.count(), line, "read vector block");
        self.end_block()
    }

    /// Reads several consecutive binary blocks in order.
    pub fn read_vectors(&mut self, vectors: &mut [&mut Vector]) -> Result<(), SeqError> {
        for v in vectors.iter_mut() {
            self.read_vector(v)?;
        }
        Ok(())
    }

    /// Reads a binary block of `n` little-endian 32-bit words.
    pub fn read_u32s(&mut self, n: usize) -> Result<Vec<u32>, SeqError> {
        self.to_line_start()?;
        let line = self.line;
        let mut raw = vec![0u8; n * 4];
        let mut src = (&mut self.pending).chain(&mut self.inner);
        src.read_exact(&mut raw).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => SeqError::UnexpectedEof {
                line,
                what: "index block",
            },
            _ => SeqError::Io(err),
        })?;
        self.end_block()?;
        Ok(raw
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect())
    }

    fn format_error(&self, message: impl Into<String>) -> SeqError {
        SeqError::Format {
            line: self.line,
            message: message.into(),
        }
    }

    fn peek_at(&mut self, i: usize) -> io::Result<Option<u8>> {
        while self.pending.len() <= i {
            let buf = match self.inner.fill_buf() {
                Ok(buf) => buf,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            if buf.is_empty() {
                return Ok(None);
            }
            let n = buf.len().min(i + 1 - self.pending.len());
            self.pending.extend(&buf[..n]);
            self.inner.consume(n);
        }
        Ok(Some(self.pending[i]))
    }

    #[inline]
    fn peek(&mut self) -> io::Result<Option<u8>> {
        self.peek_at(0)
    }

    /// Consumes one byte that was already peeked.
    fn bump(&mut self) -> Option<u8> {
        let b = self.pending.pop_front()?;
        if b == b'\n' {
            self.line += 1;
            self.at_line_start = true;
        } else {
            self.at_line_start = false;
        }
        Some(b)
    }

    /// Returns false when the input ended.
    fn skip_whitespace(&mut self) -> io::Result<bool> {
        loop {
            match self.peek()? {
                Some(b) if b.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(_) => return Ok(true),
                None => return Ok(false),
            }
        }
    }

    fn skip_blanks(&mut self) -> io::Result<()> {
        while let Some(b' ' | b'\t' | b'\r') = self.peek()? {
            self.bump();
        }
        Ok(())
    }

    fn match_literal(&mut self, c: u8, hit_eof: &mut bool) -> io::Result<bool> {
        match self.peek()? {
            Some(b) if b == c => {
                self.bump();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => {
                *hit_eof = true;
                Ok(false)
            }
        }
    }

    /// Radix 0 auto-detects `0x` (hex) and leading `0` (octal).
    fn scan_int(&mut self, radix: u32) -> io::Result<Option<i128>> {
        let mut text = String::new();
        if let Some(sign @ (b'+' | b'-')) = self.peek()? {
            self.bump();
            text.push(char::from(sign));
        }

        let mut radix = radix;
        if radix == 0 || radix == 16 {
            let hex_prefix = self.peek()? == Some(b'0')
                && matches!(self.peek_at(1)?, Some(b'x' | b'X'))
                && self.peek_at(2)?.is_some_and(|b| b.is_ascii_hexdigit());
            if hex_prefix {
                self.bump();
                self.bump();
                radix = 16;
            } else if radix == 0 {
                radix = if self.peek()? == Some(b'0') { 8 } else { 10 };
            }
        }

        let mut digits = 0usize;
        while let Some(b) = self.peek()? {
            if !char::from(b).is_digit(radix) {
                break;
            }
            self.bump();
            text.push(char::from(b));
            digits += 1;
        }
        if digits == 0 {
            return Ok(None);
        }
        let value = i128::from_str_radix(&text, radix).unwrap_or(if text.starts_with('-') {
            i128::MIN
        } else {
            i128::MAX
        });
        Ok(Some(value))
    }

    fn scan_float(&mut self) -> io::Result<Option<f64>> {
        let mut text = String::new();
        if let Some(sign @ (b'+' | b'-')) = self.peek()? {
            self.bump();
            text.push(char::from(sign));
        }

        if let Some(b'i' | b'I' | b'n' | b'N') = self.peek()? {
            while let Some(b) = self.peek()? {
                if !b.is_ascii_alphabetic() {
                    break;
                }
                self.bump();
                text.push(char::from(b.to_ascii_lowercase()));
            }
            return Ok(text.parse().ok());
        }

        let mut digits = self.take_digits(&mut text)?;
        if self.peek()? == Some(b'.') {
            self.bump();
            text.push('.');
            digits += self.take_digits(&mut text)?;
        }
        if digits == 0 {
            return Ok(None);
        }
        if let Some(b'e' | b'E') = self.peek()? {
            let exp_digit_at = match self.peek_at(1)? {
                Some(b'+' | b'-') => 2,
                _ => 1,
            };
            if self.peek_at(exp_digit_at)?.is_some_and(|b| b.is_ascii_digit()) {
                for _ in 0..exp_digit_at {
                    if let Some(b) = self.bump() {
                        text.push(char::from(b));
                    }
                }
                self.take_digits(&mut text)?;
            }
        }
        Ok(text.parse().ok())
    }

    fn take_digits(&mut self, text: &mut String) -> io::Result<usize> {
        let mut n = 0;
        while let Some(b) = self.peek()? {
            if !b.is_ascii_digit() {
                break;
            }
            self.bump();
            text.push(char::from(b));
            n += 1;
        }
        Ok(n)
    }

    fn scan_word(&mut self) -> io::Result<Option<String>> {
        let mut word = Vec::new();
        while let Some(b) = self.peek()? {
            if b.is_ascii_whitespace() {
                break;
            }
            self.bump();
            word.push(b);
        }
        if word.is_empty() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&word).into_owned()))
    }

    /// Moves to the start of the next line, allowing only blanks before
    /// the newline.
    fn to_line_start(&mut self) -> Result<(), SeqError> {
        while !self.at_line_start {
            match self.peek()? {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.bump();
                }
                Some(b) => {
                    return Err(self.format_error(format!(
                        "unexpected {:?} before binary block",
                        char::from(b)
                    )));
                }
                None => {
                    return Err(SeqError::UnexpectedEof {
                        line: self.line,
                        what: "binary block",
                    });
                }
            }
        }
        Ok(())
    }

    /// Consumes the newline that terminates a binary block. A missing
    /// newline is tolerated only at end of file.
    fn end_block(&mut self) -> Result<(), SeqError> {
        self.at_line_start = false;
        match self.peek()? {
            Some(b'\n') => {
                self.bump();
                Ok(())
            }
            None => {
                self.at_line_start = true;
                Ok(())
            }
            Some(b) => Err(self.format_error(format!(
                "expected newline after binary block, found {b:#04x}"
            ))),
        }
    }
}

fn saturate(v: i128) -> i64 {
    i64::try_from(v).unwrap_or(if v < 0 { i64::MIN } else { i64::MAX })
}
