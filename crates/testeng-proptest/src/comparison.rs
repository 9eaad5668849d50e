//! Bit-level output comparison.

use std::fmt;

use testeng_vec::{Element, Vector};

/// Outcome of comparing two buffers value by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonResult {
    /// Number of values compared.
    pub len: usize,
    /// Number of values whose bits differ.
    pub mismatches: usize,
    /// Index of the first differing value.
    pub first_mismatch: Option<usize>,
    /// The two inputs had different lengths or formats.
    pub shape_mismatch: bool,
}

impl ComparisonResult {
    pub fn is_exact(&self) -> bool {
        self.mismatches == 0 && !self.shape_mismatch
    }
}

impl fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.shape_mismatch {
            return f.write_str("shapes differ");
        }
        match self.first_mismatch {
            None => write!(f, "{} values identical", self.len),
            Some(first) => write!(
                f,
                "{}/{} values differ, first at index {first}",
                self.mismatches, self.len
            ),
        }
    }
}

/// Compares two slices bit for bit.
pub fn compare_bits<T: Element>(a: &[T], b: &[T]) -> ComparisonResult {
    let mut result = ComparisonResult {
        len: a.len().min(b.len()),
        mismatches: 0,
        first_mismatch: None,
        shape_mismatch: a.len() != b.len(),
    };
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        if bytemuck::bytes_of(x) != bytemuck::bytes_of(y) {
            result.mismatches += 1;
            result.first_mismatch.get_or_insert(i);
        }
    }
    result
}

/// Compares the payloads of two vectors base value by base value.
pub fn compare_vectors(a: &Vector, b: &Vector) -> ComparisonResult {
    let size = a.format().base.size();
    let mut result = ComparisonResult {
        len: a.base_len().min(b.base_len()),
        mismatches: 0,
        first_mismatch: None,
        shape_mismatch: a.format() != b.format() || a.count() != b.count(),
    };
    let pairs = a.bytes().chunks_exact(size).zip(b.bytes().chunks_exact(size));
    for (i, (x, y)) in pairs.enumerate() {
        if x != y {
            result.mismatches += 1;
            result.first_mismatch.get_or_insert(i);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use testeng_vec::{Alignment, BaseFormat, Format};

    #[test]
    fn nan_payloads_compare_by_bits() {
        let quiet = f32::from_bits(0x7fc0_0000);
        let other = f32::from_bits(0x7fc0_0001);
        assert!(compare_bits(&[quiet], &[quiet]).is_exact());
        let result = compare_bits(&[1.0, quiet], &[1.0, other]);
        assert_eq!(result.mismatches, 1);
        assert_eq!(result.first_mismatch, Some(1));
        assert_eq!(result.to_string(), "1/2 values differ, first at index 1");
    }

    #[test]
    fn vectors_of_different_shape() {
        let f = Format::real(BaseFormat::I16);
        let a = Vector::from_slice::<i16>(Alignment::Aligned, f, &[1, 2]).unwrap();
        let b = Vector::from_slice::<i16>(Alignment::Unaligned, f, &[1, 2, 3]).unwrap();
        let result = compare_vectors(&a, &b);
        assert!(result.shape_mismatch);
        assert!(!result.is_exact());
        let c = a.try_clone().unwrap();
        assert!(compare_vectors(&a, &c).is_exact());
    }
}
