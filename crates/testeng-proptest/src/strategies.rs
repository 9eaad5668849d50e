//! Proptest strategies for formats and vector data.

use proptest::prelude::*;
use testeng_vec::{BaseFormat, Domain, Format};

/// Any base format.
pub fn base_format() -> impl Strategy<Value = BaseFormat> {
    prop::sample::select(BaseFormat::ALL.to_vec())
}

/// Any format, real or complex.
pub fn format() -> impl Strategy<Value = Format> {
    (base_format(), any::<bool>()).prop_map(|(base, complex)| Format {
        base,
        domain: if complex {
            Domain::Complex
        } else {
            Domain::Real
        },
    })
}

/// Q15 samples with a lower/upper bound pair around each one.
pub fn q15_with_bounds(
    len: impl Into<prop::collection::SizeRange>,
) -> impl Strategy<Value = (Vec<i16>, Vec<i16>, Vec<i16>)> {
    prop::collection::vec((any::<i16>(), 0i16..64, 0i16..64), len).prop_map(|triples| {
        let values = triples.iter().map(|t| t.0).collect();
        let lo = triples.iter().map(|t| t.0.saturating_sub(t.1)).collect();
        let hi = triples.iter().map(|t| t.0.saturating_add(t.2)).collect();
        (values, lo, hi)
    })
}

/// Finite f32 samples in `[-1, 1)`.
pub fn unit_f32(len: impl Into<prop::collection::SizeRange>) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-1.0f32..1.0, len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    #[proptest]
    fn element_size_is_consistent(#[strategy(format())] format: Format) {
        prop_assert_eq!(format.element_size(), format.base.size() * format.parts());
    }

    #[proptest]
    fn bounds_enclose_values(#[strategy(q15_with_bounds(1..32))] data: (Vec<i16>, Vec<i16>, Vec<i16>)) {
        let (values, lo, hi) = data;
        for ((v, l), h) in values.iter().zip(&lo).zip(&hi) {
            prop_assert!(l <= v && v <= h);
        }
    }
}
