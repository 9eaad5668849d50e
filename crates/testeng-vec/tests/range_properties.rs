//! Property tests for range checking and cloning.

use proptest::prelude::*;
use test_strategy::proptest;
use testeng_vec::{Alignment, BaseFormat, Format, Vector, check_range};

const Q31: Format = Format::real(BaseFormat::Fract32);
const CF32: Format = Format::complex(BaseFormat::Float32);

fn q31(data: &[i32]) -> Vector {
    Vector::from_slice(Alignment::Aligned, Q31, data).unwrap()
}

#[proptest]
fn tightening_bounds_never_turns_fail_into_pass(
    #[strategy(prop::collection::vec((any::<i32>(), any::<i32>(), any::<i32>()), 1..48))]
    triples: Vec<(i32, i32, i32)>,
    #[strategy(prop::collection::vec((0u32..1000, 0u32..1000), #triples.len()))]
    shrink: Vec<(u32, u32)>,
) {
    let values: Vec<i32> = triples.iter().map(|t| t.0).collect();
    let lo: Vec<i32> = triples.iter().map(|t| t.1.min(t.2)).collect();
    let hi: Vec<i32> = triples.iter().map(|t| t.1.max(t.2)).collect();
    let tight_lo: Vec<i32> = lo
        .iter()
        .zip(&shrink)
        .map(|(&l, &(d, _))| l.saturating_add_unsigned(d))
        .collect();
    let tight_hi: Vec<i32> = hi
        .iter()
        .zip(&shrink)
        .map(|(&h, &(_, d))| h.saturating_sub_unsigned(d))
        .collect();

    let v = q31(&values);
    let loose = check_range(&v, &q31(&lo), &q31(&hi)).unwrap();
    let tight = check_range(&v, &q31(&tight_lo), &q31(&tight_hi)).unwrap();
    prop_assert!(!tight.is_ok() || loose.is_ok());
}

#[proptest]
fn clone_is_within_its_own_bounds(
    #[strategy(prop::collection::vec(any::<f32>(), 0..64))] raw: Vec<f32>,
    unaligned: bool,
) {
    let mut data = raw;
    if data.len() % 2 == 1 {
        data.pop();
    }
    let alignment = if unaligned {
        Alignment::Unaligned
    } else {
        Alignment::Aligned
    };
    let v = Vector::from_slice(alignment, CF32, &data).unwrap();
    let copy = v.try_clone().unwrap();
    prop_assert!(check_range(&copy, &v, &v).unwrap().is_ok());
    prop_assert!(copy.bit_eq(&v));
    prop_assert_eq!(copy.offset(), v.offset());
}

#[proptest]
fn values_inside_bounds_pass(
    #[strategy(prop::collection::vec(any::<i32>(), 1..64))] values: Vec<i32>,
) {
    let lo: Vec<i32> = values.iter().map(|v| v.saturating_sub(1)).collect();
    let hi: Vec<i32> = values.iter().map(|v| v.saturating_add(1)).collect();
    prop_assert!(check_range(&q31(&values), &q31(&lo), &q31(&hi)).unwrap().is_ok());
}
