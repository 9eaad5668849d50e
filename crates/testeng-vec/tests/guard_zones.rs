//! Out-of-bounds writes are caught by the guard zones.

use testeng_vec::{Alignment, BaseFormat, Format, GUARD_BYTES, GuardSide, Vector};

const FORMATS: [Format; 4] = [
    Format::real(BaseFormat::U8),
    Format::real(BaseFormat::Fract16),
    Format::complex(BaseFormat::Fract32),
    Format::complex(BaseFormat::Float64),
];

#[test]
fn untouched_vectors_free_cleanly() {
    for format in FORMATS {
        for alignment in [Alignment::Aligned, Alignment::Unaligned] {
            for count in [0, 1, 3, 16, 17] {
                let v = Vector::zeroed(count, alignment, format).unwrap();
                assert!(v.free().is_ok(), "{format} x {count} {alignment:?}");
            }
        }
    }
}

#[test]
fn every_guard_byte_is_watched() {
    let format = Format::real(BaseFormat::I16);
    for distance in 1..=GUARD_BYTES {
        for side in [GuardSide::Head, GuardSide::Tail] {
            let mut v = Vector::zeroed(5, Alignment::Unaligned, format).unwrap();
            let (storage, payload) = v.whole_mut();
            let pos = match side {
                GuardSide::Head => payload.start - distance,
                GuardSide::Tail => payload.end + distance - 1,
            };
            storage[pos] = !storage[pos];
            let err = v.free().unwrap_err();
            assert_eq!(err.side, side);
            assert_eq!(err.distance, distance);
        }
    }
}

#[test]
fn nearest_corruption_is_reported_first() {
    let mut v = Vector::zeroed(4, Alignment::Aligned, Format::real(BaseFormat::Float32)).unwrap();
    let (storage, payload) = v.whole_mut();
    storage[payload.end + 10] ^= 1;
    storage[payload.end + 2] ^= 1;
    let err = v.check_intact().unwrap_err();
    assert_eq!(err.distance, 3);
}

#[test]
fn guard_damage_survives_payload_rewrite() {
    let mut v = Vector::zeroed(8, Alignment::Aligned, Format::real(BaseFormat::Fract16)).unwrap();
    let (storage, payload) = v.whole_mut();
    storage[payload.start - 1] ^= 0x80;
    v.as_mut_slice::<i16>().unwrap().fill(0x1234);
    assert!(v.check_intact().is_err());
}

#[test]
fn clones_get_independent_guards() {
    let mut src = Vector::zeroed(8, Alignment::Aligned, Format::real(BaseFormat::I32)).unwrap();
    let copy = src.try_clone().unwrap();
    let (storage, payload) = src.whole_mut();
    storage[payload.end] ^= 0xff;
    assert!(src.free().is_err());
    assert!(copy.free().is_ok());
}
