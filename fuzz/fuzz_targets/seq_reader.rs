#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use testeng_errh::{RefState, read_enable_directive};
use testeng_seq::SeqReader;
use testeng_vec::{Alignment, BaseFormat, Format, Vector};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    /// Header fields to request, 1 to 5 dimensions after the two ids.
    dims: u8,
    /// Element count and format of the block read after each header.
    count: u8,
    complex: bool,
    data: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let mut pattern = String::from("%d %d");
    for _ in 0..1 + input.dims % 5 {
        pattern.push_str(" %d");
    }
    let format = if input.complex {
        Format::complex(BaseFormat::Fract16)
    } else {
        Format::real(BaseFormat::Float32)
    };

    let mut reader = SeqReader::new(&input.data[..]);
    // Every iteration consumes input or stops, so this terminates.
    loop {
        let Ok(header) = reader.scan(&pattern) else {
            break;
        };
        if header.eof || header.count() < 2 {
            break;
        }
        match read_enable_directive(&mut reader) {
            Ok(true) => {
                let Ok(refs) = RefState::load(&mut reader) else {
                    break;
                };
                assert!(refs.free().is_ok());
            }
            Ok(false) => {}
            Err(_) => break,
        }
        let Ok(mut v) = Vector::zeroed(usize::from(input.count), Alignment::Unaligned, format)
        else {
            break;
        };
        if reader.read_vector(&mut v).is_err() {
            break;
        }
        assert!(v.check_intact().is_ok());
        assert!(v.free().is_ok());
    }
});
