//! Benchmarks for guard verification and range checking.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use testeng_vec::{Alignment, BaseFormat, Format, Vector, check_range};

const SIZES: [usize; 3] = [64, 1024, 16384];

fn ramp(count: usize, format: Format) -> Vector {
    let data: Vec<f32> = (0..count * format.parts())
        .map(|i| (i as f32 * 0.01).sin())
        .collect();
    Vector::from_slice(Alignment::Unaligned, format, &data).unwrap()
}

fn bench_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate");
    let format = Format::complex(BaseFormat::Fract16);
    for count in SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let v = Vector::zeroed(black_box(count), Alignment::Aligned, format).unwrap();
                v.free().unwrap();
            });
        });
    }
    group.finish();
}

fn bench_check_intact(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_intact");
    for count in SIZES {
        let v = ramp(count, Format::real(BaseFormat::Float32));
        group.bench_with_input(BenchmarkId::from_parameter(count), &v, |b, v| {
            b.iter(|| black_box(v).check_intact().unwrap());
        });
    }
    group.finish();
}

fn bench_check_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_range");
    for format in [
        Format::real(BaseFormat::Float32),
        Format::complex(BaseFormat::Float32),
    ] {
        for count in SIZES {
            let v = ramp(count, format);
            let lo = v.try_clone().unwrap();
            let hi = v.try_clone().unwrap();
            group.bench_function(BenchmarkId::new(format.to_string(), count), |b| {
                b.iter(|| check_range(black_box(&v), &lo, &hi).unwrap());
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_allocate, bench_check_intact, bench_check_range);
criterion_main!(benches);
