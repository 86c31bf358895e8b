use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vkern::kernels::{deinterleave_real_16i, dot_prod_32fc, random_complex};
use vkern::{capabilities, AlignedVec, Kernel};

const SIZES: &[usize] = &[64, 1024, 16 * 1024, 131_071];

fn runnable<F: Copy>(kernel: &Kernel<F>) -> Vec<&'static str> {
    kernel
        .implementations()
        .iter()
        .filter(|imp| capabilities().satisfies(imp.info.requires))
        .map(|imp| imp.name())
        .collect()
}

fn bench_dot_prod(c: &mut Criterion) {
    let mut group = c.benchmark_group("dot_prod_32fc");

    for &n in SIZES {
        let input = AlignedVec::from_slice(&random_complex(n, 1), 64).unwrap();
        let taps = AlignedVec::from_slice(&random_complex(n, 2), 64).unwrap();
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("dispatch", n), &n, |b, _| {
            b.iter(|| black_box(vkern::dot_prod_32fc(black_box(&input), black_box(&taps))))
        });

        for name in runnable(&dot_prod_32fc::KERNEL) {
            group.bench_with_input(BenchmarkId::new(name, n), &n, |b, _| {
                b.iter(|| {
                    black_box(vkern::dot_prod_32fc_manual(&input, &taps, name).unwrap())
                })
            });
        }
    }

    group.finish();
}

fn bench_deinterleave(c: &mut Criterion) {
    let mut group = c.benchmark_group("deinterleave_real_16i");

    for &n in SIZES {
        let input = AlignedVec::from_slice(&random_complex(n, 3), 64).unwrap();
        let mut out = AlignedVec::<i16>::new(n);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("dispatch", n), &n, |b, _| {
            b.iter(|| vkern::deinterleave_real_16i(&mut out, black_box(&input), 30_000.0))
        });

        for name in runnable(&deinterleave_real_16i::KERNEL) {
            group.bench_with_input(BenchmarkId::new(name, n), &n, |b, _| {
                b.iter(|| {
                    vkern::deinterleave_real_16i_manual(&mut out, &input, 30_000.0, name).unwrap()
                })
            });
        }
    }

    group.finish();
}

// Aligned versus unaligned routing on the same data
fn bench_alignment_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("alignment_paths");
    let n = 16 * 1024;
    let source = random_complex(n, 4);
    let taps = AlignedVec::from_slice(&random_complex(n, 5), 64).unwrap();

    let aligned = AlignedVec::from_slice(&source, 64).unwrap();
    let mut misaligned = AlignedVec::<num_complex::Complex32>::misaligned(n, 64, 8).unwrap();
    misaligned.copy_from_slice(&source);
    group.throughput(Throughput::Elements(n as u64));

    group.bench_function("aligned", |b| {
        b.iter(|| black_box(vkern::dot_prod_32fc(&aligned, &taps)))
    });
    group.bench_function("misaligned", |b| {
        b.iter(|| black_box(vkern::dot_prod_32fc(&misaligned, &taps)))
    });

    group.finish();
}

criterion_group!(benches, bench_dot_prod, bench_deinterleave, bench_alignment_paths);
criterion_main!(benches);
