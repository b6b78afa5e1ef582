use criterion::{criterion_group, criterion_main, Criterion};
use distla_kernels::{gemm, transpose, Backend, Orientation};
use std::hint::black_box;

fn benchmark_gemm(c: &mut Criterion) {
    let mut group = c.benchmark_group("gemm");
    let sizes = [64, 128, 256, 512];

    for &size in &sizes {
        let a = vec![1.0f64; size * size];
        let b = vec![1.0f64; size * size];
        let mut out = vec![0.0f64; size * size];

        for backend in [Backend::Reference, Backend::MatrixMultiply] {
            group.bench_function(format!("{backend:?}/{size}x{size}"), |bench| {
                bench.iter(|| {
                    gemm(
                        backend,
                        Orientation::Normal,
                        Orientation::Transpose,
                        size,
                        size,
                        size,
                        1.0,
                        black_box(&a),
                        size,
                        black_box(&b),
                        size,
                        0.0,
                        black_box(&mut out),
                        size,
                    )
                    .unwrap()
                })
            });
        }
    }
    group.finish();
}

fn benchmark_transpose(c: &mut Criterion) {
    let mut group = c.benchmark_group("transpose");
    let sizes = [128, 512, 1024, 2048];

    for &size in &sizes {
        let data = vec![1.0f32; size * size];
        group.bench_function(format!("{size}x{size}"), |b| {
            b.iter(|| transpose(size, size, black_box(&data), size, false).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_gemm, benchmark_transpose);
criterion_main!(benches);
