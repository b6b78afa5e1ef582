use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use distla::blas::{gemm, GemmAlgorithm};
use distla::{Config, DistMatrix, DistPair, Grid, Orientation, Universe};

fn run_gemm(universe: &Universe, n: usize, alg: GemmAlgorithm) {
    universe
        .run(|world| {
            let grid = Grid::new(&world)?;
            let a = DistMatrix::from_global_fn(&grid, DistPair::MC_MR, n, n, |i, j| (i + j) as f64)?;
            let b = DistMatrix::from_global_fn(&grid, DistPair::MC_MR, n, n, |i, j| (i * j % 7) as f64)?;
            let mut c = DistMatrix::zeros(&grid, DistPair::MC_MR, n, n)?;
            gemm(
                Orientation::Normal,
                Orientation::Normal,
                1.0,
                &a.as_view(),
                &b.as_view(),
                0.0,
                &mut c,
                alg,
            )?;
            Ok(black_box(c.local().data().len()))
        })
        .unwrap();
}

fn benchmark_gemm(c: &mut Criterion) {
    let mut group = c.benchmark_group("gemm");
    group.sample_size(10);

    // 2x2 grid, panels of 32
    let universe = Universe::new(4).with_config(Config::default().with_blocksize(32));
    for n in [64, 192] {
        for alg in [GemmAlgorithm::SummaA, GemmAlgorithm::SummaB, GemmAlgorithm::SummaC] {
            group.bench_with_input(BenchmarkId::new(format!("{alg:?}"), n), &n, |b, &n| {
                b.iter(|| run_gemm(&universe, n, alg))
            });
        }
    }

    group.finish();
}

criterion_group!(benches, benchmark_gemm);
criterion_main!(benches);
