use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use nj_tree::engines::{NjAlgorithm, join};
use nj_tree::matrix::distance_matrix::DistanceMatrix;

fn make_distance_matrix(n: usize, seed: u64) -> DistanceMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut m = DistanceMatrix::new(n);
    for i in 1..n {
        for j in 0..i {
            m.set_distance(i, j, rng.gen_range(0.0..10.0)).unwrap();
        }
    }
    m
}

fn bench_nj_variants(c: &mut Criterion) {
    let mut group = c.benchmark_group("nj_variants");
    group.sample_size(10);
    for &n in &[100usize, 200, 400] {
        let dist = make_distance_matrix(n, 4242);
        for algorithm in [NjAlgorithm::Original, NjAlgorithm::Fast, NjAlgorithm::Rapid] {
            group.bench_with_input(BenchmarkId::new(algorithm.as_str(), n), &dist, |b, d| {
                b.iter(|| {
                    let _ = join(black_box(d), algorithm);
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_nj_variants);
criterion_main!(benches);
