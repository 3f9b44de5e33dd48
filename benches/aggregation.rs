use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, ArrayView1};
use bastion_fl::{pairwise_distances, select, AggregationPolicy, Update};

fn synthetic(n_participants: usize, n_params: usize) -> Vec<Array1<f64>> {
    (0..n_participants)
        .map(|i| Array1::from_shape_fn(n_params, |j| ((i * n_params + j) as f64).sin()))
        .collect()
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("selection");

    for &n in &[10usize, 50, 100] {
        for &n_params in &[1_000usize, 100_000] {
            let vectors = synthetic(n, n_params);
            let ids: Vec<String> = (0..n).map(|i| format!("p{:03}", i)).collect();
            let f = (n - 3) / 2;
            let id = format!("{}n_{}p", n, n_params);

            group.bench_with_input(BenchmarkId::new("pairwise_distances", &id), &vectors, |b, vectors| {
                let views: Vec<ArrayView1<'_, f64>> = vectors.iter().map(|v| v.view()).collect();
                b.iter(|| pairwise_distances(&views).unwrap())
            });

            group.bench_with_input(BenchmarkId::new("multi_krum", &id), &vectors, |b, vectors| {
                let views: Vec<ArrayView1<'_, f64>> = vectors.iter().map(|v| v.view()).collect();
                b.iter(|| select(&views, &ids, f).unwrap())
            });
        }
    }
    group.finish();
}

fn bench_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");

    for &n in &[10usize, 50] {
        for &n_params in &[1_000usize, 100_000] {
            let updates: Vec<Update> = synthetic(n, n_params)
                .into_iter()
                .enumerate()
                .map(|(i, v)| Update::new(format!("p{:03}", i), 1, v).with_stake(100.0 + i as f64))
                .collect();
            let id = format!("{}n_{}p", n, n_params);

            for policy in [
                AggregationPolicy::Mean,
                AggregationPolicy::StakeWeightedMedian,
                AggregationPolicy::StakeWeightedTrimmedMean { trim_fraction: 0.2 },
            ] {
                group.bench_with_input(BenchmarkId::new(policy.name(), &id), &updates, |b, updates| {
                    let refs: Vec<&Update> = updates.iter().collect();
                    b.iter(|| policy.try_aggregate(&refs).unwrap())
                });
            }
        }
    }
    group.finish();
}

criterion_group!(benches, bench_selection, bench_aggregation);
criterion_main!(benches);
