use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use facedb::{DEFAULT_DIM, FeatureStore, normalized};

fn random_unit_vec(dim: usize, seed: u64) -> Vec<f32> {
    let mut v = Vec::with_capacity(dim);
    let mut state = seed;
    for _ in 0..dim {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        v.push(((state >> 33) as f32) / (u32::MAX as f32) - 0.5);
    }
    normalized(&v)
}

fn populated(dir: &std::path::Path, n: usize) -> FeatureStore {
    let mut store = FeatureStore::open(dir.join("bench.txt")).unwrap();
    for i in 0..n {
        store
            .upsert(&format!("p{i:05}"), "", &random_unit_vec(DEFAULT_DIM, i as u64), 1.0)
            .unwrap();
    }
    store
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    for n in [10usize, 100, 1000] {
        let dir = tempfile::tempdir().unwrap();
        let store = populated(dir.path(), n);
        let query = random_unit_vec(DEFAULT_DIM, 7_777);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| black_box(store.identify(black_box(&query), 0.6)));
        });
    }
    group.finish();
}

fn bench_reload(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let store = populated(dir.path(), 500);
    let path = store.path().to_path_buf();
    drop(store);

    c.bench_function("open_500", |b| {
        b.iter(|| black_box(FeatureStore::open(&path).unwrap().len()));
    });
}

criterion_group!(benches, bench_search, bench_reload);
criterion_main!(benches);
