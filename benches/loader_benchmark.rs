/// Benchmarks for graph loading throughput
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use waterfall::error::HistoryError;
use waterfall::git::CommitRecord;
use waterfall::graph::SqliteGraphStore;
use waterfall::loader::GraphLoader;
use waterfall::pipeline;

/// Synthetic history spread over a handful of authors
fn synthetic_history(count: usize) -> Vec<CommitRecord> {
    (0..count)
        .map(|i| CommitRecord {
            hash: format!("{:040x}", i),
            author_email: format!("dev{}@example.com", i % 7),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
        })
        .collect()
}

fn as_results(history: &[CommitRecord]) -> Vec<Result<CommitRecord, HistoryError>> {
    history.iter().cloned().map(Ok).collect()
}

fn bench_fresh_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("fresh_ingest");

    for size in [100, 1_000, 5_000] {
        let history = synthetic_history(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &history, |b, history| {
            b.iter(|| {
                let store = SqliteGraphStore::open_in_memory().unwrap();
                let mut loader = GraphLoader::new(store);
                let report = pipeline::ingest(&mut loader, "bench/repo", as_results(history)).unwrap();
                black_box(report)
            });
        });
    }

    group.finish();
}

fn bench_reingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("reingest");
    let history = synthetic_history(1_000);

    // Every commit already recorded: measures the matched path
    let store = SqliteGraphStore::open_in_memory().unwrap();
    let mut loader = GraphLoader::new(store);
    pipeline::ingest(&mut loader, "bench/repo", as_results(&history)).unwrap();
    let mut store = Some(loader.into_store());

    group.throughput(Throughput::Elements(history.len() as u64));
    group.bench_function("1000_matched", |b| {
        b.iter(|| {
            let mut loader = GraphLoader::new(store.take().unwrap());
            let report = pipeline::ingest(&mut loader, "bench/repo", as_results(&history)).unwrap();
            store = Some(loader.into_store());
            black_box(report)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_fresh_ingest, bench_reingest);
criterion_main!(benches);
