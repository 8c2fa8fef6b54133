//! Performance benchmarks for the company registry.

use company_registry::{
    Address, LogStore, MemoryBackend, NewCompany, PageRequest, RecordBackend, Registry,
    SortDirection, SortField, StoreConfig,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tempfile::TempDir;

fn company(i: usize) -> NewCompany {
    NewCompany::new(
        format!("Company {}", i % 997),
        format!("Director {}", i % 101),
        "+7 000 123 45 67",
        Address::new("Moscow", "Lenina", i.to_string()),
    )
}

fn filled_registry(count: usize) -> Registry<MemoryBackend> {
    let backend = MemoryBackend::new();
    for i in 0..count {
        backend.insert(company(i)).unwrap();
    }
    Registry::new(backend)
}

/// Benchmark a filtered, sorted page over a warm snapshot
fn bench_get_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_page");

    for count in [100, 1_000, 10_000] {
        let registry = filled_registry(count);
        let request = PageRequest::new(2, 5)
            .with_filter("director 1")
            .with_sort(SortField::CompanyName, SortDirection::Desc);
        registry.get_page(&request).unwrap();

        group.bench_with_input(BenchmarkId::new("records", count), &request, |b, request| {
            b.iter(|| black_box(registry.get_page(request).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark a full reload of the snapshot
fn bench_reload(c: &mut Criterion) {
    let mut group = c.benchmark_group("reload");

    for count in [100, 1_000, 10_000] {
        let registry = filled_registry(count);
        group.bench_with_input(BenchmarkId::new("records", count), &count, |b, _| {
            b.iter(|| black_box(registry.reload().unwrap()));
        });
    }

    group.finish();
}

/// Benchmark durable inserts into the log store
fn bench_log_insert(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = LogStore::open(StoreConfig {
        path: dir.path().join("companies"),
        sync_interval: 1_000,
        ..Default::default()
    })
    .unwrap();

    let mut i = 0;
    c.bench_function("log_insert", |b| {
        b.iter(|| {
            i += 1;
            black_box(store.insert(company(i)).unwrap());
        });
    });
}

criterion_group!(benches, bench_get_page, bench_reload, bench_log_insert);
criterion_main!(benches);
