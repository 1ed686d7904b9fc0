use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use evbus::{MemoryPool, MonotonicClock, ObjectStore};
use std::{sync::Arc, time::Duration};

const WAIT: Option<Duration> = Some(Duration::from_millis(100));

fn benchmark_set_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("ObjectStore_Set");

    for payload_size in [16usize, 256, 4096].iter() {
        group.throughput(Throughput::Bytes(*payload_size as u64));
        group.bench_with_input(
            BenchmarkId::new("heap_backed", payload_size),
            payload_size,
            |b, &size| {
                let clock = Arc::new(MonotonicClock::new());
                let store = ObjectStore::new(16, clock).unwrap();
                let payload = vec![0xA5u8; size];
                b.iter(|| {
                    store.set(1, &payload, 0, WAIT).unwrap();
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("pool_backed", payload_size),
            payload_size,
            |b, &size| {
                let clock = Arc::new(MonotonicClock::new());
                let pool = MemoryPool::new(4096, 32).unwrap();
                let store = ObjectStore::with_pool(16, Some(pool), clock).unwrap();
                let payload = vec![0xA5u8; size];
                b.iter(|| {
                    store.set(1, &payload, 0, WAIT).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn benchmark_get_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("ObjectStore_Get");
    let clock = Arc::new(MonotonicClock::new());
    let store = ObjectStore::new(16, clock).unwrap();
    store.set(1, &[0x5Au8; 256], 0, WAIT).unwrap();

    group.throughput(Throughput::Bytes(256));
    group.bench_function("get_256b", |b| {
        let mut out = [0u8; 256];
        b.iter(|| {
            store.get(1, &mut out, WAIT).unwrap();
        });
    });

    group.bench_function("timestamp_peek", |b| {
        b.iter(|| {
            store.timestamp_of(1).unwrap();
        });
    });

    group.finish();
}

fn benchmark_pool_alloc_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("MemoryPool");

    group.bench_function("alloc_free_cycle", |b| {
        let pool = MemoryPool::new(256, 64).unwrap();
        b.iter(|| {
            let buf = pool.alloc(128).unwrap();
            drop(buf);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_set_throughput,
    benchmark_get_throughput,
    benchmark_pool_alloc_cycle
);
criterion_main!(benches);
