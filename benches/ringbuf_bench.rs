use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use evbus::{IsrQueue, RingBuffer};
use std::{sync::Arc, thread};

fn benchmark_single_threaded_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("RingBuffer_SingleThreaded");

    for capacity in [64, 1024, 4096].iter() {
        group.throughput(Throughput::Elements(*capacity as u64));
        group.bench_with_input(
            BenchmarkId::new("push_pop_u64", capacity),
            capacity,
            |b, &capacity| {
                let buffer: RingBuffer<u64> = RingBuffer::new(capacity).unwrap();
                let producer = buffer.producer();
                let consumer = buffer.consumer();

                b.iter(|| {
                    for i in 0..capacity {
                        producer.try_push(i as u64).unwrap();
                    }
                    for _ in 0..capacity {
                        consumer.try_pop().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

fn benchmark_modulo_vs_mask_indexing(c: &mut Criterion) {
    let mut group = c.benchmark_group("RingBuffer_Indexing");
    let rounds = 1024usize;
    group.throughput(Throughput::Elements(rounds as u64));

    group.bench_function("mask_capacity_1024", |b| {
        let buffer: RingBuffer<u32> = RingBuffer::new(1024).unwrap();
        let producer = buffer.producer();
        let consumer = buffer.consumer();
        b.iter(|| {
            for i in 0..rounds {
                producer.try_push(i as u32).unwrap();
                consumer.try_pop().unwrap();
            }
        });
    });

    group.bench_function("modulo_capacity_1000", |b| {
        let buffer: RingBuffer<u32> = RingBuffer::with_any_capacity(1000).unwrap();
        let producer = buffer.producer();
        let consumer = buffer.consumer();
        b.iter(|| {
            for i in 0..rounds {
                producer.try_push(i as u32).unwrap();
                consumer.try_pop().unwrap();
            }
        });
    });

    group.finish();
}

fn benchmark_cross_thread_streaming(c: &mut Criterion) {
    let mut group = c.benchmark_group("RingBuffer_CrossThread");
    const COUNT: u64 = 100_000;
    group.throughput(Throughput::Elements(COUNT));
    group.sample_size(10);

    group.bench_function("spsc_stream_100k", |b| {
        b.iter(|| {
            let ring: Arc<RingBuffer<u64>> = Arc::new(RingBuffer::new(1024).unwrap());

            let consumer = {
                let ring = ring.clone();
                thread::spawn(move || {
                    let handle = ring.consumer();
                    let mut received = 0u64;
                    while received < COUNT {
                        if handle.try_pop().is_ok() {
                            received += 1;
                        } else {
                            std::hint::spin_loop();
                        }
                    }
                })
            };

            let producer = ring.producer();
            let mut sent = 0u64;
            while sent < COUNT {
                if producer.try_push(sent).is_ok() {
                    sent += 1;
                } else {
                    std::hint::spin_loop();
                }
            }

            consumer.join().unwrap();
        });
    });

    group.finish();
}

fn benchmark_isr_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("IsrQueue");
    let batch = 256usize;
    group.throughput(Throughput::Elements(batch as u64));

    group.bench_function("push_pop_single_producer", |b| {
        let queue = IsrQueue::new(256).unwrap();
        b.iter(|| {
            for i in 0..batch {
                queue.try_push(i as u16).unwrap();
            }
            for _ in 0..batch {
                queue.try_pop().unwrap();
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_single_threaded_throughput,
    benchmark_modulo_vs_mask_indexing,
    benchmark_cross_thread_streaming,
    benchmark_isr_queue
);
criterion_main!(benches);
