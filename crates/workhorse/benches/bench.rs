use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::{
    io,
    sync::{Arc, Barrier},
    thread::scope,
    time::Instant,
};
use workhorse::{DropLogger, LoggerConfig, PoolConfig, Resource, ResourcePool, WorkPool};

// Number of work items (or log lines) per benchmark iteration.
const TOTAL_ITEMS: usize = 4096;

/// Benchmarks submit-to-drain throughput of a [`WorkPool`] with a tiny work
/// item, across worker counts and queue capacities.
fn bench_pool(c: &mut Criterion, group_name: &str, queue_capacity: usize) {
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_ITEMS as u64));

    let mut worker_counts = vec![1, 2, 4];
    let cpus = num_cpus::get();
    if !worker_counts.contains(&cpus) {
        worker_counts.push(cpus);
    }

    for workers in worker_counts {
        group.bench_function(
            format!("elems/{}/workers/{}", TOTAL_ITEMS, workers),
            |b| {
                b.iter_custom(|iters| {
                    let start = Instant::now();

                    for _ in 0..iters {
                        let pool = WorkPool::with_config(PoolConfig {
                            workers,
                            queue_capacity,
                            ..PoolConfig::default()
                        })
                        .unwrap();
                        for i in 0..TOTAL_ITEMS {
                            pool.submit(move || {
                                black_box(i);
                            })
                            .unwrap();
                        }
                        black_box(pool.shutdown().unwrap());
                    }

                    start.elapsed()
                });
            },
        );
    }

    group.finish();
}

/// Benchmarks producers writing to a [`DropLogger`] that discards its output.
/// Some lines may be dropped; the benchmark measures the producer side.
fn bench_logger_contended(c: &mut Criterion, group_name: &str, capacity: usize) {
    let mut group = c.benchmark_group(group_name);

    for thread_count in [1, 2, 4, 8] {
        let lines_per_thread = TOTAL_ITEMS / thread_count;

        group.throughput(Throughput::Elements(TOTAL_ITEMS as u64));
        group.bench_function(
            format!("elems/{}/threads/{}", TOTAL_ITEMS, thread_count),
            |b| {
                b.iter_custom(|iters| {
                    let start = Instant::now();

                    for _ in 0..iters {
                        let logger = DropLogger::with_config(
                            io::sink(),
                            LoggerConfig {
                                capacity,
                                ..LoggerConfig::default()
                            },
                        )
                        .unwrap();
                        let barrier = Barrier::new(thread_count + 1);
                        scope(|s| {
                            for t in 0..thread_count {
                                let logger = &logger;
                                let barrier = &barrier;
                                s.spawn(move || {
                                    barrier.wait();
                                    for i in 0..lines_per_thread {
                                        black_box(logger.write(format!("producer {t}: {i}")));
                                    }
                                });
                            }
                            barrier.wait();
                        });
                    }

                    start.elapsed()
                });
            },
        );
    }

    group.finish();
}

struct Handle(u64);

impl Resource for Handle {
    fn close(&mut self) {
        black_box(self.0);
    }
}

/// Benchmarks acquire/release cycles on a shared [`ResourcePool`].
fn bench_resource_contended(c: &mut Criterion, group_name: &str) {
    let mut group = c.benchmark_group(group_name);

    for thread_count in [1, 2, 4, 8] {
        let cycles_per_thread = TOTAL_ITEMS / thread_count;

        group.throughput(Throughput::Elements(TOTAL_ITEMS as u64));
        group.bench_function(
            format!("elems/{}/threads/{}", TOTAL_ITEMS, thread_count),
            |b| {
                b.iter_custom(|iters| {
                    let start = Instant::now();

                    for _ in 0..iters {
                        let pool = Arc::new(
                            ResourcePool::new(|| Ok::<_, io::Error>(Handle(0)), thread_count)
                                .unwrap(),
                        );
                        let barrier = Barrier::new(thread_count + 1);
                        scope(|s| {
                            for _ in 0..thread_count {
                                let pool = Arc::clone(&pool);
                                let barrier = &barrier;
                                s.spawn(move || {
                                    barrier.wait();
                                    for _ in 0..cycles_per_thread {
                                        let mut handle = pool.acquire().unwrap();
                                        handle.0 += 1;
                                        black_box(handle.0);
                                    }
                                });
                            }
                            barrier.wait();
                        });
                        pool.close();
                    }

                    start.elapsed()
                });
            },
        );
    }

    group.finish();
}

fn benchmark_pool_rendezvous(c: &mut Criterion) {
    bench_pool(c, "pool/rendezvous", 0);
}

fn benchmark_pool_buffered(c: &mut Criterion) {
    bench_pool(c, "pool/buffered", 64);
}

fn benchmark_logger_small_buffer(c: &mut Criterion) {
    bench_logger_contended(c, "logger/contended/capacity-16", 16);
}

fn benchmark_logger_large_buffer(c: &mut Criterion) {
    bench_logger_contended(c, "logger/contended/capacity-4096", 4096);
}

fn benchmark_resource(c: &mut Criterion) {
    bench_resource_contended(c, "resource/contended");
}

criterion_group!(
    benches,
    benchmark_pool_rendezvous,
    benchmark_pool_buffered,
    benchmark_logger_small_buffer,
    benchmark_logger_large_buffer,
    benchmark_resource,
);
criterion_main!(benches);
