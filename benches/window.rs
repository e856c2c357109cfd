//! Benchmarks for the dedup window.
//!
//! Benchmark targets:
//! - Single-threaded add (new and duplicate identifiers)
//! - Add under contention from several threads
//! - Drain of windows of increasing size

// Criterion macros generate items without docs - this is expected for benchmarks
#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use tally::services::DedupWindow;
use tally::storage::MemoryWindowStore;

fn memory_window() -> Arc<DedupWindow> {
    Arc::new(DedupWindow::new(Arc::new(MemoryWindowStore::new())))
}

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("window_add");
    group.throughput(Throughput::Elements(1));

    let window = memory_window();
    let mut next = 0i64;
    group.bench_function("new_id", |b| {
        b.iter(|| {
            next += 1;
            black_box(window.add(next).unwrap())
        });
    });

    let window = memory_window();
    window.add(42).unwrap();
    group.bench_function("duplicate_id", |b| {
        b.iter(|| black_box(window.add(black_box(42)).unwrap()));
    });

    group.finish();
}

fn bench_contended_add(c: &mut Criterion) {
    const IDS_PER_THREAD: i64 = 1_000;

    let mut group = c.benchmark_group("window_add_contended");
    for threads in [2i64, 4, 8] {
        group.throughput(Throughput::Elements(
            u64::try_from(threads * IDS_PER_THREAD).unwrap(),
        ));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter_batched(
                memory_window,
                |window| {
                    let handles: Vec<_> = (0..threads)
                        .map(|t| {
                            let window = Arc::clone(&window);
                            thread::spawn(move || {
                                for i in 0..IDS_PER_THREAD {
                                    window.add(t * IDS_PER_THREAD + i).unwrap();
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                    window
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("window_drain");
    for size in [0i64, 1_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let window = memory_window();
                    for id in 0..size {
                        window.add(id).unwrap();
                    }
                    window
                },
                |window| black_box(window.drain().unwrap().count),
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_add, bench_contended_add, bench_drain);
criterion_main!(benches);
