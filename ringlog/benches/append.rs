//! Microbenchmarks for the `append()` hot path and the readers.
//!
//! Run with: `cargo bench -p ringlog -- append`

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ringlog::store::Store;
use ringlog::{CAPACITY, Cursor, export, follow};
use tempfile::tempdir;

/// Creates a store, optionally pre-filled to a full ring.
fn setup_store(prefill: bool) -> (Store, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let store = Store::open(temp_dir.path().join("bench.log")).unwrap();

    if prefill {
        let base_time = 1_700_000_000_000_000_000u64;
        for i in 0..CAPACITY as u64 {
            store.append_at("NET", "Sending keepalive packet to peer 7", base_time + i);
        }
    }

    (store, temp_dir)
}

fn bench_append_single(c: &mut Criterion) {
    let (store, _dir) = setup_store(false);
    let mut ts = 1_700_000_000_000_000_000u64;

    c.bench_function("append/short_message", |b| {
        b.iter(|| {
            ts += 1_000;
            store.append_at(black_box("NET"), black_box("Handshake completed"), black_box(ts));
        });
    });
}

fn bench_append_message_len(c: &mut Criterion) {
    let mut group = c.benchmark_group("append/message_len");

    for len in [16, 128, 511, 2048] {
        let (store, _dir) = setup_store(false);
        let message = "x".repeat(len);
        let mut ts = 1_700_000_000_000_000_000u64;

        group.bench_with_input(BenchmarkId::from_parameter(len), &message, |b, message| {
            b.iter(|| {
                ts += 1_000;
                store.append_at(black_box("NET"), black_box(message), black_box(ts));
            });
        });
    }

    group.finish();
}

fn bench_append_contended(c: &mut Criterion) {
    let temp_dir = tempdir().unwrap();
    let store = Arc::new(Store::open(temp_dir.path().join("contended.log")).unwrap());

    c.bench_function("append/4_threads_x_1000", |b| {
        b.iter(|| {
            let writers: Vec<_> = (0..4)
                .map(|_| {
                    let store = Arc::clone(&store);
                    thread::spawn(move || {
                        for _ in 0..1000 {
                            store.append(black_box("APP"), black_box("Configuration changed"));
                        }
                    })
                })
                .collect();
            for writer in writers {
                writer.join().unwrap();
            }
        });
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let (store, _dir) = setup_store(true);

    c.bench_function("snapshot/full_ring", |b| {
        b.iter(|| black_box(store.snapshot()));
    });
}

fn bench_export(c: &mut Criterion) {
    let (app, _app_dir) = setup_store(true);
    let (net, _net_dir) = setup_store(true);

    c.bench_function("export/two_full_rings", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(1 << 20);
            export::export_to_writer(black_box(&[(&app, "APP"), (&net, "NET")]), &mut out).unwrap();
            black_box(out);
        });
    });
}

fn bench_follow_caught_up(c: &mut Criterion) {
    let (store, _dir) = setup_store(true);
    let cursor = follow(&store, Cursor::Tail).cursor;

    c.bench_function("follow/caught_up_poll", |b| {
        b.iter(|| black_box(follow(&store, black_box(cursor))));
    });
}

criterion_group!(
    benches,
    bench_append_single,
    bench_append_message_len,
    bench_append_contended,
    bench_snapshot,
    bench_export,
    bench_follow_caught_up,
);
criterion_main!(benches);
