//! Benchmarks for property access through the instance cache.
//!
//! Run with: cargo bench -p trellis-runtime -- cache

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use trellis_core::{Document, Node, Value};
use trellis_runtime::{DescriptorMap, HostExt, Registry, RuntimeConfig};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn counter_map() -> DescriptorMap {
    DescriptorMap::builder()
        .value("count", 0)
        .getter("double", |host, _| {
            let count = host.get_property("count")?;
            Ok(Value::Int(count.as_int().unwrap_or(0) * 2))
        })
        .build()
}

fn mounted(registry: &Registry, doc: &Document, count: u64) -> Vec<Node> {
    (0..count)
        .map(|_| {
            let el = registry.create("x-bench").unwrap();
            doc.root().append_child(&el).unwrap();
            el
        })
        .collect()
}

// ---------------------------------------------------------------------------
// 1. Memoized reads
// ---------------------------------------------------------------------------

fn bench_cached_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/read");

    for count in [10, 100, 1_000] {
        group.throughput(Throughput::Elements(count));
        let doc = Document::new();
        let registry = Registry::new(&doc, RuntimeConfig::production());
        registry.define("x-bench", &counter_map()).unwrap();
        let nodes = mounted(&registry, &doc, count);
        for node in &nodes {
            node.get_property("double").unwrap();
        }

        group.bench_with_input(BenchmarkId::new("double", count), &(), |b, _| {
            b.iter(|| {
                for node in &nodes {
                    black_box(node.get_property("double").unwrap());
                }
            })
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// 2. Write then dependent recompute
// ---------------------------------------------------------------------------

fn bench_write_recompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/write_recompute");

    for count in [10, 100, 1_000] {
        group.throughput(Throughput::Elements(count));
        let doc = Document::new();
        let registry = Registry::new(&doc, RuntimeConfig::production());
        registry.define("x-bench", &counter_map()).unwrap();
        let nodes = mounted(&registry, &doc, count);
        let mut tick = 0i64;

        group.bench_with_input(BenchmarkId::new("count_double", count), &(), |b, _| {
            b.iter(|| {
                tick += 1;
                for node in &nodes {
                    node.set_property("count", tick).unwrap();
                    black_box(node.get_property("double").unwrap());
                }
            })
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// 3. Development-mode reconciliation
// ---------------------------------------------------------------------------

fn bench_reconcile(c: &mut Criterion) {
    // Production builds reject redefinition outright.
    if cfg!(feature = "production") {
        return;
    }
    let mut group = c.benchmark_group("reconcile/batch");

    for count in [10, 100, 1_000] {
        group.throughput(Throughput::Elements(count));
        let doc = Document::new();
        let registry = Registry::new(&doc, RuntimeConfig::development());
        registry.define("x-bench", &counter_map()).unwrap();
        let nodes = mounted(&registry, &doc, count);

        group.bench_with_input(BenchmarkId::new("redefine_flush", count), &(), |b, _| {
            b.iter(|| {
                registry.define("x-bench", &counter_map()).unwrap();
                black_box(registry.flush().unwrap());
            })
        });
        drop(nodes);
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_cached_read,
    bench_write_recompute,
    bench_reconcile
);
criterion_main!(benches);
