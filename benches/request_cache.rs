//! Benchmarks for the request cache
//!
//! This benchmark measures:
//! - Fingerprint derivation speed
//! - Cache hit / miss lookup cost
//! - Insertion under capacity pressure (LRU eviction)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use prompt_refine::cache::{fingerprint, CacheConfig, RequestCache};
use std::time::Duration;

const CONTEXT: &str = r#"{"framework":"React","language":"TypeScript"}"#;

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");
    for len in [16usize, 256, 4096] {
        let input = "x".repeat(len);
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &input, |b, input| {
            b.iter(|| fingerprint(black_box(input), "gpt-4o-mini", CONTEXT))
        });
    }
    group.finish();
}

fn filled_cache(size: usize) -> RequestCache {
    let cache = RequestCache::new(
        CacheConfig::new()
            .with_max_size(size)
            .with_ttl(Duration::from_secs(3600)),
    );
    for i in 0..size {
        cache.set(
            fingerprint(&format!("request {i}"), "gpt-4o-mini", CONTEXT),
            format!("refined {i}"),
            "gpt-4o-mini",
            12,
        );
    }
    cache
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_lookup");
    let cache = filled_cache(200);
    let hit = fingerprint("request 100", "gpt-4o-mini", CONTEXT);
    let miss = fingerprint("never stored", "gpt-4o-mini", CONTEXT);

    group.bench_function("hit", |b| b.iter(|| cache.get(black_box(&hit))));
    group.bench_function("miss", |b| b.iter(|| cache.get(black_box(&miss))));
    group.bench_function("has", |b| b.iter(|| cache.has(black_box(&hit))));
    group.finish();
}

fn bench_insert_with_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_insert");
    let keys: Vec<_> = (0..1000)
        .map(|i| fingerprint(&format!("new {i}"), "gpt-4o-mini", CONTEXT))
        .collect();

    group.throughput(Throughput::Elements(keys.len() as u64));
    group.bench_function("insert_1000_into_50", |b| {
        b.iter_batched(
            || filled_cache(50),
            |cache| {
                for k in &keys {
                    cache.set(k.clone(), "refined", "gpt-4o-mini", 12);
                }
                cache
            },
            criterion::BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_fingerprint, bench_lookup, bench_insert_with_eviction);
criterion_main!(benches);
