//! Throughput benchmarks: lapse vs Moka vs QuickCache.
//!
//! Each group benchmarks the same workload across all three caches so
//! criterion can generate side-by-side HTML reports.  Moka and QuickCache
//! enforce their bounds differently (amortised maintenance vs. per-insert
//! eviction), so treat the numbers as orientation, not a ranking.
//!
//! Run with:
//!     cargo bench --bench throughput

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use lapse::RecencyCache;
use moka::sync::Cache as MokaCache;
use quick_cache::sync::Cache as QuickCache;
use std::sync::Arc;

/// Number of entries each cache is pre-filled with and its logical capacity.
const CAP: u64 = 10_000;

/// Operations executed per criterion iteration (hot-loop size).
const OPS: u64 = 1_000;

// ---------------------------------------------------------------------------
// Group 1: get_hit
// ---------------------------------------------------------------------------
// All keys are present → measures pure read throughput with no eviction.

fn bench_get_hit(c: &mut Criterion) {
    let lapse: RecencyCache<u64, u64> = RecencyCache::new(CAP as usize);
    for i in 0..CAP {
        lapse.insert(i, Arc::new(i * 2));
    }

    let moka: MokaCache<u64, u64> = MokaCache::new(CAP);
    for i in 0..CAP {
        moka.insert(i, i * 2);
    }

    let qc: QuickCache<u64, u64> = QuickCache::new(CAP as usize);
    for i in 0..CAP {
        qc.insert(i, i * 2);
    }

    let mut group = c.benchmark_group("get_hit");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("lapse", |b| {
        b.iter(|| {
            for i in 0..OPS {
                black_box(lapse.get(black_box(&i)));
            }
        })
    });

    group.bench_function("moka", |b| {
        b.iter(|| {
            for i in 0..OPS {
                black_box(moka.get(black_box(&i)));
            }
        })
    });

    group.bench_function("quick_cache", |b| {
        b.iter(|| {
            for i in 0..OPS {
                black_box(qc.get(black_box(&i)));
            }
        })
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Group 2: insert
// ---------------------------------------------------------------------------
// Keys cycle through 2× capacity → steady-state eviction pressure, which
// for lapse exercises the periodic compaction pass.

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("lapse", |b| {
        let cache: RecencyCache<u64, u64> = RecencyCache::new(CAP as usize);
        let mut next = 0u64;
        b.iter(|| {
            for _ in 0..OPS {
                let key = next % (CAP * 2);
                cache.insert(black_box(key), Arc::new(key));
                next += 1;
            }
        })
    });

    group.bench_function("moka", |b| {
        let cache: MokaCache<u64, u64> = MokaCache::new(CAP);
        let mut next = 0u64;
        b.iter(|| {
            for _ in 0..OPS {
                let key = next % (CAP * 2);
                cache.insert(black_box(key), key);
                next += 1;
            }
        })
    });

    group.bench_function("quick_cache", |b| {
        let cache: QuickCache<u64, u64> = QuickCache::new(CAP as usize);
        let mut next = 0u64;
        b.iter(|| {
            for _ in 0..OPS {
                let key = next % (CAP * 2);
                cache.insert(black_box(key), key);
                next += 1;
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_get_hit, bench_insert);
criterion_main!(benches);
