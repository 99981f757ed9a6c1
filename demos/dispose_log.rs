//! Disposal walkthrough: every way a value can leave a `RecencyCache`,
//! plus the lazy-vs-eager purge behaviour of a `GatedMap`.
//!
//! Run with:
//!     cargo run --example dispose_log

use lapse::{FnGate, GatedMap, ManualClock, RecencyCache, RecencyCacheBuilder};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Target capacity of the demo cache; the overflow threshold is 1.5×.
const CAP: usize = 4;

fn main() {
    recency_cache_demo();
    println!();
    gated_map_demo();
}

// ---------------------------------------------------------------------------
// RecencyCache: capacity, replacement, timeout, clear
// ---------------------------------------------------------------------------

fn recency_cache_demo() {
    println!("== RecencyCache (capacity {CAP}, idle timeout 50 ms) ==");

    let clock = ManualClock::new();
    let cache: RecencyCache<String, String> = RecencyCacheBuilder::new(CAP)
        .time_to_idle(Duration::from_millis(50))
        .clock(clock.clone())
        .dispose_listener(|key: &String, value, cause| {
            println!("  disposed {key:8} = {value:12} ({cause:?})");
        })
        .build();

    // Overfill past the overflow threshold (6) to trigger a compaction.
    for i in 0..8 {
        clock.advance(1);
        cache.insert(format!("key-{i}"), Arc::new(format!("payload-{i}")));
    }
    println!("after 8 inserts: {} resident entries", cache.entry_count());

    // Replacing a value with a different allocation displaces the old one.
    cache.insert("key-7".to_string(), Arc::new("fresh".to_string()));

    // Let everything idle past the timeout; the read evicts what it finds.
    clock.advance(100);
    assert!(cache.get(&"key-7".to_string()).is_none());

    // clear() notifies for whatever was still resident.
    cache.clear();

    let stats = cache.stats();
    println!(
        "stats: {} hits / {} misses, {} evicted, {} expired",
        stats.hits, stats.misses, stats.evictions, stats.expirations
    );
}

// ---------------------------------------------------------------------------
// GatedMap: presence as a predicate
// ---------------------------------------------------------------------------

fn gated_map_demo() {
    println!("== GatedMap (entries live while value <= watermark) ==");

    let watermark = Arc::new(AtomicU64::new(5));
    let gate_watermark = Arc::clone(&watermark);
    let map: GatedMap<&str, u64, _> =
        GatedMap::new(FnGate(move |v: &u64| *v <= gate_watermark.load(Ordering::Relaxed)));

    map.insert("low", Arc::new(2));
    map.insert("high", Arc::new(9));

    println!("get(low)  = {:?}", map.get(&"low").map(|v| *v));
    println!("get(high) = {:?} (dead, watermark is 5)", map.get(&"high").map(|v| *v));
    println!("resident  = {} (dead entries linger)", map.entry_count());

    println!("len       = {} (bulk call purges first)", map.len());
    println!("resident  = {}", map.entry_count());

    watermark.store(10, Ordering::Relaxed);
    map.insert("high", Arc::new(9));
    println!("get(high) = {:?} (revived policy)", map.get(&"high").map(|v| *v));
}
