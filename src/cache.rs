//! Bounded recency cache with batched compaction and disposal notification.
//!
//! ## Algorithm
//!
//! The cache holds up to an **overflow** number of entries, fixed at 1.5×
//! the configured target capacity.  Inserts are O(1) until the store reaches
//! the overflow threshold; the insert that finds the store at or above it
//! runs a **compaction pass** before storing its own entry:
//!
//! 1. Snapshot every entry (the store iterates in insertion order).
//! 2. Sequence timestamp ties: entries whose `last_touch` collides with
//!    another snapshotted entry's are lazily assigned a number from a shared
//!    monotonically increasing counter, in snapshot order.  An entry keeps
//!    its number for life, so later passes reuse it; entries with a unique
//!    timestamp are never sequenced at all.
//! 3. Sort most-recently-touched first.  Equal timestamps order by
//!    descending sequence number, which places the earliest-inserted of the
//!    tied entries last — among ties, eviction is FIFO.
//! 4. Rebuild the store from the sorted list with a zero-based counter,
//!    keeping entries while `counter <= capacity`.  The cutoff retains
//!    `capacity + 1` entries; downstream callers rely on the larger
//!    effective capacity, so the off-by-one is part of the contract.
//!    Entries whose idle timeout has elapsed are discarded regardless of
//!    their position.
//!
//! Amortizing eviction into a periodic batch keeps the per-insert cost flat
//! and avoids maintaining an ordered index on the hot path.
//!
//! ## Expiry
//!
//! The idle timeout is enforced lazily: a `get` that finds an entry whose
//! timeout elapsed removes it and reports a miss, and compaction discards
//! expired entries wherever it sees them.  There is no background sweeper,
//! so an expired entry that is never read again stays resident — and counted
//! by [`entry_count`](RecencyCache::entry_count) — until a compaction pass
//! happens to scan it.  That is the trade for having no maintenance thread.
//!
//! ## Locking
//!
//! One `parking_lot::Mutex` per cache instance guards the store and its
//! configuration.  Disposal listeners are never invoked while the lock is
//! held: events are collected under the lock and fired after release, so a
//! listener may safely call back into the cache.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use ahash::{AHashMap, RandomState};
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::builder::RecencyCacheBuilder;
use crate::clock::{Clock, SystemClock};
use crate::listener::{DisposeCause, DisposeListener};
use crate::metrics::stats::{Metrics, StatsCounter};

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A single cache entry.  Owned exclusively by the cache; callers only ever
/// see the `Arc<V>` inside.
struct Entry<V> {
    value: Arc<V>,
    /// Clock reading of the last touch (construction, non-expired `get`, or
    /// value replacement).
    last_touch: u64,
    /// Tie-break number, assigned lazily by a compaction pass the first time
    /// this entry's timestamp collides with another's.
    tie_seq: Option<u64>,
}

#[inline]
fn is_expired(timeout_ms: u64, now: u64, last_touch: u64) -> bool {
    timeout_ms > 0 && now.saturating_sub(last_touch) > timeout_ms
}

#[inline]
fn overflow_for(capacity: usize) -> usize {
    capacity + capacity / 2
}

// ---------------------------------------------------------------------------
// Locked interior
// ---------------------------------------------------------------------------

/// Store plus configuration, guarded by the instance lock as one unit so a
/// capacity or timeout update can never interleave with a compaction pass.
struct Inner<K, V> {
    /// Insertion-ordered store.  Removals use `shift_remove` to preserve the
    /// order, which the tie-sequencing step of compaction depends on.
    map: IndexMap<K, Entry<V>, RandomState>,
    /// Soft target size.  `0` disables `insert` and `remove` entirely.
    capacity: usize,
    /// Hard threshold at which the next insert compacts; always
    /// `capacity + capacity / 2`.
    overflow: usize,
    /// Idle timeout in clock milliseconds.  `0` = entries never time out.
    timeout_ms: u64,
    /// Source of tie-break numbers.  Monotonic for the cache's lifetime.
    tie_counter: u64,
}

impl<K: Hash + Eq, V> Inner<K, V> {
    /// Trims the store back to at most `capacity + 1` live entries,
    /// returning everything that was discarded so the caller can notify
    /// listeners once the lock is released.
    fn compact(&mut self, now: u64) -> Vec<(K, Arc<V>, DisposeCause)> {
        let mut snapshot: Vec<(K, Entry<V>)> = self.map.drain(..).collect();

        // Lazily sequence timestamp ties, in insertion order.  Entries that
        // already carry a number keep it.
        let mut occurrences: AHashMap<u64, u32> = AHashMap::with_capacity(snapshot.len());
        for (_, entry) in &snapshot {
            *occurrences.entry(entry.last_touch).or_insert(0) += 1;
        }
        for (_, entry) in &mut snapshot {
            if entry.tie_seq.is_none() && occurrences[&entry.last_touch] > 1 {
                self.tie_counter += 1;
                entry.tie_seq = Some(self.tie_counter);
            }
        }

        // Most recently touched first; among ties, newest sequence first so
        // the earliest-inserted tied entry is evicted first.
        snapshot.sort_by(|(_, a), (_, b)| {
            b.last_touch
                .cmp(&a.last_touch)
                .then_with(|| b.tie_seq.cmp(&a.tie_seq))
        });

        let mut dropped = Vec::new();
        let mut kept = 0usize;
        for (key, entry) in snapshot {
            if is_expired(self.timeout_ms, now, entry.last_touch) {
                dropped.push((key, entry.value, DisposeCause::Expired));
            } else if kept <= self.capacity {
                // Zero-based cutoff: retains capacity + 1 entries.
                kept += 1;
                self.map.insert(key, entry);
            } else {
                dropped.push((key, entry.value, DisposeCause::Capacity));
            }
        }
        dropped
    }
}

/// Shared interior of a [`RecencyCache`].
struct Shared<K, V> {
    inner: Mutex<Inner<K, V>>,
    /// Ordered listener registry.  Kept outside the store lock so a snapshot
    /// can be taken without blocking cache operations mid-notification.
    listeners: Mutex<Vec<Arc<dyn DisposeListener<K, V>>>>,
    clock: Box<dyn Clock>,
    stats: StatsCounter,
}

// ---------------------------------------------------------------------------
// Cache handle
// ---------------------------------------------------------------------------

/// A bounded, recency-based cache with idle-timeout expiry and disposal
/// notification.
///
/// Values are stored and returned as `Arc<V>`.  Re-inserting the *same*
/// `Arc` under a key is recognised by pointer identity and disposes nothing;
/// inserting a different `Arc` — even one that compares equal — displaces
/// and disposes the old value.
///
/// # Example
/// ```
/// use lapse::RecencyCache;
/// use std::sync::Arc;
///
/// let cache: RecencyCache<String, String> = RecencyCache::new(100);
/// cache.insert("hello".to_string(), Arc::new("world".to_string()));
/// assert_eq!(
///     cache.get(&"hello".to_string()),
///     Some(Arc::new("world".to_string()))
/// );
/// ```
pub struct RecencyCache<K, V> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> Clone for RecencyCache<K, V> {
    fn clone(&self) -> Self {
        RecencyCache {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> RecencyCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a cache with the given target capacity, no idle timeout, and
    /// the system clock.  Use [`builder`](Self::builder) for the rest.
    ///
    /// A capacity of `0` is **disabled-writes mode**: `insert` and `remove`
    /// become silent no-ops while `get` and the view operations keep
    /// working.
    pub fn new(capacity: usize) -> Self {
        Self::with_parts(capacity, 0, Box::new(SystemClock::new()), Vec::new())
    }

    /// Returns a [`RecencyCacheBuilder`] for configuring a new cache.
    pub fn builder(capacity: usize) -> RecencyCacheBuilder<K, V> {
        RecencyCacheBuilder::new(capacity)
    }

    pub(crate) fn with_parts(
        capacity: usize,
        timeout_ms: u64,
        clock: Box<dyn Clock>,
        listeners: Vec<Arc<dyn DisposeListener<K, V>>>,
    ) -> Self {
        RecencyCache {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    map: IndexMap::with_hasher(RandomState::new()),
                    capacity,
                    overflow: overflow_for(capacity),
                    timeout_ms,
                    tie_counter: 0,
                }),
                listeners: Mutex::new(listeners),
                clock,
                stats: StatsCounter::new(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Hot path: get
    // -----------------------------------------------------------------------

    /// Returns the value for `key` if it is present and has not timed out,
    /// refreshing its recency.
    ///
    /// A `get` that finds a timed-out entry removes it and fires one
    /// [`Expired`](DisposeCause::Expired) disposal; a repeat `get` finds
    /// nothing and fires nothing.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let removed;
        {
            let mut inner = self.shared.inner.lock();
            let now = self.shared.clock.now_millis();
            let timeout = inner.timeout_ms;
            match inner.map.get_mut(key) {
                None => {
                    drop(inner);
                    self.shared.stats.record_miss();
                    return None;
                }
                Some(entry) => {
                    if !is_expired(timeout, now, entry.last_touch) {
                        entry.last_touch = now;
                        let value = Arc::clone(&entry.value);
                        drop(inner);
                        self.shared.stats.record_hit();
                        return Some(value);
                    }
                }
            }
            // Timed out: evict under the lock, notify after releasing it.
            removed = inner.map.shift_remove_entry(key);
        }
        self.shared.stats.record_miss();
        if let Some((key, entry)) = removed {
            self.shared.stats.record_expiration();
            let event = [(key, entry.value, DisposeCause::Expired)];
            self.fire(&event);
        }
        None
    }

    // -----------------------------------------------------------------------
    // Hot path: insert
    // -----------------------------------------------------------------------

    /// Inserts `value` for `key`, returning the previous value if the key
    /// held one that had not timed out.
    ///
    /// If the store has reached its overflow threshold the compaction pass
    /// runs first (see the module docs).  Replacing a value with a
    /// different `Arc` fires one [`Replaced`](DisposeCause::Replaced)
    /// disposal for the displaced value; re-inserting the identical `Arc`
    /// fires nothing and leaves the entry's recency unchanged.
    ///
    /// No-op returning `None` when the cache is in disabled-writes mode.
    pub fn insert(&self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        let mut batch: Vec<(K, Arc<V>, DisposeCause)> = Vec::new();
        let prev;
        {
            let mut inner = self.shared.inner.lock();
            if inner.capacity == 0 {
                return None;
            }
            let now = self.shared.clock.now_millis();
            if inner.map.len() >= inner.overflow {
                batch = inner.compact(now);
            }
            let timeout = inner.timeout_ms;
            prev = match inner.map.get_mut(&key) {
                Some(entry) => {
                    let stale = is_expired(timeout, now, entry.last_touch);
                    if Arc::ptr_eq(&entry.value, &value) {
                        // Same value: nothing displaced, recency unchanged.
                        if stale {
                            None
                        } else {
                            Some(value)
                        }
                    } else {
                        let old = std::mem::replace(&mut entry.value, value);
                        entry.last_touch = now;
                        batch.push((key, Arc::clone(&old), DisposeCause::Replaced));
                        if stale {
                            None
                        } else {
                            Some(old)
                        }
                    }
                }
                None => {
                    inner.map.insert(
                        key,
                        Entry {
                            value,
                            last_touch: now,
                            tie_seq: None,
                        },
                    );
                    None
                }
            };
        }
        for (_, _, cause) in &batch {
            match cause {
                DisposeCause::Capacity => self.shared.stats.record_eviction(1),
                DisposeCause::Expired => self.shared.stats.record_expiration(),
                _ => {}
            }
        }
        self.fire(&batch);
        prev
    }

    // -----------------------------------------------------------------------
    // remove / clear
    // -----------------------------------------------------------------------

    /// Removes the entry for `key`.
    ///
    /// Returns the value and fires one [`Explicit`](DisposeCause::Explicit)
    /// disposal if the entry had not timed out.  An entry that was already
    /// past its timeout is treated as absent: removed silently, `None`
    /// returned, no disposal.
    ///
    /// No-op returning `None` when the cache is in disabled-writes mode.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        let removed;
        let now;
        let timeout;
        {
            let mut inner = self.shared.inner.lock();
            if inner.capacity == 0 {
                return None;
            }
            now = self.shared.clock.now_millis();
            timeout = inner.timeout_ms;
            removed = inner.map.shift_remove_entry(key);
        }
        let (key, entry) = removed?;
        if is_expired(timeout, now, entry.last_touch) {
            return None;
        }
        let value = Arc::clone(&entry.value);
        let event = [(key, entry.value, DisposeCause::Explicit)];
        self.fire(&event);
        Some(value)
    }

    /// Removes every entry, firing one [`Explicit`](DisposeCause::Explicit)
    /// disposal per entry that was present — expired or not.
    ///
    /// The store is swapped for an empty one under the lock before any
    /// listener runs, so a listener that calls back into the cache observes
    /// it already empty.  Works even in disabled-writes mode.
    pub fn clear(&self) {
        let drained = {
            let mut inner = self.shared.inner.lock();
            std::mem::take(&mut inner.map)
        };
        if drained.is_empty() {
            return;
        }
        let events: Vec<(K, Arc<V>, DisposeCause)> = drained
            .into_iter()
            .map(|(key, entry)| (key, entry.value, DisposeCause::Explicit))
            .collect();
        self.fire(&events);
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    /// Updates the target capacity and recomputes the overflow threshold
    /// (`capacity * 1.5`, floored).  Does not compact retroactively; the
    /// next overflow-triggering insert applies the new bound.  `0` switches
    /// the cache into disabled-writes mode.
    pub fn set_capacity(&self, capacity: usize) {
        let mut inner = self.shared.inner.lock();
        inner.capacity = capacity;
        inner.overflow = overflow_for(capacity);
    }

    /// Target capacity currently configured.
    pub fn capacity(&self) -> usize {
        self.shared.inner.lock().capacity
    }

    /// Updates the idle timeout.  `None` (or a zero duration) disables
    /// timeout expiry; entries then leave only by capacity or explicitly.
    pub fn set_time_to_idle(&self, timeout: Option<Duration>) {
        let mut inner = self.shared.inner.lock();
        inner.timeout_ms = timeout.map_or(0, |d| d.as_millis() as u64);
    }

    /// Idle timeout currently configured, if any.
    pub fn time_to_idle(&self) -> Option<Duration> {
        let timeout_ms = self.shared.inner.lock().timeout_ms;
        (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms))
    }

    // -----------------------------------------------------------------------
    // Listener registry
    // -----------------------------------------------------------------------

    /// Registers a disposal listener.  Registering the same listener twice
    /// makes it fire twice per event.
    pub fn add_dispose_listener(&self, listener: Arc<dyn DisposeListener<K, V>>) {
        self.shared.listeners.lock().push(listener);
    }

    /// Unregisters the first occurrence of a previously added listener,
    /// matched by pointer identity.  Returns `false` if it was not
    /// registered.
    pub fn remove_dispose_listener(&self, listener: &Arc<dyn DisposeListener<K, V>>) -> bool {
        let mut listeners = self.shared.listeners.lock();
        match listeners.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------
    //
    // Each view scans under the lock and silently skips entries whose
    // timeout elapsed — without removing them and without firing disposal.
    // Only `get` and compaction evict.

    /// Keys of all entries that have not timed out.
    pub fn keys(&self) -> Vec<K> {
        let inner = self.shared.inner.lock();
        let now = self.shared.clock.now_millis();
        inner
            .map
            .iter()
            .filter(|(_, e)| !is_expired(inner.timeout_ms, now, e.last_touch))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Values of all entries that have not timed out.
    pub fn values(&self) -> Vec<Arc<V>> {
        let inner = self.shared.inner.lock();
        let now = self.shared.clock.now_millis();
        inner
            .map
            .values()
            .filter(|e| !is_expired(inner.timeout_ms, now, e.last_touch))
            .map(|e| Arc::clone(&e.value))
            .collect()
    }

    /// `true` if `key` holds an entry that has not timed out.  Never evicts.
    pub fn contains_key(&self, key: &K) -> bool {
        let inner = self.shared.inner.lock();
        let now = self.shared.clock.now_millis();
        inner
            .map
            .get(key)
            .map_or(false, |e| !is_expired(inner.timeout_ms, now, e.last_touch))
    }

    /// `true` if any non-timed-out entry holds a value equal to `value`.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        let inner = self.shared.inner.lock();
        let now = self.shared.clock.now_millis();
        inner
            .map
            .values()
            .any(|e| !is_expired(inner.timeout_ms, now, e.last_touch) && *e.value == *value)
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Raw number of resident entries, **including** timed-out entries that
    /// no `get` or compaction pass has evicted yet.
    pub fn entry_count(&self) -> usize {
        self.shared.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.inner.lock().map.is_empty()
    }

    pub fn stats(&self) -> Metrics {
        self.shared.stats.snapshot()
    }

    // -----------------------------------------------------------------------
    // Notification
    // -----------------------------------------------------------------------

    /// Delivers one event per disposed entry to every registered listener.
    /// Always called with the store lock released; the listener snapshot is
    /// taken under the registry's own lock.  A panicking listener aborts
    /// delivery of the remaining notifications and unwinds to the caller.
    fn fire(&self, events: &[(K, Arc<V>, DisposeCause)]) {
        if events.is_empty() {
            return;
        }
        let listeners = self.shared.listeners.lock().clone();
        if listeners.is_empty() {
            return;
        }
        for (key, value, cause) in events {
            for listener in &listeners {
                listener.on_dispose(key, Arc::clone(value), *cause);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Compaction unit tests
// ---------------------------------------------------------------------------
