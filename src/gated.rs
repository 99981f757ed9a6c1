//! Liveness-gated map: presence is a predicate, not a stored flag.
//!
//! ## Lazy reads, eager bulk operations
//!
//! Single-key operations (`get`, `contains_key`, the previous-value return
//! of `insert`, the return of `remove`) consult the gate only to decide
//! what to *return*; a dead entry stays resident.  Whole-collection
//! operations (`len`, `is_empty`, `keys`, `values`, `entries`,
//! `contains_value`) first run a **purge pass** that removes every dead
//! entry — invoking [`Gate::on_purge`] once per removal — and only then
//! compute their result.
//!
//! The asymmetry is deliberate: point reads stay cheap, while any bulk call
//! doubles as a way to force the map back into a consistent state.
//!
//! ## Locking
//!
//! One `parking_lot::Mutex` per map guards the store and the gate together.
//! Unlike the recency cache's disposal listeners, `on_purge` runs **while
//! the lock is held** — a hook that re-enters the same map will deadlock.
//! Keep gate hooks self-contained.

use std::collections::hash_map::Entry as Slot;
use std::hash::Hash;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::{Mutex, MutexGuard};

use crate::gate::Gate;

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A stored value plus the gate's per-entry bookkeeping.
struct GateEntry<V, M> {
    value: Arc<V>,
    meta: M,
}

/// Store and gate, guarded as one unit so purge hooks observe a consistent
/// map.
struct Inner<K, V, G: Gate<K, V>> {
    map: AHashMap<K, GateEntry<V, G::Meta>>,
    gate: G,
}

// ---------------------------------------------------------------------------
// Map handle
// ---------------------------------------------------------------------------

/// A map whose entries are present only while the [`Gate`] says they are
/// live.
///
/// Liveness is re-evaluated on every access, so an entry can "revive" if
/// the gate's condition becomes true again before a purge pass removes it.
///
/// # Example
/// ```
/// use lapse::{AlwaysLive, GatedMap};
/// use std::sync::Arc;
///
/// let map: GatedMap<String, u32, AlwaysLive> = GatedMap::new(AlwaysLive);
/// map.insert("one".to_string(), Arc::new(1));
/// assert_eq!(map.get(&"one".to_string()), Some(Arc::new(1)));
/// assert_eq!(map.len(), 1);
/// ```
pub struct GatedMap<K, V, G: Gate<K, V>> {
    inner: Arc<Mutex<Inner<K, V, G>>>,
}

impl<K, V, G: Gate<K, V>> Clone for GatedMap<K, V, G> {
    fn clone(&self) -> Self {
        GatedMap {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, G> GatedMap<K, V, G>
where
    K: Hash + Eq,
    G: Gate<K, V>,
{
    pub fn new(gate: G) -> Self {
        GatedMap {
            inner: Arc::new(Mutex::new(Inner {
                map: AHashMap::new(),
                gate,
            })),
        }
    }

    /// Acquires the instance lock and lets the gate run its pre-access
    /// bookkeeping before the operation proceeds.
    fn lock(&self) -> MutexGuard<'_, Inner<K, V, G>> {
        let mut inner = self.inner.lock();
        inner.gate.before_access();
        inner
    }

    /// Removes every dead entry, invoking `on_purge` once per removal.
    /// Runs with the lock held.
    fn purge_locked(inner: &mut Inner<K, V, G>) -> usize {
        let Inner { map, gate } = inner;
        let before = map.len();
        map.retain(|key, entry| {
            if gate.is_live(key, &entry.value, &entry.meta) {
                true
            } else {
                gate.on_purge(key, &entry.value, &entry.meta);
                false
            }
        });
        before - map.len()
    }

    // -----------------------------------------------------------------------
    // Single-key operations (lazy: never remove a dead entry)
    // -----------------------------------------------------------------------

    /// Returns the value for `key` iff it is present **and** live.  A dead
    /// entry yields `None` but stays resident.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let inner = self.lock();
        let Inner { map, gate } = &*inner;
        map.get(key)
            .filter(|entry| gate.is_live(key, &entry.value, &entry.meta))
            .map(|entry| Arc::clone(&entry.value))
    }

    /// Inserts `value` for `key` unconditionally, manufacturing fresh
    /// bookkeeping via [`Gate::make_meta`].
    ///
    /// Returns the previous value only if the previous entry was live —
    /// the same gating `get` would have applied to it.
    pub fn insert(&self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        let mut inner = self.lock();
        let Inner { map, gate } = &mut *inner;
        match map.entry(key) {
            Slot::Occupied(mut slot) => {
                let meta = gate.make_meta(slot.key(), &value);
                let old = std::mem::replace(slot.get_mut(), GateEntry { value, meta });
                if gate.is_live(slot.key(), &old.value, &old.meta) {
                    Some(old.value)
                } else {
                    None
                }
            }
            Slot::Vacant(slot) => {
                let meta = gate.make_meta(slot.key(), &value);
                slot.insert(GateEntry { value, meta });
                None
            }
        }
    }

    /// Inserts every pair from `entries`, as repeated [`insert`](Self::insert)
    /// calls.
    pub fn insert_all<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, Arc<V>)>,
    {
        for (key, value) in entries {
            self.insert(key, value);
        }
    }

    /// Removes the entry for `key` unconditionally — dead or alive.
    /// Returns the value only if the entry was live.  Fires no purge hook;
    /// [`Gate::on_purge`] is reserved for purge passes.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        let mut inner = self.lock();
        let Inner { map, gate } = &mut *inner;
        let (key, entry) = map.remove_entry(key)?;
        if gate.is_live(&key, &entry.value, &entry.meta) {
            Some(entry.value)
        } else {
            None
        }
    }

    /// `true` iff `key` holds a live entry.  Never removes.
    pub fn contains_key(&self, key: &K) -> bool {
        let inner = self.lock();
        let Inner { map, gate } = &*inner;
        map.get(key)
            .map_or(false, |entry| gate.is_live(key, &entry.value, &entry.meta))
    }

    /// Looks the entry up **regardless of liveness**, runs the gate's
    /// [`on_touch`](Gate::on_touch) hook on its bookkeeping, and returns
    /// the value — even if the gate would call it dead.
    pub fn touch(&self, key: &K) -> Option<Arc<V>> {
        let mut inner = self.lock();
        let Inner { map, gate } = &mut *inner;
        let entry = map.get_mut(key)?;
        let GateEntry { value, meta } = entry;
        gate.on_touch(key, value, meta);
        Some(Arc::clone(value))
    }

    // -----------------------------------------------------------------------
    // Whole-collection operations (eager: purge first, then answer)
    // -----------------------------------------------------------------------

    /// Number of live entries.  Purges first.
    pub fn len(&self) -> usize {
        let mut inner = self.lock();
        Self::purge_locked(&mut inner);
        inner.map.len()
    }

    /// `true` if no live entries remain.  Purges first; for a purge-free
    /// probe use [`entry_count`](Self::entry_count)` == 0`.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of all live entries.  Purges first.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        let mut inner = self.lock();
        Self::purge_locked(&mut inner);
        inner.map.keys().cloned().collect()
    }

    /// Values of all live entries.  Purges first.
    pub fn values(&self) -> Vec<Arc<V>> {
        let mut inner = self.lock();
        Self::purge_locked(&mut inner);
        inner.map.values().map(|e| Arc::clone(&e.value)).collect()
    }

    /// Key-value pairs of all live entries.  Purges first.
    pub fn entries(&self) -> Vec<(K, Arc<V>)>
    where
        K: Clone,
    {
        let mut inner = self.lock();
        Self::purge_locked(&mut inner);
        inner
            .map
            .iter()
            .map(|(k, e)| (k.clone(), Arc::clone(&e.value)))
            .collect()
    }

    /// `true` if any live entry holds a value equal to `value`.  Purges
    /// first.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        let mut inner = self.lock();
        Self::purge_locked(&mut inner);
        inner.map.values().any(|e| *e.value == *value)
    }

    /// Runs the purge pass on its own, returning how many entries it
    /// removed.
    pub fn purge_stale(&self) -> usize {
        let mut inner = self.lock();
        Self::purge_locked(&mut inner)
    }

    // -----------------------------------------------------------------------
    // Unconditional operations
    // -----------------------------------------------------------------------

    /// Removes every entry, live or dead, without consulting the gate and
    /// without firing [`Gate::on_purge`].
    pub fn clear(&self) {
        self.lock().map.clear();
    }

    /// Raw number of resident entries, dead ones included.  Does not purge.
    pub fn entry_count(&self) -> usize {
        self.lock().map.len()
    }
}
