//! Liveness policy for a [`GatedMap`](crate::GatedMap) — decides, at access
//! time, whether a stored entry should still be considered present.
//!
//! A gate generalises reference-liveness caches: instead of a stored flag,
//! "is this entry alive" is a predicate over whatever the policy cares
//! about — time, reachability, an external condition.  The predicate is
//! re-evaluated on every access that needs to decide presence, so an entry
//! can report dead at one access and alive again at the next if the
//! condition flips back before a purge runs.
//!
//! # Example
//! ```
//! use lapse::{FnGate, GatedMap};
//! use std::sync::Arc;
//!
//! // Entries stay visible while their balance is non-negative.
//! let map: GatedMap<&str, i64, _> = GatedMap::new(FnGate(|balance: &i64| *balance >= 0));
//! map.insert("alice", Arc::new(10));
//! map.insert("bob", Arc::new(-3));
//!
//! assert_eq!(map.get(&"alice"), Some(Arc::new(10)));
//! assert_eq!(map.get(&"bob"), None); // dead, but still resident
//! assert_eq!(map.entry_count(), 2);
//! assert_eq!(map.len(), 1);          // bulk operations purge first
//! assert_eq!(map.entry_count(), 1);
//! ```

use std::sync::Arc;

/// The liveness policy of a [`GatedMap`](crate::GatedMap).
///
/// The map stores one `Meta` beside every value; the gate manufactures it
/// at insert time and consults it on every liveness decision.  All methods
/// run while the map's lock is held — in particular
/// [`on_purge`](Gate::on_purge), so a gate must **never** call back into
/// the map it guards.
///
/// A panic from any gate method propagates to the caller of the map
/// operation that invoked it and may leave a bulk purge half-done; the map
/// itself stays usable.
pub trait Gate<K, V>: Send {
    /// Per-entry bookkeeping attached at insert time.
    type Meta: Send;

    /// Manufactures the bookkeeping for a new entry.
    fn make_meta(&mut self, key: &K, value: &Arc<V>) -> Self::Meta;

    /// Decides whether the entry is still present.  Re-evaluated on every
    /// gated access; never memoised.
    fn is_live(&self, key: &K, value: &Arc<V>, meta: &Self::Meta) -> bool;

    /// Invoked once per entry removed by a purge pass, while the map lock
    /// is held.  Default: no-op.
    fn on_purge(&mut self, key: &K, value: &Arc<V>, meta: &Self::Meta) {
        let _ = (key, value, meta);
    }

    /// Invoked by [`GatedMap::touch`](crate::GatedMap::touch), liveness
    /// notwithstanding.  Default: no-op.
    fn on_touch(&mut self, key: &K, value: &Arc<V>, meta: &mut Self::Meta) {
        let _ = (key, value, meta);
    }

    /// Invoked at the start of every locked map operation, before the
    /// operation proceeds.  Lets a gate refresh internal bookkeeping (e.g.
    /// re-read a counter) at the last moment.  Default: no-op.
    fn before_access(&mut self) {}
}

// ---------------------------------------------------------------------------
// Built-in gates
// ---------------------------------------------------------------------------

/// Every entry is always live.  Turns a [`GatedMap`](crate::GatedMap) into
/// a plain locked map; useful as a default and in tests.
pub struct AlwaysLive;

impl<K, V> Gate<K, V> for AlwaysLive {
    type Meta = ();

    fn make_meta(&mut self, _key: &K, _value: &Arc<V>) -> Self::Meta {}

    #[inline]
    fn is_live(&self, _key: &K, _value: &Arc<V>, _meta: &Self::Meta) -> bool {
        true
    }
}

/// A gate backed by a predicate over the value.
///
/// Suits policies that need no per-entry bookkeeping — the decision is a
/// pure function of the value and whatever state the closure captures.
pub struct FnGate<F>(pub F);

impl<K, V, F> Gate<K, V> for FnGate<F>
where
    F: Fn(&V) -> bool + Send,
{
    type Meta = ();

    fn make_meta(&mut self, _key: &K, _value: &Arc<V>) -> Self::Meta {}

    #[inline]
    fn is_live(&self, _key: &K, value: &Arc<V>, _meta: &Self::Meta) -> bool {
        (self.0)(value.as_ref())
    }
}
