//! Disposal listener — a callback invoked whenever a value leaves the cache.
//!
//! # Example
//! ```
//! use lapse::RecencyCacheBuilder;
//! use lapse::DisposeCause;
//! use std::sync::{Arc, Mutex};
//!
//! let log: Arc<Mutex<Vec<(u64, DisposeCause)>>> = Arc::new(Mutex::new(Vec::new()));
//! let log2 = Arc::clone(&log);
//!
//! let cache: lapse::RecencyCache<u64, u64> = RecencyCacheBuilder::new(2)
//!     .dispose_listener(move |key: &u64, _val, cause| {
//!         log2.lock().unwrap().push((*key, cause));
//!     })
//!     .build();
//!
//! cache.insert(1, Arc::new(10));
//! cache.remove(&1); // explicit removal
//! assert_eq!(log.lock().unwrap().as_slice(), &[(1, DisposeCause::Explicit)]);
//! ```

use std::sync::Arc;

// ---------------------------------------------------------------------------
// DisposeCause
// ---------------------------------------------------------------------------

/// The reason a value was removed from the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisposeCause {
    /// Removed because a compaction pass trimmed the cache back toward its
    /// target capacity and this entry was among the least recently touched.
    Capacity,
    /// Removed because its idle timeout elapsed.  Detected on `get` or
    /// during a compaction pass; expired entries are never swept in the
    /// background.
    Expired,
    /// Displaced by an [`insert`](crate::RecencyCache::insert) that replaced
    /// the value with a different one.
    Replaced,
    /// Removed explicitly via [`remove`](crate::RecencyCache::remove) or
    /// [`clear`](crate::RecencyCache::clear).
    Explicit,
}

// ---------------------------------------------------------------------------
// DisposeListener trait
// ---------------------------------------------------------------------------

/// A callback invoked each time a value is disposed.
///
/// Implementations must be `Send + Sync + 'static` so listeners can be
/// shared across threads via `Arc`.
///
/// The callback receives a reference to the key, a shared reference to the
/// displaced value (`Arc<V>`), and the reason for removal.
///
/// Listeners run on the thread that triggered the disposal, **after** the
/// cache has released its internal lock — it is safe to call back into the
/// same cache from inside the callback.  A listener that panics aborts
/// delivery to any remaining listeners for that event; the panic propagates
/// to the caller of the triggering operation.
pub trait DisposeListener<K, V>: Send + Sync + 'static {
    fn on_dispose(&self, key: &K, value: Arc<V>, cause: DisposeCause);
}

/// A [`DisposeListener`] backed by a closure.
///
/// Created via [`RecencyCacheBuilder::dispose_listener`](crate::RecencyCacheBuilder::dispose_listener),
/// or directly when a listener must be removable later:
///
/// ```
/// use lapse::{DisposeListener, FnListener, RecencyCache};
/// use std::sync::Arc;
///
/// let cache: RecencyCache<String, String> = RecencyCache::new(10);
/// let listener: Arc<dyn DisposeListener<String, String>> =
///     Arc::new(FnListener(|key: &String, _val, cause| {
///         eprintln!("disposed {key} ({cause:?})");
///     }));
/// cache.add_dispose_listener(Arc::clone(&listener));
/// // ... later
/// assert!(cache.remove_dispose_listener(&listener));
/// ```
pub struct FnListener<F>(pub F);

impl<K, V, F> DisposeListener<K, V> for FnListener<F>
where
    F: Fn(&K, Arc<V>, DisposeCause) + Send + Sync + 'static,
{
    fn on_dispose(&self, key: &K, value: Arc<V>, cause: DisposeCause) {
        (self.0)(key, value, cause)
    }
}
