use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::RecencyCache;
use crate::clock::{Clock, SystemClock};
use crate::listener::{DisposeCause, DisposeListener, FnListener};

/// Builder for configuring and constructing a [`RecencyCache`].
///
/// # Example
/// ```
/// use lapse::RecencyCacheBuilder;
/// use std::time::Duration;
///
/// let cache: lapse::RecencyCache<String, String> = RecencyCacheBuilder::new(1_000)
///     .time_to_idle(Duration::from_secs(60))
///     .build();
/// ```
pub struct RecencyCacheBuilder<K, V> {
    capacity: usize,
    timeout: Option<Duration>,
    clock: Box<dyn Clock>,
    listeners: Vec<Arc<dyn DisposeListener<K, V>>>,
}

impl<K: 'static, V: 'static> RecencyCacheBuilder<K, V> {
    /// Starts a builder with the given target capacity.
    ///
    /// `0` is accepted and means disabled-writes mode (see
    /// [`RecencyCache::new`]).
    pub fn new(capacity: usize) -> Self {
        RecencyCacheBuilder {
            capacity,
            timeout: None,
            clock: Box::new(SystemClock::new()),
            listeners: Vec::new(),
        }
    }

    /// Entries time out `timeout` after they were last touched (written,
    /// replaced, or read).  Timed-out entries are evicted lazily: on the
    /// `get` that finds them, or by a compaction pass.
    pub fn time_to_idle(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Substitutes the time source.  Tests pass a
    /// [`ManualClock`](crate::ManualClock) here to drive expiry
    /// deterministically.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Registers a disposal listener closure.
    ///
    /// The closure runs on the thread that triggered the disposal, after
    /// the cache released its lock — calling cache methods from inside it
    /// is safe.  More listeners can be added (and removed) later via
    /// [`RecencyCache::add_dispose_listener`].
    ///
    /// # Example
    /// ```
    /// use lapse::RecencyCacheBuilder;
    ///
    /// let cache: lapse::RecencyCache<u64, u64> = RecencyCacheBuilder::new(10)
    ///     .dispose_listener(|key: &u64, _val, cause| {
    ///         println!("disposed key={key} cause={cause:?}");
    ///     })
    ///     .build();
    /// ```
    pub fn dispose_listener<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, Arc<V>, DisposeCause) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(FnListener(f)));
        self
    }

    /// Registers a disposal listener via the [`DisposeListener`] trait.
    pub fn dispose_listener_impl(mut self, listener: Arc<dyn DisposeListener<K, V>>) -> Self {
        self.listeners.push(listener);
        self
    }
}

impl<K, V> RecencyCacheBuilder<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn build(self) -> RecencyCache<K, V> {
        let timeout_ms = self.timeout.map_or(0, |d| d.as_millis() as u64);
        RecencyCache::with_parts(self.capacity, timeout_ms, self.clock, self.listeners)
    }
}
