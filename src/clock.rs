//! Time source for recency timestamps and idle-timeout checks.
//!
//! The cache never reads wall time directly; it asks a [`Clock`] for a
//! monotonic millisecond counter.  Production code uses [`SystemClock`]
//! (the default).  Tests inject a [`ManualClock`] and advance it by hand,
//! which makes every expiry assertion deterministic.
//!
//! # Example
//! ```
//! use lapse::{ManualClock, Clock};
//!
//! let clock = ManualClock::new();
//! assert_eq!(clock.now_millis(), 0);
//! clock.advance(250);
//! assert_eq!(clock.now_millis(), 250);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A monotonic millisecond counter.
///
/// Implementations must never go backwards; the cache stores raw readings
/// as entry timestamps and compares them with simple subtraction.
pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> u64;
}

// ---------------------------------------------------------------------------
// SystemClock
// ---------------------------------------------------------------------------

/// Milliseconds elapsed since the clock was created.
///
/// Backed by [`Instant`], so it is immune to wall-clock adjustments.
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

// ---------------------------------------------------------------------------
// ManualClock
// ---------------------------------------------------------------------------

/// A clock that only moves when told to.
///
/// Cloning yields a handle to the same underlying counter, so a test can
/// keep one handle while the cache owns another.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock frozen at zero.
    pub fn new() -> Self {
        ManualClock {
            now: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Moves the clock forward by `millis`.
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::Relaxed);
    }

    /// Jumps the clock to an absolute reading.
    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::Relaxed);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}
