//! Time sources used for slot throttling.
//!
//! Throttling only needs a monotonic reading in fractional seconds. The
//! [`SystemClock`] is used by default; [`ManualClock`] lets tests and
//! simulations drive time explicitly.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonic time source in fractional seconds.
pub trait Clock: Send + Sync {
    /// The current time in seconds. Only differences between readings matter.
    fn now(&self) -> f64;
}

/// Process-wide epoch for [`SystemClock`] readings.
static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Monotonic clock backed by [`Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        let epoch = EPOCH.get_or_init(Instant::now);
        epoch.elapsed().as_secs_f64()
    }
}

/// A clock that only moves when told to.
///
/// # Example
///
/// ```
/// use horizon_signals::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new(10.0);
/// clock.advance(0.5);
/// assert_eq!(clock.now(), 10.5);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    /// Create a clock reading `start` seconds.
    pub fn new(start: f64) -> Self {
        Self {
            bits: AtomicU64::new(start.to_bits()),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, seconds: f64) {
        self.bits.store(seconds.to_bits(), Ordering::SeqCst);
    }

    /// Move the clock forward by `seconds`.
    pub fn advance(&self, seconds: f64) {
        let now = self.now();
        self.set(now + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}
