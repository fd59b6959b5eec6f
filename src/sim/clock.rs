//! Time sources for the simulation
//!
//! Simulation time is nanoseconds since a fixed epoch, never wall-clock time.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// Source of monotonic simulation time
pub trait SimClock: Send {
    /// Nanoseconds since the clock's epoch
    fn now_ns(&self) -> i64;
}

/// Real time, relative to the instant the clock was created
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClock for MonotonicClock {
    fn now_ns(&self) -> i64 {
        i64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }
}

/// Externally driven clock for tests and replays
///
/// Clones share the same time, so a test can keep a handle after moving
/// the clock into a simulation.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_ns: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_ns)),
        }
    }

    pub fn set(&self, time_ns: i64) {
        self.now.store(time_ns, Ordering::SeqCst);
    }

    /// Move the clock forward, returning the new time
    pub fn advance(&self, delta_ns: i64) -> i64 {
        self.now.fetch_add(delta_ns, Ordering::SeqCst) + delta_ns
    }
}

impl SimClock for ManualClock {
    fn now_ns(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
