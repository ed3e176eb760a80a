//! Monotonic clock.
//!
//! A thin wrapper over `std::time::Instant` so callers have one obvious
//! place to read "now" from, and so tests can substitute a fake clock
//! without touching the scheduler's timing arithmetic.

use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug)]
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Elapsed time since this clock was started.
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::start()
    }
}
