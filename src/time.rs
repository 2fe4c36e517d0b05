//! Monotonic time source for heartbeat and reboot deadlines.

use std::time::Instant;

/// Monotonic millisecond clock.
///
/// Injected into the module so liveness timeouts are testable; hosts with a
/// scheduler-provided tick counter can adapt it here.
pub trait Clock {
    /// Milliseconds elapsed since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;
}

/// Default clock measuring from its own creation.
#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
