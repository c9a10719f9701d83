//! Idle strategies for callers that wrap non-blocking polls.
//!
//! The core itself never blocks; a caller driving `poll` in a loop decides
//! how to burn or yield idle cycles.

use std::thread;
use std::time::Duration;

/// Decides what to do between unproductive polls.
pub trait IdleStrategy {
    /// Report the work count of the last poll; idles when it was zero.
    fn idle(&mut self, work_count: usize);

    /// Forget accumulated idle state after productive work.
    fn reset(&mut self);
}

/// Busy-spin. Lowest latency, one core pinned.
#[derive(Debug, Default)]
pub struct SpinIdle;

impl IdleStrategy for SpinIdle {
    fn idle(&mut self, _work_count: usize) {
        std::hint::spin_loop();
    }

    fn reset(&mut self) {}
}

/// Escalating back-off: spin, then yield, then park for `max_park`.
#[derive(Debug)]
pub struct BackoffIdle {
    spins: u32,
    yields: u32,
    max_park: Duration,
    state: u64,
}

impl Default for BackoffIdle {
    fn default() -> Self {
        Self::new(100, 10, Duration::from_millis(1))
    }
}

impl BackoffIdle {
    pub fn new(spins: u32, yields: u32, max_park: Duration) -> Self {
        Self {
            spins,
            yields,
            max_park,
            state: 0,
        }
    }
}

impl IdleStrategy for BackoffIdle {
    fn idle(&mut self, work_count: usize) {
        if work_count > 0 {
            self.reset();
            return;
        }

        self.state += 1;
        if self.state <= u64::from(self.spins) {
            std::hint::spin_loop();
        } else if self.state <= u64::from(self.spins + self.yields) {
            thread::yield_now();
        } else {
            thread::sleep(self.max_park);
        }
    }

    fn reset(&mut self) {
        self.state = 0;
    }
}
