//! Run a scan repeatedly on a fixed interval.
//!
//! The scheduler knows nothing about mailboxes: it calls a closure, logs a
//! failed cycle and carries on. Stopping is cooperative through a shared
//! flag, checked between cycles and while sleeping.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};

/// Longest uninterrupted sleep before the stop flag is checked again.
const STOP_POLL: Duration = Duration::from_millis(250);

/// What a scheduler run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    max_cycles: Option<usize>,
    stop: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_cycles: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop after this many cycles (`None` runs until stopped).
    pub fn with_max_cycles(mut self, max_cycles: Option<usize>) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Flag that ends the run when set, e.g. from a Ctrl-C handler.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Call `cycle(n)` (1-based) until stopped or `max_cycles` is reached.
    /// Errors are logged and never end the run.
    pub fn run<T, E, F>(&self, mut cycle: F) -> RunSummary
    where
        E: Display,
        F: FnMut(usize) -> Result<T, E>,
    {
        let mut summary = RunSummary::default();
        while !self.stopped() {
            summary.cycles += 1;
            info!(cycle = summary.cycles, "Starting scan cycle");
            if let Err(e) = cycle(summary.cycles) {
                summary.failed += 1;
                error!(cycle = summary.cycles, error = %e, "Scan cycle failed");
            }

            if self.max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }
            info!(minutes = self.interval.as_secs() / 60, "Sleeping until next scan");
            self.sleep();
        }
        summary
    }

    fn sleep(&self) {
        let deadline = Instant::now() + self.interval;
        loop {
            if self.stopped() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::sleep(STOP_POLL.min(deadline - now));
        }
    }
}
