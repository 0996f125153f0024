//! Yield Clock
//!
//! Decides whether the current contiguous run of the build walk has used up
//! its time budget. The time source is pluggable so tests can drive time by
//! hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time, measured from an arbitrary origin.
pub trait TimeSource: Send + Sync {
    /// Time elapsed since the source's origin.
    fn now(&self) -> Duration;
}

/// Wall-clock time source backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven time source. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// Tracks the start of the current run against a budget.
pub struct YieldClock {
    source: Arc<dyn TimeSource>,
    budget: Duration,
    run_started: Option<Duration>,
}

impl YieldClock {
    pub fn new(source: Arc<dyn TimeSource>, budget: Duration) -> Self {
        Self {
            source,
            budget,
            run_started: None,
        }
    }

    /// Begin a new contiguous run.
    pub fn start_run(&mut self) {
        self.run_started = Some(self.source.now());
    }

    /// Whether the budget has elapsed since [`start_run`](Self::start_run).
    ///
    /// Starts a run implicitly if none is active. A run that has exhausted its
    /// budget ends, so the next call measures from a fresh start.
    pub fn should_yield(&mut self) -> bool {
        let now = self.source.now();
        let started = *self.run_started.get_or_insert(now);
        if now.saturating_sub(started) >= self.budget {
            self.run_started = None;
            return true;
        }
        false
    }

    /// The configured budget.
    pub fn budget(&self) -> Duration {
        self.budget
    }
}
