//! Cooperative Scheduling
//!
//! Two leaf components drive time slicing:
//!
//! - [`Scheduler`]: one FIFO queue of work items, run one at a time and
//!   cancellable until dequeued.
//! - [`YieldClock`]: tells the build walk when its budget for the current
//!   contiguous run is spent.
//!
//! "Concurrency" here means interleaving with whatever else the embedder does
//! between [`Scheduler::run_next`] calls. Nothing runs in parallel.

mod clock;
mod queue;

pub use clock::{ManualClock, SystemClock, TimeSource, YieldClock};
pub use queue::{Scheduler, WorkId};
