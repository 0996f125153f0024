//! Work Queue
//!
//! A single FIFO queue of zero-argument work items. Items run one at a time;
//! a queued item can be withdrawn by id until it is dequeued.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

/// Identifier returned by [`Scheduler::schedule_work`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkId(u64);

impl WorkId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

type Work = Box<dyn FnOnce() + Send>;

struct QueueState {
    items: VecDeque<(WorkId, Work)>,
    next_id: u64,
    running: bool,
}

/// Cooperative FIFO scheduler.
///
/// Cloning a scheduler yields another handle to the same queue. The embedder
/// decides when work runs by calling [`run_next`](Self::run_next) between its
/// own events, or [`run_until_idle`](Self::run_until_idle) to drain.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Mutex<QueueState>>,
}

/// Clears the `running` flag even if a work item panics.
struct RunningGuard<'a> {
    scheduler: &'a Scheduler,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.inner.lock().running = false;
    }
}

impl Scheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueState {
                items: VecDeque::new(),
                next_id: 1,
                running: false,
            })),
        }
    }

    /// Enqueue a work item at the back of the queue.
    pub fn schedule_work<F>(&self, work: F) -> WorkId
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.inner.lock();
        let id = WorkId(state.next_id);
        state.next_id += 1;
        state.items.push_back((id, Box::new(work)));
        tracing::trace!(work = id.0, queued = state.items.len(), "scheduled work");
        id
    }

    /// Withdraw a queued item. Returns `false` if it already ran or was never queued.
    pub fn cancel_work(&self, id: WorkId) -> bool {
        let mut state = self.inner.lock();
        let before = state.items.len();
        state.items.retain(|(queued, _)| *queued != id);
        before != state.items.len()
    }

    /// Withdraw every queued item.
    pub fn cancel_all(&self) {
        self.inner.lock().items.clear();
    }

    /// Whether any work is waiting to run.
    pub fn is_pending(&self) -> bool {
        !self.inner.lock().items.is_empty()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the item at the front of the queue.
    ///
    /// Returns `false` when the queue is empty, or when called from inside a
    /// running item: only one item is ever active.
    pub fn run_next(&self) -> bool {
        let work = {
            let mut state = self.inner.lock();
            if state.running {
                return false;
            }
            match state.items.pop_front() {
                Some((_, work)) => {
                    state.running = true;
                    work
                }
                None => return false,
            }
        };

        let _guard = RunningGuard { scheduler: self };
        work();
        true
    }

    /// Run items until the queue is empty, including items enqueued while
    /// draining. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Scheduler")
            .field("queued", &state.items.len())
            .field("running", &state.running)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) -> Box<dyn FnOnce() + Send>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |n: u32| {
            let log = log_clone.clone();
            Box::new(move || log.lock().push(n)) as Box<dyn FnOnce() + Send>
        };
        (log, make)
    }

    #[test]
    fn runs_in_fifo_order() {
        let scheduler = Scheduler::new();
        let (log, make) = recorder();

        for n in 1..=3 {
            scheduler.schedule_work(make(n));
        }

        assert_eq!(scheduler.run_until_idle(), 3);
        assert_eq!(*log.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn cancelled_work_never_runs() {
        let scheduler = Scheduler::new();
        let (log, make) = recorder();

        scheduler.schedule_work(make(1));
        let doomed = scheduler.schedule_work(make(2));
        scheduler.schedule_work(make(3));

        assert!(scheduler.cancel_work(doomed));
        scheduler.run_until_idle();

        assert_eq!(*log.lock(), vec![1, 3]);
        // Second cancel is a no-op.
        assert!(!scheduler.cancel_work(doomed));
    }

    #[test]
    fn cancel_after_run_has_no_effect() {
        let scheduler = Scheduler::new();
        let (log, make) = recorder();

        let id = scheduler.schedule_work(make(7));
        assert!(scheduler.run_next());
        assert!(!scheduler.cancel_work(id));
        assert_eq!(*log.lock(), vec![7]);
    }

    #[test]
    fn cancel_all_empties_queue() {
        let scheduler = Scheduler::new();
        let (log, make) = recorder();

        scheduler.schedule_work(make(1));
        scheduler.schedule_work(make(2));
        assert!(scheduler.is_pending());

        scheduler.cancel_all();
        assert!(!scheduler.is_pending());
        assert!(!scheduler.run_next());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn work_enqueued_while_running_runs_later() {
        let scheduler = Scheduler::new();
        let (log, make) = recorder();

        let inner = scheduler.clone();
        let follow_up = make(2);
        let first = make(1);
        scheduler.schedule_work(move || {
            first();
            inner.schedule_work(follow_up);
        });

        assert!(scheduler.run_next());
        assert_eq!(*log.lock(), vec![1]);
        assert_eq!(scheduler.len(), 1);

        scheduler.run_until_idle();
        assert_eq!(*log.lock(), vec![1, 2]);
    }

    #[test]
    fn nested_run_is_refused() {
        let scheduler = Scheduler::new();
        let nested_result = Arc::new(Mutex::new(None));

        let inner = scheduler.clone();
        let result = nested_result.clone();
        scheduler.schedule_work(move || {
            *result.lock() = Some(inner.run_next());
        });
        scheduler.schedule_work(|| {});

        assert!(scheduler.run_next());
        assert_eq!(*nested_result.lock(), Some(false));
        // The second item was left for the outer loop.
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn work_ids_are_unique() {
        let scheduler = Scheduler::new();
        let a = scheduler.schedule_work(|| {});
        let b = scheduler.schedule_work(|| {});
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }
}
