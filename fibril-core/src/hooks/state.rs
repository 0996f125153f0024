//! State Handles
//!
//! Handles returned by hooks that outlive the render call: dispatchers and
//! mutable refs. They hold the slot of the component instance that owns them
//! and a weak link back to the root, so a handle kept after unmount is inert.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::fiber::SlotId;

/// Receives re-render requests from state setters.
pub(crate) trait UpdateSink: Send + Sync {
    fn request_update(&self, slot: SlotId);
}

pub(crate) type Reducer<S, A> = dyn Fn(&S, A) -> S + Send + Sync;

/// Type-erased view of a reducer slot, used when a build commits or aborts.
pub(crate) trait ReducerSlot: Send + Sync {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Snapshot the latest state for the render that is starting.
    fn begin_render(&self);

    /// Make the state shown by the last render the committed state.
    fn commit(&self);

    /// Forget the last render. State dispatched before it started is dropped;
    /// state dispatched later stays pending for its own re-render.
    fn discard(&self);
}

struct Versions<S> {
    committed: S,
    /// Dispatched but not yet committed.
    pending: Option<S>,
    /// Bumped on every write to `pending`.
    version: u64,
    /// Value handed to the render in progress, with the version it saw.
    staged: Option<(u64, S)>,
}

impl<S: Clone> Versions<S> {
    fn latest(&self) -> S {
        self.pending.clone().unwrap_or_else(|| self.committed.clone())
    }
}

/// Persisted state of a reducer slot.
///
/// The committed generation stays authoritative: dispatches write a pending
/// value that only a successful commit promotes. Actions are queued and
/// applied by one caller at a time, so concurrent dispatches never lose an
/// update and a reducer may dispatch again without deadlocking.
pub(crate) struct ReducerCell<S, A> {
    state: Mutex<Versions<S>>,
    reducer: Mutex<Arc<Reducer<S, A>>>,
    actions: Mutex<VecDeque<A>>,
    draining: AtomicBool,
}

impl<S, A> ReducerCell<S, A>
where
    S: Clone + PartialEq,
{
    pub(crate) fn new(state: S, reducer: Arc<Reducer<S, A>>) -> Self {
        Self {
            state: Mutex::new(Versions {
                committed: state,
                pending: None,
                version: 0,
                staged: None,
            }),
            reducer: Mutex::new(reducer),
            actions: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
        }
    }

    /// The state to render, staged for the next commit.
    pub(crate) fn stage(&self) -> S {
        let mut versions = self.state.lock();
        let value = versions.latest();
        versions.staged = Some((versions.version, value.clone()));
        value
    }

    pub(crate) fn replace_reducer(&self, reducer: Arc<Reducer<S, A>>) {
        *self.reducer.lock() = reducer;
    }

    fn has_actions(&self) -> bool {
        !self.actions.lock().is_empty()
    }

    fn next_action(&self) -> Option<A> {
        self.actions.lock().pop_front()
    }

    /// Returns whether the state changed.
    fn apply(&self, action: A) -> bool {
        let reducer = self.reducer.lock().clone();
        let current = self.state.lock().latest();
        let next = reducer(&current, action);
        if next == current {
            return false;
        }
        let mut versions = self.state.lock();
        versions.pending = Some(next);
        versions.version += 1;
        true
    }

    /// Apply queued actions unless another caller already is. Whoever holds
    /// the drain re-checks the queue after letting go, so nothing is stranded.
    fn drain(&self) -> bool {
        let mut changed = false;
        while self.has_actions()
            && self
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            while let Some(action) = self.next_action() {
                changed |= self.apply(action);
            }
            self.draining.store(false, Ordering::Release);
        }
        changed
    }
}

impl<S, A> ReducerSlot for ReducerCell<S, A>
where
    S: Clone + PartialEq + Send + 'static,
    A: Send + 'static,
{
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn begin_render(&self) {
        self.stage();
    }

    fn commit(&self) {
        let mut versions = self.state.lock();
        if let Some((version, value)) = versions.staged.take() {
            if versions.version == version {
                versions.pending = None;
            }
            versions.committed = value;
        }
    }

    fn discard(&self) {
        let mut versions = self.state.lock();
        if let Some((version, _)) = versions.staged.take() {
            if versions.version == version {
                versions.pending = None;
            }
        }
    }
}

/// Dispatches actions to a reducer slot.
///
/// The same dispatcher is returned on every render of the owning component.
pub struct Dispatch<S, A> {
    cell: Arc<ReducerCell<S, A>>,
    slot: SlotId,
    sink: Weak<dyn UpdateSink>,
}

impl<S, A> Dispatch<S, A>
where
    S: Clone + PartialEq,
{
    pub(crate) fn new(cell: Arc<ReducerCell<S, A>>, slot: SlotId, sink: Weak<dyn UpdateSink>) -> Self {
        Self { cell, slot, sink }
    }

    /// Apply `reducer(state, action)` against the latest state. A re-render of
    /// the owning component is requested only when the result differs.
    ///
    /// When another thread is already applying actions to this slot, the
    /// action is queued and that thread applies it before returning.
    pub fn dispatch(&self, action: A) {
        self.cell.actions.lock().push_back(action);
        if !self.cell.drain() {
            tracing::trace!(slot = self.slot.raw(), "no state change to report");
            return;
        }

        if let Some(sink) = self.sink.upgrade() {
            sink.request_update(self.slot);
        }
    }
}

impl<S, A> Clone for Dispatch<S, A> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            slot: self.slot,
            sink: self.sink.clone(),
        }
    }
}

impl<S, A> PartialEq for Dispatch<S, A> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<S, A> fmt::Debug for Dispatch<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch").field("slot", &self.slot).finish()
    }
}

/// Action understood by the reducer behind [`use_state`](super::Hooks::use_state).
pub enum StateAction<S> {
    Set(S),
    Update(Box<dyn FnOnce(&S) -> S + Send>),
}

impl<S: Clone> StateAction<S> {
    pub(crate) fn apply(state: &S, action: Self) -> S {
        match action {
            Self::Set(value) => value,
            Self::Update(update) => update(state),
        }
    }
}

/// Setter returned by [`use_state`](super::Hooks::use_state).
pub struct SetState<S>(Dispatch<S, StateAction<S>>);

impl<S> SetState<S>
where
    S: Clone + PartialEq,
{
    pub(crate) fn new(dispatch: Dispatch<S, StateAction<S>>) -> Self {
        Self(dispatch)
    }

    /// Replace the state.
    pub fn set(&self, value: S) {
        self.0.dispatch(StateAction::Set(value));
    }

    /// Derive the next state from the current one.
    pub fn update<F>(&self, update: F)
    where
        F: FnOnce(&S) -> S + Send + 'static,
    {
        self.0.dispatch(StateAction::Update(Box::new(update)));
    }
}

impl<S> Clone for SetState<S> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<S> PartialEq for SetState<S> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<S> fmt::Debug for SetState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SetState").field(&self.0.slot).finish()
    }
}

/// A mutable cell that persists for the lifetime of a hook slot.
///
/// Writing to it never schedules a render.
pub struct MutableRef<T>(Arc<Mutex<T>>);

impl<T> MutableRef<T> {
    pub(crate) fn from_cell(cell: Arc<Mutex<T>>) -> Self {
        Self(cell)
    }

    pub fn set(&self, value: T) {
        *self.0.lock() = value;
    }

    /// Run `f` with mutable access to the value.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.0.lock())
    }
}

impl<T: Clone> MutableRef<T> {
    pub fn get(&self) -> T {
        self.0.lock().clone()
    }
}

impl<T> Clone for MutableRef<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> PartialEq for MutableRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: fmt::Debug> fmt::Debug for MutableRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MutableRef").field(&*self.0.lock()).finish()
    }
}
