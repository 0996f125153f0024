//! Hooks
//!
//! A component function receives a [`Hooks`] render context. Each hook call
//! appends one record and advances the cursor. On later renders of the same
//! component instance, the call at index `i` sources its persisted state from
//! record `i` of the previous generation.
//!
//! # Call Order
//!
//! Reuse is purely by index. A render that calls hooks in a different order,
//! or a different number of them, fails with
//! [`Error::HookOrderChanged`](crate::Error::HookOrderChanged) or
//! [`Error::HookCountChanged`](crate::Error::HookCountChanged) and the build is
//! abandoned before anything is committed.
//!
//! Hooks can only be called while a component renders: the context exists only
//! for the duration of that call.
//!
//! # Dependencies
//!
//! Effects, memos and callbacks take a dependency array built with [`deps!`].
//! Arrays are compared by length and then element by element. An effect given
//! `None` runs after every commit.

mod record;
mod state;

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

pub use record::{Cleanup, HookKind};
pub use state::{Dispatch, MutableRef, SetState, StateAction};

pub(crate) use record::{EffectHook, HookRecord};
pub(crate) use state::{ReducerSlot, UpdateSink};

use record::{Cell, EffectFn};
use state::{Reducer, ReducerCell};

use crate::element::{Context, NodeRef, PropValue, RefValue};
use crate::error::{Error, Result};
use crate::fiber::SlotId;

/// A dependency array.
pub type Deps = SmallVec<[PropValue; 4]>;

/// Build a [`Deps`] array from values convertible into [`PropValue`].
///
/// `deps![]` is an empty array: the hook runs on mount only.
#[macro_export]
macro_rules! deps {
    () => {
        $crate::hooks::Deps::new()
    };
    ($($value:expr),+ $(,)?) => {{
        let mut deps = $crate::hooks::Deps::new();
        $(deps.push($crate::element::PropValue::from($value));)+
        deps
    }};
}

/// Whether a hook with `next` dependencies must rerun after `prev`.
pub fn deps_changed(prev: Option<&Deps>, next: Option<&Deps>) -> bool {
    match (prev, next) {
        (Some(prev), Some(next)) => prev.len() != next.len() || prev.iter().zip(next).any(|(a, b)| a != b),
        _ => true,
    }
}

/// Render context handed to a component function.
pub struct Hooks<'r> {
    component: &'r str,
    slot: SlotId,
    previous: Option<&'r [HookRecord]>,
    records: Vec<HookRecord>,
    sink: Weak<dyn UpdateSink>,
    ids: &'r AtomicU64,
    id_prefix: &'r str,
}

impl<'r> Hooks<'r> {
    /// `previous` is `None` on mount and the predecessor's records otherwise.
    pub(crate) fn new(
        component: &'r str,
        slot: SlotId,
        previous: Option<&'r [HookRecord]>,
        sink: Weak<dyn UpdateSink>,
        ids: &'r AtomicU64,
        id_prefix: &'r str,
    ) -> Self {
        Self {
            component,
            slot,
            previous,
            records: Vec::with_capacity(previous.map_or(0, <[_]>::len)),
            sink,
            ids,
            id_prefix,
        }
    }

    /// Name of the component being rendered.
    pub fn component(&self) -> &str {
        self.component
    }

    /// Whether this is the first render of the component instance.
    pub fn is_mount(&self) -> bool {
        self.previous.is_none()
    }

    /// Validate the next call against the previous generation and return the
    /// record it reuses.
    fn previous(&self, kind: HookKind) -> Result<Option<&'r HookRecord>> {
        let Some(previous) = self.previous else {
            return Ok(None);
        };
        let index = self.records.len();
        match previous.get(index) {
            Some(record) if record.kind() == kind => Ok(Some(record)),
            Some(record) => Err(Error::HookOrderChanged {
                component: self.component.to_string(),
                index,
                previous: record.kind(),
                current: kind,
            }),
            None => Err(Error::HookCountChanged {
                component: self.component.to_string(),
                previous: previous.len(),
                current: index + 1,
            }),
        }
    }

    fn downcast<T>(&self, cell: &Cell) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        cell.clone().downcast::<T>().map_err(|_| Error::HookTypeMismatch {
            component: self.component.to_string(),
            index: self.records.len(),
        })
    }

    /// State managed by a reducer.
    ///
    /// Returns the current state and a dispatcher. Dispatching computes the
    /// next state immediately and requests a re-render only when it changed.
    pub fn use_reducer<S, A, R>(&mut self, reducer: R, initial: S) -> Result<(S, Dispatch<S, A>)>
    where
        S: Clone + PartialEq + Send + 'static,
        A: Send + 'static,
        R: Fn(&S, A) -> S + Send + Sync + 'static,
    {
        self.reducer_hook(Arc::new(reducer), || initial)
    }

    /// Like [`use_reducer`](Self::use_reducer), but the initial state is
    /// `init(arg)`, computed on mount only.
    pub fn use_reducer_with_init<S, A, R, I, F>(
        &mut self,
        reducer: R,
        arg: I,
        init: F,
    ) -> Result<(S, Dispatch<S, A>)>
    where
        S: Clone + PartialEq + Send + 'static,
        A: Send + 'static,
        R: Fn(&S, A) -> S + Send + Sync + 'static,
        F: FnOnce(I) -> S,
    {
        self.reducer_hook(Arc::new(reducer), move || init(arg))
    }

    fn reducer_hook<S, A>(
        &mut self,
        reducer: Arc<Reducer<S, A>>,
        initial: impl FnOnce() -> S,
    ) -> Result<(S, Dispatch<S, A>)>
    where
        S: Clone + PartialEq + Send + 'static,
        A: Send + 'static,
    {
        let cell = match self.previous(HookKind::Reducer)? {
            Some(HookRecord::Reducer(slot)) => {
                let cell = self.downcast::<ReducerCell<S, A>>(&slot.clone().into_any())?;
                cell.replace_reducer(reducer);
                cell
            }
            _ => Arc::new(ReducerCell::new(initial(), reducer)),
        };

        let state = cell.stage();
        let dispatch = Dispatch::new(cell.clone(), self.slot, self.sink.clone());
        self.records.push(HookRecord::Reducer(cell));
        Ok((state, dispatch))
    }

    /// A single state value with a setter.
    pub fn use_state<S>(&mut self, initial: S) -> Result<(S, SetState<S>)>
    where
        S: Clone + PartialEq + Send + 'static,
    {
        let (state, dispatch) = self.use_reducer(StateAction::<S>::apply, initial)?;
        Ok((state, SetState::new(dispatch)))
    }

    fn effect_hook(&mut self, kind: HookKind, create: EffectFn, deps: Option<Deps>) -> Result<()> {
        let hook = match self.previous(kind)?.and_then(HookRecord::effect) {
            Some(prev) if !deps_changed(prev.deps.as_ref(), deps.as_ref()) => {
                EffectHook::idle(deps, prev.cleanup_cell())
            }
            Some(prev) => EffectHook::scheduled(create, deps, prev.cleanup_cell()),
            None => EffectHook::scheduled(create, deps, Arc::new(Mutex::new(None))),
        };
        self.records.push(match kind {
            HookKind::LayoutEffect => HookRecord::LayoutEffect(hook),
            _ => HookRecord::Effect(hook),
        });
        Ok(())
    }

    /// A passive effect, run on a scheduler turn after the commit.
    ///
    /// The effect may return a cleanup, run before the next invocation and on
    /// unmount.
    pub fn use_effect<F>(&mut self, effect: F, deps: Option<Deps>) -> Result<()>
    where
        F: FnOnce() -> Option<Cleanup> + Send + 'static,
    {
        self.effect_hook(HookKind::Effect, Box::new(effect), deps)
    }

    /// An effect run synchronously during the commit, after host mutations.
    pub fn use_layout_effect<F>(&mut self, effect: F, deps: Option<Deps>) -> Result<()>
    where
        F: FnOnce() -> Option<Cleanup> + Send + 'static,
    {
        self.effect_hook(HookKind::LayoutEffect, Box::new(effect), deps)
    }

    fn cached<T>(&mut self, kind: HookKind, make: impl FnOnce() -> T, deps: Deps) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let reused = match self.previous(kind)? {
            Some(HookRecord::Memo { value, deps: prev } | HookRecord::Callback { value, deps: prev })
                if !deps_changed(Some(prev), Some(&deps)) =>
            {
                Some(self.downcast::<T>(value)?)
            }
            _ => None,
        };
        let value = match reused {
            Some(value) => value,
            None => Arc::new(make()),
        };

        let cell: Cell = value.clone();
        self.records.push(match kind {
            HookKind::Callback => HookRecord::Callback { value: cell, deps },
            _ => HookRecord::Memo { value: cell, deps },
        });
        Ok(value)
    }

    /// A value recomputed only when `deps` change. Unchanged deps return the
    /// same `Arc`.
    pub fn use_memo<T, F>(&mut self, compute: F, deps: Deps) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.cached(HookKind::Memo, compute, deps)
    }

    /// A closure whose identity changes only when `deps` change.
    pub fn use_callback<F>(&mut self, callback: F, deps: Deps) -> Result<Arc<F>>
    where
        F: Send + Sync + 'static,
    {
        self.cached(HookKind::Callback, || callback, deps)
    }

    /// A mutable cell that persists across renders.
    pub fn use_ref<T>(&mut self, initial: T) -> Result<MutableRef<T>>
    where
        T: Send + 'static,
    {
        let cell = match self.previous(HookKind::Ref)? {
            Some(HookRecord::Ref(cell)) => self.downcast::<Mutex<T>>(cell)?,
            _ => Arc::new(Mutex::new(initial)),
        };
        self.records.push(HookRecord::Ref(cell.clone()));
        Ok(MutableRef::from_cell(cell))
    }

    /// Publish a value into `target` during the layout phase.
    ///
    /// Takes two slots: the handle itself and the layout effect that sets it.
    /// The effect's cleanup clears the ref.
    pub fn use_imperative_handle<F>(&mut self, target: &NodeRef, create: F, deps: Option<Deps>) -> Result<()>
    where
        F: FnOnce() -> PropValue + Send + 'static,
    {
        self.previous(HookKind::ImperativeHandle)?;
        self.records.push(HookRecord::ImperativeHandle {
            target: target.clone(),
        });

        let target = target.clone();
        self.effect_hook(
            HookKind::LayoutEffect,
            Box::new(move || {
                target.set(Some(RefValue::Handle(create())));
                Some(Box::new(move || target.set(None)) as Cleanup)
            }),
            deps,
        )
    }

    /// An identifier unique within the root and stable for this slot.
    pub fn use_id(&mut self) -> Result<Arc<str>> {
        let id = match self.previous(HookKind::Id)? {
            Some(HookRecord::Id(id)) => id.clone(),
            _ => {
                let n = self.ids.fetch_add(1, Ordering::Relaxed);
                format!(":{}{}:", self.id_prefix, n).into()
            }
        };
        self.records.push(HookRecord::Id(id.clone()));
        Ok(id)
    }

    /// The value most recently provided for `context`. Does not take a slot.
    pub fn use_context(&self, context: &Context) -> PropValue {
        context.current()
    }

    /// Close the render and return the new generation's records.
    pub(crate) fn finish(self) -> Result<Vec<HookRecord>> {
        if let Some(previous) = self.previous {
            if previous.len() != self.records.len() {
                return Err(Error::HookCountChanged {
                    component: self.component.to_string(),
                    previous: previous.len(),
                    current: self.records.len(),
                });
            }
        }
        Ok(self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RecordingSink {
        requests: Mutex<Vec<SlotId>>,
    }

    impl UpdateSink for RecordingSink {
        fn request_update(&self, slot: SlotId) {
            self.requests.lock().push(slot);
        }
    }

    struct Harness {
        sink: Arc<RecordingSink>,
        ids: AtomicU64,
        records: Option<Vec<HookRecord>>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                sink: Arc::new(RecordingSink::default()),
                ids: AtomicU64::new(0),
                records: None,
            }
        }

        /// Render once, keeping the records for the next call.
        fn render<T>(&mut self, body: impl FnOnce(&mut Hooks<'_>) -> Result<T>) -> Result<T> {
            let sink: Arc<dyn UpdateSink> = self.sink.clone();
            let previous = self.records.take();
            let mut hooks = Hooks::new(
                "Test",
                SlotId::from_raw(1),
                previous.as_deref(),
                Arc::downgrade(&sink),
                &self.ids,
                "t",
            );
            let out = body(&mut hooks);
            let finished = out.and_then(|out| hooks.finish().map(|records| (out, records)));
            match finished {
                Ok((out, records)) => {
                    self.records = Some(records);
                    Ok(out)
                }
                Err(err) => {
                    self.records = previous;
                    Err(err)
                }
            }
        }
    }

    #[test]
    fn deps_comparison() {
        assert!(deps_changed(None, Some(&deps![1])));
        assert!(deps_changed(Some(&deps![1]), None));
        assert!(deps_changed(Some(&deps![1]), Some(&deps![1, 2])));
        assert!(deps_changed(Some(&deps![1]), Some(&deps![2])));
        assert!(!deps_changed(Some(&deps!["a", 1]), Some(&deps!["a", 1])));
        assert!(!deps_changed(Some(&deps![]), Some(&deps![])));
    }

    #[test]
    fn reducer_state_persists_and_requests_update() {
        let mut harness = Harness::new();
        let reducer = |state: &i32, delta: i32| state + delta;

        let (state, dispatch) = harness.render(|hooks| hooks.use_reducer(reducer, 10)).unwrap();
        assert_eq!(state, 10);

        dispatch.dispatch(5);
        assert_eq!(harness.sink.requests.lock().len(), 1);

        let (state, again) = harness.render(|hooks| hooks.use_reducer(reducer, 0)).unwrap();
        assert_eq!(state, 15);
        assert_eq!(dispatch, again);
    }

    #[test]
    fn unchanged_state_does_not_request_update() {
        let mut harness = Harness::new();
        let (_, set) = harness.render(|hooks| hooks.use_state("idle".to_string())).unwrap();

        set.set("idle".to_string());
        assert!(harness.sink.requests.lock().is_empty());

        set.update(|s| format!("{s}!"));
        assert_eq!(harness.sink.requests.lock().len(), 1);
    }

    #[test]
    fn memo_is_reused_until_deps_change() {
        let mut harness = Harness::new();
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            vec![1, 2, 3]
        };

        let first = harness.render(|hooks| hooks.use_memo(compute, deps![1])).unwrap();
        let second = harness.render(|hooks| hooks.use_memo(compute, deps![1])).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let third = harness.render(|hooks| hooks.use_memo(compute, deps![2])).unwrap();
        assert!(!Arc::ptr_eq(&second, &third));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn callback_identity_follows_deps() {
        fn increment(hooks: &mut Hooks<'_>, dep: &str) -> Result<Arc<impl Fn(i32) -> i32 + Send + Sync>> {
            hooks.use_callback(|x: i32| x + 1, deps![dep])
        }

        let mut harness = Harness::new();
        let first = harness.render(|hooks| increment(hooks, "a")).unwrap();
        let second = harness.render(|hooks| increment(hooks, "a")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second(1), 2);

        let third = harness.render(|hooks| increment(hooks, "b")).unwrap();
        assert!(!Arc::ptr_eq(&second, &third));
    }

    #[test]
    fn ref_cell_survives_renders() {
        let mut harness = Harness::new();
        let first = harness.render(|hooks| hooks.use_ref(0u32)).unwrap();
        first.set(7);
        let second = harness.render(|hooks| hooks.use_ref(0u32)).unwrap();
        assert_eq!(second.get(), 7);
        assert_eq!(first, second);
    }

    #[test]
    fn effect_is_pending_only_when_deps_change() {
        let mut harness = Harness::new();
        let pending = |harness: &Harness| {
            harness.records.as_ref().unwrap()[0]
                .effect()
                .map(EffectHook::is_pending)
                .unwrap()
        };

        harness.render(|hooks| hooks.use_effect(|| None, Some(deps![1]))).unwrap();
        assert!(pending(&harness));

        harness.render(|hooks| hooks.use_effect(|| None, Some(deps![1]))).unwrap();
        assert!(!pending(&harness));

        harness.render(|hooks| hooks.use_effect(|| None, None)).unwrap();
        assert!(pending(&harness));
    }

    #[test]
    fn id_is_stable_per_slot() {
        let mut harness = Harness::new();
        let first = harness.render(|hooks| hooks.use_id()).unwrap();
        let second = harness.render(|hooks| hooks.use_id()).unwrap();
        assert_eq!(&*first, ":t0:");
        assert_eq!(first, second);
    }

    #[test]
    fn changed_order_is_rejected() {
        let mut harness = Harness::new();
        harness
            .render(|hooks| {
                hooks.use_state(0)?;
                hooks.use_ref(())?;
                Ok(())
            })
            .unwrap();

        let err = harness
            .render(|hooks| {
                hooks.use_ref(())?;
                hooks.use_state(0)?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(
            err,
            Error::HookOrderChanged {
                index: 0,
                previous: HookKind::Reducer,
                current: HookKind::Ref,
                ..
            }
        ));
    }

    #[test]
    fn changed_count_is_rejected() {
        let mut harness = Harness::new();
        harness.render(|hooks| hooks.use_state(0).map(|_| ())).unwrap();

        let fewer = harness.render(|_| Ok(())).unwrap_err();
        assert!(matches!(fewer, Error::HookCountChanged { previous: 1, current: 0, .. }));

        let more = harness
            .render(|hooks| {
                hooks.use_state(0)?;
                hooks.use_id()?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(more, Error::HookCountChanged { previous: 1, current: 2, .. }));
    }

    #[test]
    fn changed_value_type_is_rejected() {
        let mut harness = Harness::new();
        harness.render(|hooks| hooks.use_ref(1u8).map(|_| ())).unwrap();
        let err = harness.render(|hooks| hooks.use_ref("x").map(|_| ())).unwrap_err();
        assert!(matches!(err, Error::HookTypeMismatch { index: 0, .. }));
    }

    #[test]
    fn imperative_handle_takes_two_slots() {
        let mut harness = Harness::new();
        let target = NodeRef::from(crate::element::RefObject::new());
        harness
            .render(|hooks| hooks.use_imperative_handle(&target, || PropValue::from("api"), None))
            .unwrap();

        let records = harness.records.as_ref().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind(), HookKind::ImperativeHandle);
        assert_eq!(records[1].kind(), HookKind::LayoutEffect);
    }

    fn reducer_slot(harness: &Harness) -> Arc<dyn ReducerSlot> {
        let records = harness.records.as_ref().unwrap();
        records[0].reducer().unwrap().clone()
    }

    #[test]
    fn discarded_render_drops_dispatched_state() {
        let mut harness = Harness::new();
        let (_, set) = harness.render(|hooks| hooks.use_state(0)).unwrap();
        reducer_slot(&harness).commit();

        set.set(1);
        let (shown, _) = harness.render(|hooks| hooks.use_state(0)).unwrap();
        assert_eq!(shown, 1);
        reducer_slot(&harness).discard();

        // The committed value is back in charge, so the same value counts as a change.
        set.set(1);
        assert_eq!(harness.sink.requests.lock().len(), 2);
        let (shown, _) = harness.render(|hooks| hooks.use_state(0)).unwrap();
        assert_eq!(shown, 1);
    }

    #[test]
    fn dispatch_after_render_survives_commit() {
        let mut harness = Harness::new();
        let (_, set) = harness.render(|hooks| hooks.use_state(0)).unwrap();
        set.set(1);
        harness.render(|hooks| hooks.use_state(0)).unwrap();

        // Arrives while the render is waiting to commit.
        set.set(2);
        reducer_slot(&harness).commit();

        let (shown, _) = harness.render(|hooks| hooks.use_state(0)).unwrap();
        assert_eq!(shown, 2);
    }

    #[test]
    fn reducer_may_dispatch_to_itself() {
        let mut harness = Harness::new();
        let inner: Arc<Mutex<Option<SetState<i32>>>> = Arc::new(Mutex::new(None));
        let (_, set) = harness.render(|hooks| hooks.use_state(0)).unwrap();
        *inner.lock() = Some(set.clone());

        let again = inner.clone();
        set.update(move |n| {
            if let Some(set) = again.lock().take() {
                set.update(|n| n * 10);
            }
            n + 1
        });

        let (shown, _) = harness.render(|hooks| hooks.use_state(0)).unwrap();
        assert_eq!(shown, 10);
    }

    #[test]
    fn lazy_initial_state_runs_on_mount_only() {
        let mut harness = Harness::new();
        let calls = AtomicUsize::new(0);
        let init = |words: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            words.split(' ').count()
        };
        let add = |n: &usize, more: usize| n + more;

        let (count, dispatch) = harness
            .render(|hooks| hooks.use_reducer_with_init(add, "one two three", init))
            .unwrap();
        assert_eq!(count, 3);

        dispatch.dispatch(2);
        let (count, _) = harness
            .render(|hooks| hooks.use_reducer_with_init(add, "ignored", init))
            .unwrap();
        assert_eq!(count, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
