//! Hook Records
//!
//! One record per hook call, stored on the fiber in call order. Persisted
//! values are type-erased cells shared with the previous generation's record,
//! so a new snapshot can be built without copying state.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Deps, ReducerSlot};
use crate::element::NodeRef;

/// Type-erased persisted value.
pub(crate) type Cell = Arc<dyn Any + Send + Sync>;

/// Teardown returned by an effect.
pub type Cleanup = Box<dyn FnOnce() + Send>;

pub(crate) type EffectFn = Box<dyn FnOnce() -> Option<Cleanup> + Send>;

/// The kind of a hook call, used to detect unstable call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Reducer,
    Effect,
    LayoutEffect,
    Memo,
    Callback,
    Ref,
    ImperativeHandle,
    Id,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reducer => "reducer",
            Self::Effect => "effect",
            Self::LayoutEffect => "layout effect",
            Self::Memo => "memo",
            Self::Callback => "callback",
            Self::Ref => "ref",
            Self::ImperativeHandle => "imperative handle",
            Self::Id => "id",
        };
        f.write_str(name)
    }
}

/// State of an effect or layout-effect slot.
///
/// The cleanup cell is shared by every generation of the slot: whichever
/// generation runs next takes the teardown left by the one before it.
#[derive(Clone)]
pub(crate) struct EffectHook {
    create: Arc<Mutex<Option<EffectFn>>>,
    pub(crate) deps: Option<Deps>,
    cleanup: Arc<Mutex<Option<Cleanup>>>,
    pending: bool,
}

impl EffectHook {
    /// A slot whose effect runs at the next commit.
    pub(crate) fn scheduled(
        create: EffectFn,
        deps: Option<Deps>,
        cleanup: Arc<Mutex<Option<Cleanup>>>,
    ) -> Self {
        Self {
            create: Arc::new(Mutex::new(Some(create))),
            deps,
            cleanup,
            pending: true,
        }
    }

    /// A slot whose dependencies did not change.
    pub(crate) fn idle(deps: Option<Deps>, cleanup: Arc<Mutex<Option<Cleanup>>>) -> Self {
        Self {
            create: Arc::new(Mutex::new(None)),
            deps,
            cleanup,
            pending: false,
        }
    }

    pub(crate) fn cleanup_cell(&self) -> Arc<Mutex<Option<Cleanup>>> {
        self.cleanup.clone()
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending
    }

    /// Run the previous teardown, then the effect. Runs at most once.
    pub(crate) fn run(&self) {
        let Some(create) = self.create.lock().take() else {
            return;
        };
        self.run_cleanup();
        let cleanup = create();
        *self.cleanup.lock() = cleanup;
    }

    /// Run the stored teardown, if any.
    pub(crate) fn run_cleanup(&self) {
        let cleanup = self.cleanup.lock().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }
}

/// Persisted state of one hook call.
#[derive(Clone)]
pub(crate) enum HookRecord {
    Reducer(Arc<dyn ReducerSlot>),
    Effect(EffectHook),
    LayoutEffect(EffectHook),
    Memo { value: Cell, deps: Deps },
    Callback { value: Cell, deps: Deps },
    Ref(Cell),
    ImperativeHandle { target: NodeRef },
    Id(Arc<str>),
}

impl HookRecord {
    pub(crate) fn kind(&self) -> HookKind {
        match self {
            Self::Reducer(_) => HookKind::Reducer,
            Self::Effect(_) => HookKind::Effect,
            Self::LayoutEffect(_) => HookKind::LayoutEffect,
            Self::Memo { .. } => HookKind::Memo,
            Self::Callback { .. } => HookKind::Callback,
            Self::Ref(_) => HookKind::Ref,
            Self::ImperativeHandle { .. } => HookKind::ImperativeHandle,
            Self::Id(_) => HookKind::Id,
        }
    }

    pub(crate) fn reducer(&self) -> Option<&Arc<dyn ReducerSlot>> {
        match self {
            Self::Reducer(slot) => Some(slot),
            _ => None,
        }
    }

    /// The effect slot, for either effect flavour.
    pub(crate) fn effect(&self) -> Option<&EffectHook> {
        match self {
            Self::Effect(hook) | Self::LayoutEffect(hook) => Some(hook),
            _ => None,
        }
    }
}

impl fmt::Debug for HookRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Effect(hook) | Self::LayoutEffect(hook) => f
                .debug_struct("Effect")
                .field("layout", &matches!(self, Self::LayoutEffect(_)))
                .field("deps", &hook.deps)
                .field("pending", &hook.pending)
                .finish(),
            Self::Memo { deps, .. } | Self::Callback { deps, .. } => {
                write!(f, "{}({deps:?})", self.kind())
            }
            Self::ImperativeHandle { target } => {
                f.debug_tuple("ImperativeHandle").field(target).finish()
            }
            Self::Id(id) => f.debug_tuple("Id").field(id).finish(),
            Self::Reducer(_) | Self::Ref(_) => write!(f, "{}", self.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn kinds_display_in_lower_case() {
        assert_eq!(HookKind::Memo.to_string(), "memo");
        assert_eq!(HookKind::LayoutEffect.to_string(), "layout effect");
    }

    #[test]
    fn effect_runs_once_and_cleans_up_predecessor() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let cleanup = Arc::new(Mutex::new(None));

        let first = {
            let log = log.clone();
            EffectHook::scheduled(
                Box::new(move || {
                    log.lock().push("create 1");
                    let log = log.clone();
                    Some(Box::new(move || log.lock().push("cleanup 1")) as Cleanup)
                }),
                None,
                cleanup.clone(),
            )
        };
        first.run();
        first.run();

        let second = {
            let log = log.clone();
            EffectHook::scheduled(
                Box::new(move || {
                    log.lock().push("create 2");
                    None
                }),
                None,
                first.cleanup_cell(),
            )
        };
        second.run();

        assert_eq!(*log.lock(), vec!["create 1", "cleanup 1", "create 2"]);
    }

    #[test]
    fn idle_effect_keeps_previous_cleanup() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let counter = cleaned.clone();
        let cell: Arc<Mutex<Option<Cleanup>>> = Arc::new(Mutex::new(Some(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))));

        let hook = EffectHook::idle(None, cell);
        hook.run();
        assert!(!hook.is_pending());
        assert_eq!(cleaned.load(Ordering::SeqCst), 0);

        hook.run_cleanup();
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }
}
