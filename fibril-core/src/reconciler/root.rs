//! Roots
//!
//! A [`Root`] owns the fiber tree mounted into one host container and the
//! queue of requests against it.
//!
//! # Requests
//!
//! Root renders and state-driven updates share one FIFO queue. The work loop
//! runs as a scheduler work item: it takes the next request, builds a
//! work-in-progress tree one fiber at a time, and commits it. When the yield
//! clock says the budget is spent, the loop reschedules itself and returns.
//! The next unit of work is kept on the build, so resuming needs nothing from
//! the call stack.
//!
//! # Locking
//!
//! The tree is locked for the whole of a work-loop turn. Dispatching state,
//! calling [`Root::render`] and the other public methods only touch the
//! request queue, so components and effects may call them freely. Lock order
//! is tree, then requests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use super::commit::{self, CommitSummary};
use super::diff::{self, BuildLog};
use crate::config::RendererConfig;
use crate::element::{Child, Component, Context, Props};
use crate::error::{Error, Result};
use crate::fiber::{EffectTag, Fiber, FiberId, FiberKind, FiberTree, SlotId};
use crate::hooks::{EffectHook, HookRecord, Hooks, UpdateSink};
use crate::host::{apply_props, HostHandle, HostRenderer};
use crate::scheduler::{Scheduler, TimeSource, WorkId, YieldClock};

enum Request {
    /// Replace the root's children.
    Render(Vec<Child>),
    /// Re-render one component instance.
    Update(SlotId),
}

#[derive(Default)]
struct RequestQueue {
    items: VecDeque<Request>,
    committing: bool,
    loop_task: Option<WorkId>,
}

/// What a build replaces when it commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuildScope {
    /// The whole tree under the container.
    Root,
    /// One component instance and its descendants.
    Subtree,
}

/// An in-progress build.
pub(crate) struct Build {
    pub(crate) root: FiberId,
    pub(crate) replaces: Option<FiberId>,
    pub(crate) scope: BuildScope,
    next: Option<FiberId>,
    pub(crate) log: BuildLog,
}

impl Build {
    fn new(root: FiberId, replaces: Option<FiberId>, scope: BuildScope) -> Self {
        let mut log = BuildLog::default();
        log.allocated.push(root);
        Self {
            root,
            replaces,
            scope,
            next: Some(root),
            log,
        }
    }
}

struct PassiveBatch {
    work: WorkId,
    effects: Vec<EffectHook>,
}

pub(crate) struct TreeState {
    pub(crate) fibers: FiberTree,
    pub(crate) current: Option<FiberId>,
    /// Committed fiber of every mounted component, by slot.
    pub(crate) instances: HashMap<SlotId, FiberId>,
    container: HostHandle,
    build: Option<Build>,
    passive: Option<PassiveBatch>,
    clock: YieldClock,
    /// Every context a provider in this tree has written to.
    contexts: Vec<Context>,
}

impl TreeState {
    fn reconcile(&mut self, parent: FiberId, children: &[Child]) {
        let Some(build) = self.build.as_mut() else {
            return;
        };
        let previous = self.fibers[parent]
            .alternate
            .and_then(|id| self.fibers.get(id))
            .and_then(|old| old.child);
        diff::reconcile_children(&mut self.fibers, parent, previous, children, &mut build.log);
    }
}

#[derive(Default)]
struct Report {
    last_commit: Option<CommitSummary>,
    last_error: Option<Error>,
    commits: u64,
}

pub(crate) struct RootShared {
    weak: Weak<RootShared>,
    host: Arc<dyn HostRenderer>,
    scheduler: Scheduler,
    container: HostHandle,
    id_prefix: String,
    ids: AtomicU64,
    requests: Mutex<RequestQueue>,
    tree: Mutex<TreeState>,
    report: Mutex<Report>,
}

impl UpdateSink for RootShared {
    fn request_update(&self, slot: SlotId) {
        self.request(Request::Update(slot));
    }
}

impl RootShared {
    fn request(&self, request: Request) {
        let mut queue = self.requests.lock();
        if let Request::Update(slot) = &request {
            let queued = queue
                .items
                .iter()
                .any(|item| matches!(item, Request::Update(other) if other == slot));
            if queued {
                trace!(slot = slot.raw(), "update already queued");
                return;
            }
        }
        queue.items.push_back(request);
        if !queue.committing {
            self.schedule_loop(&mut queue);
        }
    }

    fn schedule_loop(&self, queue: &mut RequestQueue) {
        if queue.loop_task.is_some() {
            return;
        }
        let Some(this) = self.weak.upgrade() else {
            return;
        };
        queue.loop_task = Some(self.scheduler.schedule_work(move || this.work_loop()));
    }

    /// Schedule another turn if requests are waiting.
    fn resume_pending(&self) {
        let mut queue = self.requests.lock();
        if !queue.items.is_empty() {
            self.schedule_loop(&mut queue);
        }
    }

    fn work_loop(&self) {
        let _span = tracing::debug_span!("work_loop", container = self.container.raw()).entered();
        self.requests.lock().loop_task = None;

        let mut guard = self.tree.lock();
        let tree = &mut *guard;
        if tree.build.is_none() && !self.begin_build(tree) {
            return;
        }

        tree.clock.start_run();
        let mut performed = 0usize;
        loop {
            let Some((root, Some(unit))) = tree.build.as_ref().map(|b| (b.root, b.next)) else {
                break;
            };
            if performed > 0 && tree.clock.should_yield() {
                trace!(performed, "yielding");
                drop(guard);
                self.schedule_loop(&mut self.requests.lock());
                return;
            }
            if let Err(err) = self.perform_unit(tree, unit) {
                self.abort_build(tree, err);
                drop(guard);
                self.resume_pending();
                return;
            }
            performed += 1;

            let next = tree.fibers.next_in_walk(unit, root);
            if let Some(build) = tree.build.as_mut() {
                build.next = next;
            }
        }

        if let Some(build) = tree.build.take() {
            trace!(performed, "build complete");
            self.finish_build(tree, build);
        }
        drop(guard);
        self.resume_pending();
    }

    /// Flush passive effects left by the last commit, then start the next
    /// build. Returns `false` when no request remains.
    fn begin_build(&self, tree: &mut TreeState) -> bool {
        if let Some(batch) = tree.passive.take() {
            self.scheduler.cancel_work(batch.work);
            trace!(effects = batch.effects.len(), "flushing passive effects before build");
            run_passive(batch.effects);
        }

        loop {
            let Some(request) = self.requests.lock().items.pop_front() else {
                return false;
            };
            match request {
                Request::Render(children) => {
                    start_root_build(tree, children);
                    return true;
                }
                Request::Update(slot) => match tree.instances.get(&slot).copied() {
                    Some(target) => {
                        start_subtree_build(tree, target);
                        return true;
                    }
                    None => debug!(slot = slot.raw(), "dropping update for unmounted component"),
                },
            }
        }
    }

    fn perform_unit(&self, tree: &mut TreeState, id: FiberId) -> Result<()> {
        let kind = tree.fibers[id].kind.clone();
        trace!(fiber = id.raw(), kind = kind.label(), "unit of work");

        let children = match &kind {
            FiberKind::Root => tree.fibers[id].props.children().to_vec(),
            FiberKind::Text => {
                if tree.fibers[id].host.is_none() {
                    let node = self.host.create_text(tree.fibers[id].text().unwrap_or_default());
                    tree.fibers[id].host = Some(node);
                }
                return Ok(());
            }
            FiberKind::Host(tag) => {
                if tree.fibers[id].host.is_none() {
                    match self.host.create_node(tag) {
                        Ok(node) => {
                            apply_props(&*self.host, node, &Props::new(), &tree.fibers[id].props);
                            tree.fibers[id].host = Some(node);
                        }
                        Err(err) => {
                            warn!(%err, kind = %tag, "host node not created, skipping its subtree");
                            return Ok(());
                        }
                    }
                }
                tree.fibers[id].props.children().to_vec()
            }
            FiberKind::Provider(context) => {
                if !tree.contexts.contains(context) {
                    tree.contexts.push(context.clone());
                }
                let props = &tree.fibers[id].props;
                context.provide(props.get("value").cloned().unwrap_or_default());
                props.children().to_vec()
            }
            FiberKind::Component(component) => self.render_component(tree, id, component)?,
        };

        tree.reconcile(id, &children);
        Ok(())
    }

    fn render_component(&self, tree: &mut TreeState, id: FiberId, component: &Component) -> Result<Vec<Child>> {
        let fiber = &tree.fibers[id];
        let props = fiber.props.clone();
        let slot = fiber.slot;
        let previous = fiber
            .alternate
            .and_then(|alt| tree.fibers.get(alt))
            .map(|alt| alt.hooks.clone());
        for slot in previous.iter().flatten().filter_map(HookRecord::reducer) {
            slot.begin_render();
        }

        let sink: Weak<dyn UpdateSink> = self.weak.clone();
        let mut hooks = Hooks::new(
            component.name(),
            slot,
            previous.as_deref(),
            sink,
            &self.ids,
            &self.id_prefix,
        );
        let children = component.render(&mut hooks, &props).map_err(|err| match err {
            Error::Message(message) => Error::render(component.name(), message),
            other => other,
        })?;
        tree.fibers[id].hooks = hooks.finish()?;
        Ok(children)
    }

    /// Drop a failed build. The committed tree stays as it was.
    ///
    /// State dispatched for the aborted renders is discarded, and host nodes
    /// the build created are released without ever having been attached.
    fn abort_build(&self, tree: &mut TreeState, err: Error) {
        let Some(build) = tree.build.take() else {
            return;
        };
        error!(error = %err, "build aborted, keeping the committed tree");

        for &id in &build.log.deletions {
            if let Some(fiber) = tree.fibers.get_mut(id) {
                fiber.effect = EffectTag::None;
            }
        }
        if let Some(fiber) = build.replaces.and_then(|id| tree.fibers.get_mut(id)) {
            fiber.alternate = None;
        }
        for id in build.log.allocated {
            let Some(fiber) = tree.fibers.remove(id) else {
                continue;
            };
            for slot in fiber.hooks.iter().filter_map(HookRecord::reducer) {
                slot.discard();
            }
            let inherited = fiber.alternate.and_then(|alt| tree.fibers.get(alt)).and_then(|alt| alt.host);
            match fiber.host {
                Some(node) if fiber.kind != FiberKind::Root && inherited != Some(node) => {
                    self.host.release(node);
                }
                _ => {}
            }
        }
        self.report.lock().last_error = Some(err);
    }

    fn finish_build(&self, tree: &mut TreeState, build: Build) {
        self.requests.lock().committing = true;
        let committed = commit::commit(&*self.host, tree, build);

        if !committed.passive.is_empty() {
            if let Some(this) = self.weak.upgrade() {
                let work = self.scheduler.schedule_work(move || this.flush_passive_effects());
                tree.passive = Some(PassiveBatch {
                    work,
                    effects: committed.passive,
                });
            }
        }

        let mut report = self.report.lock();
        report.last_commit = Some(committed.summary);
        report.commits += 1;
        drop(report);

        self.requests.lock().committing = false;
    }

    fn flush_passive_effects(&self) {
        let batch = self.tree.lock().passive.take();
        if let Some(batch) = batch {
            trace!(effects = batch.effects.len(), "running passive effects");
            run_passive(batch.effects);
        }
    }
}

fn run_passive(effects: Vec<EffectHook>) {
    for effect in effects {
        effect.run();
    }
}

fn start_root_build(tree: &mut TreeState, children: Vec<Child>) {
    for context in &tree.contexts {
        context.reset();
    }
    let current = tree.current;
    let slot = match current {
        Some(id) => tree.fibers[id].slot,
        None => tree.fibers.allocate_slot(),
    };
    let props = Props::new().with_children(children);
    let mut fiber = Fiber::new(FiberKind::Root, props, Some(tree.container), slot);
    fiber.alternate = current;

    let id = tree.fibers.insert(fiber);
    if let Some(current) = current {
        tree.fibers[current].alternate = Some(id);
    }
    debug!(fiber = id.raw(), "starting root build");
    tree.build = Some(Build::new(id, current, BuildScope::Root));
}

fn start_subtree_build(tree: &mut TreeState, target: FiberId) {
    for context in &tree.contexts {
        context.reset();
    }
    // Re-provide what the target's ancestors provide, outermost first.
    let mut providers = Vec::new();
    let mut cursor = tree.fibers[target].parent;
    while let Some(id) = cursor {
        let fiber = &tree.fibers[id];
        if let FiberKind::Provider(context) = &fiber.kind {
            providers.push((context.clone(), fiber.props.get("value").cloned().unwrap_or_default()));
        }
        cursor = fiber.parent;
    }
    for (context, value) in providers.into_iter().rev() {
        context.provide(value);
    }

    let mut fiber = Fiber::rebuild_of(&tree.fibers[target]);
    fiber.alternate = Some(target);

    let id = tree.fibers.insert(fiber);
    tree.fibers[target].alternate = Some(id);
    debug!(
        fiber = id.raw(),
        component = tree.fibers[id].kind.label(),
        "starting subtree build"
    );
    tree.build = Some(Build::new(id, Some(target), BuildScope::Subtree));
}

/// Handle to a tree mounted into one host container.
///
/// Cloning yields another handle to the same root.
#[derive(Clone)]
pub struct Root {
    shared: Arc<RootShared>,
}

impl Root {
    pub(crate) fn new(
        host: Arc<dyn HostRenderer>,
        scheduler: Scheduler,
        container: HostHandle,
        config: &RendererConfig,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        let shared = Arc::new_cyclic(|weak| RootShared {
            weak: weak.clone(),
            host,
            scheduler,
            container,
            id_prefix: config.id_prefix.clone(),
            ids: AtomicU64::new(0),
            requests: Mutex::new(RequestQueue::default()),
            tree: Mutex::new(TreeState {
                fibers: FiberTree::new(),
                current: None,
                instances: HashMap::new(),
                container,
                build: None,
                passive: None,
                clock: YieldClock::new(time, config.time_budget()),
                contexts: Vec::new(),
            }),
            report: Mutex::new(Report::default()),
        });
        Self { shared }
    }

    /// Enqueue a build rendering `child` as the root's only child.
    pub fn render(&self, child: impl Into<Child>) {
        self.shared.request(Request::Render(vec![child.into()]));
    }

    /// Enqueue a build with no children, tearing down the whole tree.
    pub fn unmount(&self) {
        self.shared.request(Request::Render(Vec::new()));
    }

    pub fn container(&self) -> HostHandle {
        self.shared.container
    }

    /// Tag counts of the most recent commit.
    pub fn last_commit(&self) -> Option<CommitSummary> {
        self.shared.report.lock().last_commit
    }

    /// Number of commits so far.
    pub fn commit_count(&self) -> u64 {
        self.shared.report.lock().commits
    }

    /// Take the error that aborted the most recent failed build.
    pub fn take_error(&self) -> Option<Error> {
        self.shared.report.lock().last_error.take()
    }

    /// Whether requests are queued or a build is waiting to resume.
    pub fn has_pending_work(&self) -> bool {
        let queue = self.shared.requests.lock();
        !queue.items.is_empty() || queue.loop_task.is_some()
    }

    /// Number of live fibers, or `None` while the tree is busy (for example
    /// when called from inside a component or effect).
    pub fn fiber_count(&self) -> Option<usize> {
        self.shared.tree.try_lock().map(|tree| tree.fibers.len())
    }
}

impl std::fmt::Debug for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Root")
            .field("container", &self.shared.container)
            .finish()
    }
}
