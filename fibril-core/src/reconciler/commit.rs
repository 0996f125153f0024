//! Commit Phase
//!
//! Applies a finished build to the host in three passes:
//!
//! 1. Deletions. Every fiber of a removed subtree has its ref cleared and its
//!    effect cleanups run, then the subtree's top host nodes are detached.
//! 2. Placements and updates, depth-first over the work-in-progress tree.
//! 3. Pending layout effects, depth-first. Pending passive effects are
//!    collected for a later scheduler turn.
//!
//! The work-in-progress tree is then promoted, which also makes the state each
//! component rendered its committed state, and the generation it replaced is
//! freed. A commit never yields.

use serde::Serialize;
use tracing::{debug, warn};

use super::root::{Build, BuildScope, TreeState};
use crate::element::RefValue;
use crate::fiber::{EffectTag, Fiber, FiberId, FiberKind, FiberTree, SlotId};
use crate::hooks::{EffectHook, HookRecord};
use crate::host::{apply_props, HostRenderer};

/// Effect tags applied by one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CommitSummary {
    pub placements: usize,
    pub updates: usize,
    pub deletions: usize,
}

impl CommitSummary {
    /// Whether the commit inserted or removed anything.
    pub fn is_structural(&self) -> bool {
        self.placements > 0 || self.deletions > 0
    }
}

pub(crate) struct Committed {
    pub(crate) summary: CommitSummary,
    /// Passive effects to run on a later turn, in tree order.
    pub(crate) passive: Vec<EffectHook>,
}

pub(crate) fn commit(host: &dyn HostRenderer, tree: &mut TreeState, build: Build) -> Committed {
    let _span = tracing::debug_span!("commit", root = build.root.raw()).entered();

    let mut summary = CommitSummary {
        deletions: build.log.deletions.len(),
        ..CommitSummary::default()
    };
    let removed = commit_deletions(host, &tree.fibers, &build.log.deletions);

    let order = tree.fibers.subtree(build.root);
    for &id in &order {
        match commit_mutation(host, &tree.fibers, id) {
            EffectTag::Placement => summary.placements += 1,
            EffectTag::Update => summary.updates += 1,
            _ => {}
        }
    }

    let passive = run_layout_effects(&tree.fibers, &order);
    promote(tree, &build, &order, &removed);

    debug!(
        placements = summary.placements,
        updates = summary.updates,
        deletions = summary.deletions,
        passive = passive.len(),
        "committed"
    );
    Committed { summary, passive }
}

/// Tear down every deleted subtree. Returns the slots of removed components.
fn commit_deletions(host: &dyn HostRenderer, fibers: &FiberTree, deletions: &[FiberId]) -> Vec<SlotId> {
    let mut slots = Vec::new();
    for &deleted in deletions {
        for id in fibers.subtree(deleted) {
            let fiber = &fibers[id];
            if let (Some(node_ref), Some(_)) = (&fiber.node_ref, fiber.host) {
                node_ref.set(None);
            }
            for hook in &fiber.hooks {
                if let Some(effect) = hook.effect() {
                    effect.run_cleanup();
                }
            }
            if matches!(fiber.kind, FiberKind::Component(_)) {
                slots.push(fiber.slot);
            }
        }

        let Some(parent) = fibers.host_parent(deleted) else {
            warn!(fiber = deleted.raw(), "deleted fiber has no host parent");
            continue;
        };
        for node in fibers.top_host_nodes(deleted) {
            if let Err(err) = host.remove_child(parent, node) {
                warn!(%err, "ignoring failed host removal");
            }
        }
    }
    slots
}

fn commit_mutation(host: &dyn HostRenderer, fibers: &FiberTree, id: FiberId) -> EffectTag {
    let fiber = &fibers[id];
    match fiber.effect {
        EffectTag::Placement => commit_placement(host, fibers, id, fiber),
        EffectTag::Update => commit_update(host, fibers, fiber),
        EffectTag::None | EffectTag::Deletion => {}
    }
    fiber.effect
}

fn commit_placement(host: &dyn HostRenderer, fibers: &FiberTree, id: FiberId, fiber: &Fiber) {
    let Some(node) = fiber.host else {
        return;
    };
    match fibers.host_parent(id) {
        Some(parent) => {
            let before = fibers.host_sibling(id);
            if let Err(err) = host.insert_child(parent, node, before) {
                warn!(%err, "ignoring failed host insertion");
            }
        }
        None => warn!(fiber = id.raw(), "placed fiber has no host parent"),
    }
    if let Some(node_ref) = &fiber.node_ref {
        node_ref.set(Some(RefValue::Node(node)));
    }
}

fn commit_update(host: &dyn HostRenderer, fibers: &FiberTree, fiber: &Fiber) {
    let (Some(node), Some(previous)) = (fiber.host, fiber.alternate.and_then(|id| fibers.get(id))) else {
        return;
    };

    match &fiber.kind {
        FiberKind::Text => {
            if previous.text() != fiber.text() {
                host.set_text(node, fiber.text().unwrap_or_default());
            }
        }
        FiberKind::Host(_) => apply_props(host, node, &previous.props, &fiber.props),
        _ => {}
    }

    if fiber.node_ref != previous.node_ref {
        if let Some(old) = &previous.node_ref {
            old.set(None);
        }
        if let Some(new) = &fiber.node_ref {
            new.set(Some(RefValue::Node(node)));
        }
    }
}

fn run_layout_effects(fibers: &FiberTree, order: &[FiberId]) -> Vec<EffectHook> {
    let mut passive = Vec::new();
    for &id in order {
        for hook in &fibers[id].hooks {
            match hook {
                HookRecord::LayoutEffect(effect) if effect.is_pending() => effect.run(),
                HookRecord::Effect(effect) if effect.is_pending() => passive.push(effect.clone()),
                _ => {}
            }
        }
    }
    passive
}

/// Make the work-in-progress tree current and free what it replaced.
fn promote(tree: &mut TreeState, build: &Build, order: &[FiberId], removed: &[SlotId]) {
    match build.scope {
        BuildScope::Root => tree.current = Some(build.root),
        BuildScope::Subtree => {
            if let Some(replaced) = build.replaces {
                splice(&mut tree.fibers, replaced, build.root);
            }
        }
    }

    if let Some(replaced) = build.replaces {
        for id in tree.fibers.subtree(replaced) {
            tree.fibers.remove(id);
        }
    }

    for slot in removed {
        tree.instances.remove(slot);
    }
    for &id in order {
        let fiber = &mut tree.fibers[id];
        fiber.alternate = None;
        fiber.effect = EffectTag::None;
        for slot in fiber.hooks.iter().filter_map(HookRecord::reducer) {
            slot.commit();
        }
        if matches!(fiber.kind, FiberKind::Component(_)) {
            tree.instances.insert(fiber.slot, id);
        }
    }
}

/// Put `new` in `old`'s place in its parent's child list.
fn splice(fibers: &mut FiberTree, old: FiberId, new: FiberId) {
    let Some(parent) = fibers[old].parent else {
        return;
    };
    if fibers[parent].child == Some(old) {
        fibers[parent].child = Some(new);
        return;
    }
    let mut cursor = fibers[parent].child;
    while let Some(id) = cursor {
        if fibers[id].sibling == Some(old) {
            fibers[id].sibling = Some(new);
            return;
        }
        cursor = fibers[id].sibling;
    }
}
