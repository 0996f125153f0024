//! Child Reconciliation
//!
//! Diffs a new child list against the previous generation's child fibers and
//! links the resulting work-in-progress children under their parent.
//!
//! # Matching
//!
//! Both lists are walked in lockstep by position. A slot matches when the old
//! fiber and the new child have the same kind and the same key (an unkeyed
//! child only matches an unkeyed fiber). A match becomes an Update fiber that
//! carries the old host node, hook records and slot. A mismatch tags the old
//! fiber Deletion and allocates a Placement fiber. Old fibers left over at the
//! end are tagged Deletion.
//!
//! Fragments are flattened before the walk, so their children take part in
//! the same positional diff and a fragment never occupies a slot.
//!
//! # Keys
//!
//! A keyed child whose key is not on the positional old fiber but appears on a
//! later old sibling deletes the fibers in between and resumes there. Removing
//! one keyed item from a list therefore costs a single Deletion. Reordering is
//! still observed as deletions and placements, never as a move.

use crate::element::Child;
use crate::fiber::{EffectTag, Fiber, FiberId, FiberTree};

/// Bookkeeping of one build, filled in while diffing.
#[derive(Debug, Default)]
pub(crate) struct BuildLog {
    /// Old-generation fibers tagged Deletion, in the order they were tagged.
    pub(crate) deletions: Vec<FiberId>,
    /// Every fiber this build added to the arena.
    pub(crate) allocated: Vec<FiberId>,
}

fn flatten<'a>(children: &'a [Child], out: &mut Vec<&'a Child>) {
    for child in children {
        match child {
            Child::Element(element) if element.is_fragment() => {
                flatten(element.props().children(), out)
            }
            other => out.push(other),
        }
    }
}

fn delete(tree: &mut FiberTree, id: FiberId, log: &mut BuildLog) {
    tree[id].effect = EffectTag::Deletion;
    log.deletions.push(id);
}

/// Advance `old` to the later sibling carrying `key`, deleting what is skipped.
fn skip_to_key(
    tree: &mut FiberTree,
    old: Option<FiberId>,
    key: &str,
    log: &mut BuildLog,
) -> Option<FiberId> {
    let start = old?;
    if tree[start].key() == Some(key) {
        return old;
    }

    let mut cursor = tree[start].sibling;
    while let Some(candidate) = cursor {
        if tree[candidate].key() == Some(key) {
            let mut stale = Some(start);
            while let Some(id) = stale.filter(|&id| id != candidate) {
                stale = tree[id].sibling;
                delete(tree, id, log);
            }
            return Some(candidate);
        }
        cursor = tree[candidate].sibling;
    }
    old
}

/// Build the children of `parent` from `children`, diffing against the old
/// child list starting at `previous`.
pub(crate) fn reconcile_children(
    tree: &mut FiberTree,
    parent: FiberId,
    previous: Option<FiberId>,
    children: &[Child],
    log: &mut BuildLog,
) {
    let mut flat = Vec::with_capacity(children.len());
    flatten(children, &mut flat);

    tree[parent].child = None;
    let mut old = previous;
    let mut last: Option<FiberId> = None;

    for child in flat {
        if let Some(key) = child.key() {
            old = skip_to_key(tree, old, key, log);
        }
        let positional = old;
        old = positional.and_then(|id| tree[id].sibling);

        let fiber = match positional {
            Some(prev) if tree[prev].matches(child) => {
                let mut fiber = Fiber::reuse(&tree[prev], child);
                fiber.alternate = Some(prev);
                fiber
            }
            stale => {
                if let Some(prev) = stale {
                    delete(tree, prev, log);
                }
                let slot = tree.allocate_slot();
                let Some(fiber) = Fiber::placement(child, slot) else {
                    continue;
                };
                fiber
            }
        };

        let id = tree.insert(fiber);
        log.allocated.push(id);
        tree[id].parent = Some(parent);
        match last {
            Some(prev) => tree[prev].sibling = Some(id),
            None => tree[parent].child = Some(id),
        }
        last = Some(id);
    }

    while let Some(stale) = old {
        old = tree[stale].sibling;
        delete(tree, stale, log);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, Props};
    use crate::fiber::FiberKind;
    use crate::host::HostHandle;

    fn div(key: &str) -> Child {
        Element::host("div").with_key(key).into()
    }

    fn root(tree: &mut FiberTree) -> FiberId {
        let slot = tree.allocate_slot();
        tree.insert(Fiber::new(
            FiberKind::Root,
            Props::new(),
            Some(HostHandle::from_raw(1)),
            slot,
        ))
    }

    /// Mount `children` and clear their tags, as a commit would.
    fn mount(children: &[Child]) -> (FiberTree, FiberId) {
        let mut tree = FiberTree::new();
        let parent = root(&mut tree);
        reconcile_children(&mut tree, parent, None, children, &mut BuildLog::default());
        for id in tree.children(parent) {
            tree[id].effect = EffectTag::None;
        }
        (tree, parent)
    }

    /// Diff `children` against the children of `old_parent` under a fresh parent.
    fn rerender(tree: &mut FiberTree, old_parent: FiberId, children: &[Child]) -> (FiberId, BuildLog) {
        let parent = root(tree);
        let previous = tree[old_parent].child;
        let mut log = BuildLog::default();
        reconcile_children(tree, parent, previous, children, &mut log);
        (parent, log)
    }

    fn effects(tree: &FiberTree, parent: FiberId) -> Vec<EffectTag> {
        tree.children(parent).into_iter().map(|id| tree[id].effect).collect()
    }

    #[test]
    fn mount_places_every_child() {
        let mut tree = FiberTree::new();
        let parent = root(&mut tree);
        let mut log = BuildLog::default();
        reconcile_children(&mut tree, parent, None, &["a".into(), div("x")], &mut log);

        assert_eq!(effects(&tree, parent), vec![EffectTag::Placement; 2]);
        assert_eq!(log.allocated.len(), 2);
        assert!(log.deletions.is_empty());
    }

    #[test]
    fn unchanged_children_become_updates() {
        let children = vec![div("a"), Child::from("text"), div("b")];
        let (mut tree, old_parent) = mount(&children);
        let old = tree.children(old_parent);

        let (parent, log) = rerender(&mut tree, old_parent, &children);
        assert!(log.deletions.is_empty());
        assert_eq!(effects(&tree, parent), vec![EffectTag::Update; 3]);

        let alternates: Vec<_> = tree
            .children(parent)
            .into_iter()
            .map(|id| tree[id].alternate.unwrap())
            .collect();
        assert_eq!(alternates, old);
    }

    #[test]
    fn keyed_removal_from_the_middle_is_one_deletion() {
        let (mut tree, old_parent) = mount(&[div("a"), div("b"), div("c")]);
        let old = tree.children(old_parent);

        let (parent, log) = rerender(&mut tree, old_parent, &[div("a"), div("c")]);
        assert_eq!(log.deletions, vec![old[1]]);
        assert_eq!(tree[old[1]].effect, EffectTag::Deletion);
        assert_eq!(effects(&tree, parent), vec![EffectTag::Update, EffectTag::Update]);

        let new = tree.children(parent);
        assert_eq!(tree[new[1]].alternate, Some(old[2]));
    }

    #[test]
    fn unkeyed_reorder_is_not_a_move() {
        let a: Child = Element::host("div").into();
        let b: Child = Element::host("span").into();
        let (mut tree, old_parent) = mount(&[a.clone(), b.clone()]);
        let old = tree.children(old_parent);

        let (parent, log) = rerender(&mut tree, old_parent, &[b, a]);
        assert_eq!(log.deletions, old);
        assert_eq!(effects(&tree, parent), vec![EffectTag::Placement; 2]);
        assert!(tree.children(parent).iter().all(|&id| tree[id].alternate.is_none()));
    }

    #[test]
    fn keyed_reorder_is_not_a_move_either() {
        let (mut tree, old_parent) = mount(&[div("a"), div("b")]);
        let old = tree.children(old_parent);

        let (parent, log) = rerender(&mut tree, old_parent, &[div("b"), div("a")]);
        assert_eq!(log.deletions, vec![old[0]]);
        assert_eq!(effects(&tree, parent), vec![EffectTag::Update, EffectTag::Placement]);
    }

    #[test]
    fn fragments_are_spliced_inline() {
        let nested = Element::fragment([Child::from("x"), Element::fragment(["y"]).into()]);
        let (tree, parent) = mount(&[nested.into(), "z".into()]);

        let texts: Vec<_> = tree
            .children(parent)
            .into_iter()
            .map(|id| tree[id].text().unwrap().to_string())
            .collect();
        assert_eq!(texts, vec!["x", "y", "z"]);
    }

    #[test]
    fn fragment_children_diff_against_positional_fibers() {
        let (mut tree, old_parent) = mount(&["x".into(), "y".into()]);
        let (parent, log) = rerender(&mut tree, old_parent, &[Element::fragment(["x", "y"]).into()]);
        assert!(log.deletions.is_empty());
        assert_eq!(effects(&tree, parent), vec![EffectTag::Update; 2]);
    }

    #[test]
    fn leftover_fibers_are_deleted() {
        let (mut tree, old_parent) = mount(&["1".into(), "2".into(), "3".into()]);
        let old = tree.children(old_parent);

        let (parent, log) = rerender(&mut tree, old_parent, &["1".into()]);
        assert_eq!(log.deletions, old[1..].to_vec());
        assert_eq!(effects(&tree, parent), vec![EffectTag::Update]);
    }

    #[test]
    fn kind_change_replaces_the_slot() {
        let (mut tree, old_parent) = mount(&["text".into()]);
        let (parent, log) = rerender(&mut tree, old_parent, &[Element::host("p").into()]);

        assert_eq!(log.deletions.len(), 1);
        assert_eq!(effects(&tree, parent), vec![EffectTag::Placement]);
        let new = tree.children(parent)[0];
        assert_ne!(tree[new].slot, tree[log.deletions[0]].slot);
    }
}
