//! Fiber Arena
//!
//! Fibers live in an arena indexed by [`FiberId`]. Links between fibers,
//! including the cross-generation `alternate`, are plain ids, so the double
//! buffer has no reference cycles to manage.
//!
//! Walks are bounded by a root: a depth-first walk started at a fiber never
//! leaves that fiber's subtree, even when the fiber itself has siblings.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use super::node::{EffectTag, Fiber, FiberId, SlotId};
use crate::host::HostHandle;

/// Owns every live fiber of a root, across both generations.
#[derive(Debug, Default)]
pub struct FiberTree {
    fibers: HashMap<FiberId, Fiber>,
    next_id: u64,
    next_slot: u64,
}

impl FiberTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fiber to the arena.
    pub fn insert(&mut self, fiber: Fiber) -> FiberId {
        self.next_id += 1;
        let id = FiberId::from_raw(self.next_id);
        self.fibers.insert(id, fiber);
        id
    }

    /// Remove a fiber. Links pointing at it are the caller's concern.
    pub fn remove(&mut self, id: FiberId) -> Option<Fiber> {
        self.fibers.remove(&id)
    }

    pub fn get(&self, id: FiberId) -> Option<&Fiber> {
        self.fibers.get(&id)
    }

    pub fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber> {
        self.fibers.get_mut(&id)
    }

    pub fn contains(&self, id: FiberId) -> bool {
        self.fibers.contains_key(&id)
    }

    /// Get the total number of fibers in the arena.
    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    /// Allocate a new tree-slot identity.
    pub fn allocate_slot(&mut self) -> SlotId {
        self.next_slot += 1;
        SlotId::from_raw(self.next_slot)
    }

    /// Direct children of `id`, in sibling order.
    pub fn children(&self, id: FiberId) -> Vec<FiberId> {
        let mut out = Vec::new();
        let mut next = self.get(id).and_then(|f| f.child);
        while let Some(child) = next {
            out.push(child);
            next = self.get(child).and_then(|f| f.sibling);
        }
        out
    }

    /// The fiber after `id` in a depth-first walk bounded by `root`.
    ///
    /// Descends to the first child if there is one, otherwise climbs until a
    /// sibling is found. Returns `None` once the walk climbs back to `root`.
    pub fn next_in_walk(&self, id: FiberId, root: FiberId) -> Option<FiberId> {
        if let Some(child) = self.get(id).and_then(|f| f.child) {
            return Some(child);
        }
        let mut node = id;
        loop {
            if node == root {
                return None;
            }
            let fiber = self.get(node)?;
            if let Some(sibling) = fiber.sibling {
                return Some(sibling);
            }
            node = fiber.parent?;
        }
    }

    /// `root` and its descendants in depth-first pre-order.
    pub fn subtree(&self, root: FiberId) -> Vec<FiberId> {
        let mut out = Vec::new();
        let mut next = self.contains(root).then_some(root);
        while let Some(id) = next {
            out.push(id);
            next = self.next_in_walk(id, root);
        }
        out
    }

    /// The host node of the closest ancestor that has one.
    pub fn host_parent(&self, id: FiberId) -> Option<HostHandle> {
        let mut next = self.get(id).and_then(|f| f.parent);
        while let Some(parent) = next {
            let fiber = self.get(parent)?;
            if let Some(host) = fiber.host {
                return Some(host);
            }
            next = fiber.parent;
        }
        None
    }

    /// The first mounted host node that follows `id` in document order under
    /// the same host parent. New nodes are inserted before it.
    ///
    /// Fibers tagged Placement are skipped: they are being inserted in the
    /// same commit and cannot serve as anchors.
    pub fn host_sibling(&self, id: FiberId) -> Option<HostHandle> {
        let mut node = id;
        'siblings: loop {
            // Climb until there is a sibling, stopping at the host parent.
            loop {
                let fiber = self.get(node)?;
                if let Some(sibling) = fiber.sibling {
                    node = sibling;
                    break;
                }
                let parent = self.get(fiber.parent?)?;
                if parent.host.is_some() || parent.kind.has_host_node() {
                    return None;
                }
                node = fiber.parent?;
            }

            // Descend through host-less fibers looking for a mounted node.
            loop {
                let fiber = self.get(node)?;
                if fiber.effect == EffectTag::Placement {
                    continue 'siblings;
                }
                if let Some(host) = fiber.host {
                    return Some(host);
                }
                if fiber.kind.has_host_node() {
                    // A host fiber whose node could not be created.
                    continue 'siblings;
                }
                match fiber.child {
                    Some(child) => node = child,
                    None => continue 'siblings,
                }
            }
        }
    }

    /// Host nodes at the top of `id`'s subtree: `id`'s own node, or else the
    /// nearest host-bearing descendants.
    pub fn top_host_nodes(&self, id: FiberId) -> Vec<HostHandle> {
        let mut out = Vec::new();
        let mut next = self.contains(id).then_some(id);
        while let Some(node) = next {
            let fiber = &self.fibers[&node];
            let descend = match fiber.host {
                Some(host) => {
                    out.push(host);
                    false
                }
                None => fiber.child.is_some(),
            };
            next = if descend {
                fiber.child
            } else {
                self.next_skipping_children(node, id)
            };
        }
        out
    }

    fn next_skipping_children(&self, id: FiberId, root: FiberId) -> Option<FiberId> {
        let mut node = id;
        loop {
            if node == root {
                return None;
            }
            let fiber = self.get(node)?;
            if let Some(sibling) = fiber.sibling {
                return Some(sibling);
            }
            node = fiber.parent?;
        }
    }
}

impl Index<FiberId> for FiberTree {
    type Output = Fiber;

    fn index(&self, id: FiberId) -> &Fiber {
        &self.fibers[&id]
    }
}

impl IndexMut<FiberId> for FiberTree {
    fn index_mut(&mut self, id: FiberId) -> &mut Fiber {
        self.fibers
            .get_mut(&id)
            .unwrap_or_else(|| panic!("fiber {id:?} is not in the arena"))
    }
}
