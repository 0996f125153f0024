//! In-Memory Host
//!
//! A [`HostRenderer`] that keeps its node tree in memory and journals every
//! mutation. It backs the crate's tests and suits headless embedding.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::{HostError, HostHandle, HostRenderer};
use crate::element::{Event, Listener, PropValue};

/// One recorded host mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    CreateNode { node: HostHandle, kind: String },
    CreateText { node: HostHandle },
    SetText { node: HostHandle },
    SetProperty { node: HostHandle, name: String },
    RemoveProperty { node: HostHandle, name: String },
    SetAttribute { node: HostHandle, name: String },
    RemoveAttribute { node: HostHandle, name: String },
    SetStyle { node: HostHandle, key: String },
    AddListener { node: HostHandle, event: String },
    RemoveListener { node: HostHandle, event: String },
    Insert {
        parent: HostHandle,
        child: HostHandle,
        before: Option<HostHandle>,
    },
    Remove { parent: HostHandle, child: HostHandle },
    Release { node: HostHandle },
}

impl HostOp {
    /// Whether this op changes the shape of the tree.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Insert { .. } | Self::Remove { .. })
    }
}

#[derive(Default)]
struct MemoryNode {
    kind: String,
    text: Option<String>,
    properties: IndexMap<String, PropValue>,
    attributes: IndexMap<String, String>,
    style: IndexMap<String, String>,
    listeners: Vec<(String, Listener)>,
    children: Vec<HostHandle>,
    parent: Option<HostHandle>,
}

#[derive(Default)]
struct MemoryTree {
    nodes: HashMap<HostHandle, MemoryNode>,
    next_id: u64,
    ops: Vec<HostOp>,
}

impl MemoryTree {
    fn allocate(&mut self, node: MemoryNode) -> HostHandle {
        self.next_id += 1;
        let handle = HostHandle::from_raw(self.next_id);
        self.nodes.insert(handle, node);
        handle
    }

    fn detach(&mut self, child: HostHandle) {
        let parent = self.nodes.get_mut(&child).and_then(|node| node.parent.take());
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != child);
        }
    }
}

fn is_valid_kind(kind: &str) -> bool {
    let mut chars = kind.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Shared in-memory host. Clones observe the same tree.
#[derive(Clone, Default)]
pub struct MemoryHost {
    inner: Arc<Mutex<MemoryTree>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached node to mount a root into.
    pub fn create_container(&self) -> HostHandle {
        self.inner.lock().allocate(MemoryNode {
            kind: "#container".to_string(),
            ..MemoryNode::default()
        })
    }

    pub fn kind(&self, node: HostHandle) -> Option<String> {
        self.inner.lock().nodes.get(&node).map(|n| n.kind.clone())
    }

    pub fn children(&self, node: HostHandle) -> Vec<HostHandle> {
        self.inner
            .lock()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn parent(&self, node: HostHandle) -> Option<HostHandle> {
        self.inner.lock().nodes.get(&node).and_then(|n| n.parent)
    }

    /// Whether the node currently has a parent.
    pub fn is_attached(&self, node: HostHandle) -> bool {
        self.parent(node).is_some()
    }

    pub fn text(&self, node: HostHandle) -> Option<String> {
        self.inner.lock().nodes.get(&node).and_then(|n| n.text.clone())
    }

    /// Concatenated text of the subtree, in document order.
    pub fn text_content(&self, node: HostHandle) -> String {
        let tree = self.inner.lock();
        let mut out = String::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let Some(n) = tree.nodes.get(&current) else {
                continue;
            };
            if let Some(text) = &n.text {
                out.push_str(text);
            }
            stack.extend(n.children.iter().rev());
        }
        out
    }

    /// Kinds of the node's children, with `#text` for text nodes.
    pub fn child_kinds(&self, node: HostHandle) -> Vec<String> {
        self.children(node)
            .into_iter()
            .filter_map(|child| self.kind(child))
            .collect()
    }

    pub fn property(&self, node: HostHandle, name: &str) -> Option<PropValue> {
        self.inner
            .lock()
            .nodes
            .get(&node)
            .and_then(|n| n.properties.get(name).cloned())
    }

    pub fn attribute(&self, node: HostHandle, name: &str) -> Option<String> {
        self.inner
            .lock()
            .nodes
            .get(&node)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    pub fn style(&self, node: HostHandle, key: &str) -> Option<String> {
        self.inner
            .lock()
            .nodes
            .get(&node)
            .and_then(|n| n.style.get(key).cloned())
    }

    pub fn listener_count(&self, node: HostHandle, event: &str) -> usize {
        self.inner
            .lock()
            .nodes
            .get(&node)
            .map(|n| n.listeners.iter().filter(|(e, _)| e == event).count())
            .unwrap_or(0)
    }

    /// Invoke the node's listeners for `event`. Returns how many ran.
    pub fn dispatch_event(&self, node: HostHandle, event: &Event) -> usize {
        let listeners: Vec<Listener> = {
            let tree = self.inner.lock();
            tree.nodes
                .get(&node)
                .map(|n| {
                    n.listeners
                        .iter()
                        .filter(|(name, _)| *name == event.name)
                        .map(|(_, l)| l.clone())
                        .collect()
                })
                .unwrap_or_default()
        };
        // Listeners may call back into the host.
        for listener in &listeners {
            listener.call(event);
        }
        listeners.len()
    }

    /// Journal of mutations since the last [`clear_ops`](Self::clear_ops).
    pub fn ops(&self) -> Vec<HostOp> {
        self.inner.lock().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.inner.lock().ops.clear();
    }

    pub fn node_count(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    fn with_node(&self, node: HostHandle, op: HostOp, f: impl FnOnce(&mut MemoryNode)) {
        let mut guard = self.inner.lock();
        let tree = &mut *guard;
        match tree.nodes.get_mut(&node) {
            Some(n) => {
                f(n);
                tree.ops.push(op);
            }
            None => tracing::debug!(?node, "ignoring mutation of unknown host node"),
        }
    }
}

impl HostRenderer for MemoryHost {
    fn create_node(&self, kind: &str) -> Result<HostHandle, HostError> {
        if !is_valid_kind(kind) {
            return Err(HostError::UnknownKind(kind.to_string()));
        }
        let mut tree = self.inner.lock();
        let node = tree.allocate(MemoryNode {
            kind: kind.to_string(),
            ..MemoryNode::default()
        });
        tree.ops.push(HostOp::CreateNode {
            node,
            kind: kind.to_string(),
        });
        Ok(node)
    }

    fn create_text(&self, text: &str) -> HostHandle {
        let mut tree = self.inner.lock();
        let node = tree.allocate(MemoryNode {
            kind: "#text".to_string(),
            text: Some(text.to_string()),
            ..MemoryNode::default()
        });
        tree.ops.push(HostOp::CreateText { node });
        node
    }

    fn set_text(&self, node: HostHandle, text: &str) {
        self.with_node(node, HostOp::SetText { node }, |n| {
            n.text = Some(text.to_string());
        });
    }

    fn set_property(&self, node: HostHandle, name: &str, value: &PropValue) {
        let op = HostOp::SetProperty {
            node,
            name: name.to_string(),
        };
        self.with_node(node, op, |n| {
            n.properties.insert(name.to_string(), value.clone());
        });
    }

    fn remove_property(&self, node: HostHandle, name: &str) {
        let op = HostOp::RemoveProperty {
            node,
            name: name.to_string(),
        };
        self.with_node(node, op, |n| {
            n.properties.shift_remove(name);
        });
    }

    fn set_attribute(&self, node: HostHandle, name: &str, value: &str) {
        let op = HostOp::SetAttribute {
            node,
            name: name.to_string(),
        };
        self.with_node(node, op, |n| {
            n.attributes.insert(name.to_string(), value.to_string());
        });
    }

    fn remove_attribute(&self, node: HostHandle, name: &str) {
        let op = HostOp::RemoveAttribute {
            node,
            name: name.to_string(),
        };
        self.with_node(node, op, |n| {
            n.attributes.shift_remove(name);
        });
    }

    fn set_style(&self, node: HostHandle, key: &str, value: Option<&str>) {
        let op = HostOp::SetStyle {
            node,
            key: key.to_string(),
        };
        self.with_node(node, op, |n| match value {
            Some(value) => {
                n.style.insert(key.to_string(), value.to_string());
            }
            None => {
                n.style.shift_remove(key);
            }
        });
    }

    fn add_listener(&self, node: HostHandle, event: &str, listener: &Listener) {
        let op = HostOp::AddListener {
            node,
            event: event.to_string(),
        };
        self.with_node(node, op, |n| {
            n.listeners.push((event.to_string(), listener.clone()));
        });
    }

    fn remove_listener(&self, node: HostHandle, event: &str, listener: &Listener) {
        let op = HostOp::RemoveListener {
            node,
            event: event.to_string(),
        };
        self.with_node(node, op, |n| {
            n.listeners.retain(|(e, l)| !(e == event && l == listener));
        });
    }

    fn insert_child(
        &self,
        parent: HostHandle,
        child: HostHandle,
        before: Option<HostHandle>,
    ) -> Result<(), HostError> {
        let mut tree = self.inner.lock();
        if !tree.nodes.contains_key(&child) {
            return Err(HostError::UnknownNode(child));
        }
        let Some(parent_node) = tree.nodes.get(&parent) else {
            return Err(HostError::UnknownNode(parent));
        };
        if let Some(anchor) = before {
            if !parent_node.children.contains(&anchor) {
                return Err(HostError::NotAChild {
                    parent,
                    child: anchor,
                });
            }
        }

        tree.detach(child);
        if let Some(parent_node) = tree.nodes.get_mut(&parent) {
            let at = before
                .and_then(|anchor| parent_node.children.iter().position(|c| *c == anchor))
                .unwrap_or(parent_node.children.len());
            parent_node.children.insert(at, child);
        }
        if let Some(child_node) = tree.nodes.get_mut(&child) {
            child_node.parent = Some(parent);
        }
        tree.ops.push(HostOp::Insert {
            parent,
            child,
            before,
        });
        Ok(())
    }

    fn remove_child(&self, parent: HostHandle, child: HostHandle) -> Result<(), HostError> {
        let mut tree = self.inner.lock();
        let is_child = tree
            .nodes
            .get(&child)
            .is_some_and(|n| n.parent == Some(parent));
        if !is_child {
            return Err(HostError::NotAChild { parent, child });
        }
        tree.detach(child);
        tree.ops.push(HostOp::Remove { parent, child });
        Ok(())
    }

    fn release(&self, node: HostHandle) {
        let mut tree = self.inner.lock();
        let detached = tree.nodes.get(&node).is_some_and(|n| n.parent.is_none() && n.children.is_empty());
        if !detached {
            tracing::debug!(?node, "not releasing attached or unknown host node");
            return;
        }
        tree.nodes.remove(&node);
        tree.ops.push(HostOp::Release { node });
    }
}
