//! Fibers
//!
//! This module defines the unit of work that lives in the fiber arena.

use std::sync::Arc;

use crate::element::{Child, Component, Context, ElementKind, NodeRef, Props};
use crate::hooks::HookRecord;
use crate::host::HostHandle;

/// Handle of a fiber in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiberId(u64);

impl FiberId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Identity of a tree slot across generations.
///
/// Every generation allocates fresh fibers, but a fiber matched against its
/// predecessor inherits the predecessor's slot. State setters address
/// component instances by slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u64);

impl SlotId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// What a fiber renders. Fragments never reach this level.
#[derive(Debug, Clone, PartialEq)]
pub enum FiberKind {
    /// The container a root is mounted into.
    Root,
    Host(Arc<str>),
    Text,
    Component(Component),
    Provider(Context),
}

impl FiberKind {
    /// Convert an element kind. Returns `None` for fragments.
    pub fn from_element(kind: &ElementKind) -> Option<Self> {
        match kind {
            ElementKind::Host(tag) => Some(Self::Host(tag.clone())),
            ElementKind::Component(component) => Some(Self::Component(component.clone())),
            ElementKind::Provider(context) => Some(Self::Provider(context.clone())),
            ElementKind::Fragment => None,
        }
    }

    /// Whether a new child can reuse a fiber of this kind.
    pub fn matches(&self, child: &Child) -> bool {
        match (self, child) {
            (Self::Text, Child::Text(_)) => true,
            (Self::Text, Child::Element(_)) | (_, Child::Text(_)) => false,
            (Self::Root, Child::Element(_)) => false,
            (Self::Host(tag), Child::Element(element)) => {
                matches!(element.kind(), ElementKind::Host(other) if other == tag)
            }
            (Self::Component(component), Child::Element(element)) => {
                matches!(element.kind(), ElementKind::Component(other) if other == component)
            }
            (Self::Provider(context), Child::Element(element)) => {
                matches!(element.kind(), ElementKind::Provider(other) if other == context)
            }
        }
    }

    /// Whether fibers of this kind own a host node.
    pub fn has_host_node(&self) -> bool {
        matches!(self, Self::Root | Self::Host(_) | Self::Text)
    }

    /// Short label used in logs.
    pub fn label(&self) -> &str {
        match self {
            Self::Root => "#root",
            Self::Host(tag) => tag,
            Self::Text => "#text",
            Self::Component(component) => component.name(),
            Self::Provider(context) => context.name(),
        }
    }
}

/// Commit-phase classification of a fiber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectTag {
    #[default]
    None,
    Placement,
    Update,
    Deletion,
}

/// A mutable unit of work for one tree slot in one generation.
#[derive(Debug, Clone)]
pub struct Fiber {
    pub(crate) kind: FiberKind,
    pub(crate) key: Option<Arc<str>>,
    pub(crate) props: Props,
    pub(crate) host: Option<HostHandle>,
    pub(crate) parent: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,
    pub(crate) alternate: Option<FiberId>,
    pub(crate) effect: EffectTag,
    pub(crate) hooks: Vec<HookRecord>,
    pub(crate) node_ref: Option<NodeRef>,
    pub(crate) slot: SlotId,
}

impl Fiber {
    /// An unlinked fiber.
    pub fn new(kind: FiberKind, props: Props, host: Option<HostHandle>, slot: SlotId) -> Self {
        Self {
            kind,
            key: None,
            props,
            host,
            parent: None,
            child: None,
            sibling: None,
            alternate: None,
            effect: EffectTag::None,
            hooks: Vec::new(),
            node_ref: None,
            slot,
        }
    }

    /// A fresh fiber for a child that matched nothing in the previous generation.
    ///
    /// Returns `None` for fragments, which are spliced rather than allocated.
    pub fn placement(child: &Child, slot: SlotId) -> Option<Self> {
        let mut fiber = match child {
            Child::Text(text) => Self::new(FiberKind::Text, Props::text(text), None, slot),
            Child::Element(element) => {
                let kind = FiberKind::from_element(element.kind())?;
                let mut fiber = Self::new(kind, element.props().clone(), None, slot);
                fiber.key = element.key_arc();
                fiber.node_ref = element.node_ref().cloned();
                fiber
            }
        };
        fiber.effect = EffectTag::Placement;
        Some(fiber)
    }

    /// The next generation of `old`, carrying its host node, hooks and slot
    /// with the props of `child`.
    pub fn reuse(old: &Fiber, child: &Child) -> Self {
        let (props, node_ref) = match child {
            Child::Text(text) => (Props::text(text), None),
            Child::Element(element) => (element.props().clone(), element.node_ref().cloned()),
        };
        Self {
            kind: old.kind.clone(),
            key: old.key.clone(),
            props,
            host: old.host,
            parent: None,
            child: None,
            sibling: None,
            alternate: None,
            effect: EffectTag::Update,
            hooks: old.hooks.clone(),
            node_ref,
            slot: old.slot,
        }
    }

    /// A work-in-progress copy of a committed fiber for a state-driven rebuild.
    pub fn rebuild_of(current: &Fiber) -> Self {
        Self {
            kind: current.kind.clone(),
            key: current.key.clone(),
            props: current.props.clone(),
            host: current.host,
            parent: current.parent,
            child: None,
            sibling: current.sibling,
            alternate: None,
            effect: EffectTag::Update,
            hooks: current.hooks.clone(),
            node_ref: current.node_ref.clone(),
            slot: current.slot,
        }
    }

    pub fn kind(&self) -> &FiberKind {
        &self.kind
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn host(&self) -> Option<HostHandle> {
        self.host
    }

    pub fn parent(&self) -> Option<FiberId> {
        self.parent
    }

    pub fn child(&self) -> Option<FiberId> {
        self.child
    }

    pub fn sibling(&self) -> Option<FiberId> {
        self.sibling
    }

    pub fn alternate(&self) -> Option<FiberId> {
        self.alternate
    }

    pub fn effect(&self) -> EffectTag {
        self.effect
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Whether `child` may reuse this fiber: same kind and same key.
    pub fn matches(&self, child: &Child) -> bool {
        self.kind.matches(child) && self.key.as_deref() == child.key()
    }

    /// Text content of a text fiber.
    pub fn text(&self) -> Option<&str> {
        match self.kind {
            FiberKind::Text => self.props.get_str(crate::element::TEXT_PROP),
            _ => None,
        }
    }
}
