//! Host Renderer Boundary
//!
//! The engine never touches a concrete visible tree. It drives a
//! [`HostRenderer`] that creates, mutates and removes host nodes. The host
//! identifies its nodes with opaque [`HostHandle`]s.
//!
//! Conventions applied before calling the host:
//!
//! - props starting with `on` are listeners; the lower-cased suffix is the
//!   event name (`onClick` → `click`)
//! - `style` is a nested map diffed key by key
//! - `data-*` and `aria-*` props go through attribute assignment

pub mod memory;
mod props;

use thiserror::Error;

use crate::element::{Listener, PropValue};

pub(crate) use props::{apply_props, is_listener_prop};
pub use props::{format_style_value, is_unitless};

/// Opaque handle to a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostHandle(u64);

impl HostHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Failures reported by a host renderer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("unknown host node kind `{0}`")]
    UnknownKind(String),

    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild {
        parent: HostHandle,
        child: HostHandle,
    },

    #[error("unknown host node {0:?}")]
    UnknownNode(HostHandle),
}

/// The host-mutation primitives the commit phase relies on.
pub trait HostRenderer: Send + Sync {
    /// Create an element node of the given kind.
    fn create_node(&self, kind: &str) -> Result<HostHandle, HostError>;

    /// Create a text node.
    fn create_text(&self, text: &str) -> HostHandle;

    fn set_text(&self, node: HostHandle, text: &str);

    fn set_property(&self, node: HostHandle, name: &str, value: &PropValue);

    fn remove_property(&self, node: HostHandle, name: &str);

    fn set_attribute(&self, node: HostHandle, name: &str, value: &str);

    fn remove_attribute(&self, node: HostHandle, name: &str);

    /// Set one style entry, or clear it with `None`.
    fn set_style(&self, node: HostHandle, key: &str, value: Option<&str>);

    fn add_listener(&self, node: HostHandle, event: &str, listener: &Listener);

    fn remove_listener(&self, node: HostHandle, event: &str, listener: &Listener);

    /// Insert `child` under `parent`, before `before` or at the end.
    fn insert_child(
        &self,
        parent: HostHandle,
        child: HostHandle,
        before: Option<HostHandle>,
    ) -> Result<(), HostError>;

    fn remove_child(&self, parent: HostHandle, child: HostHandle) -> Result<(), HostError>;

    /// Free a node that was created but never attached, e.g. by a build that
    /// failed. Hosts that reclaim nodes on their own can ignore this.
    fn release(&self, _node: HostHandle) {}
}
