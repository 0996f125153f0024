//! Element Refs
//!
//! A ref receives the host node of the element it is attached to, or the
//! value published by `use_imperative_handle`. It is cleared with `None` on
//! detach.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::value::PropValue;
use crate::host::HostHandle;

/// What a ref currently points at.
#[derive(Debug, Clone, PartialEq)]
pub enum RefValue {
    Node(HostHandle),
    Handle(PropValue),
}

/// A mutable cell holding a [`RefValue`].
#[derive(Clone, Default)]
pub struct RefObject(Arc<Mutex<Option<RefValue>>>);

impl RefObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<RefValue> {
        self.0.lock().clone()
    }

    /// The attached host node, if any.
    pub fn node(&self) -> Option<HostHandle> {
        match self.current() {
            Some(RefValue::Node(handle)) => Some(handle),
            _ => None,
        }
    }

    /// The published imperative handle, if any.
    pub fn handle(&self) -> Option<PropValue> {
        match self.current() {
            Some(RefValue::Handle(value)) => Some(value),
            _ => None,
        }
    }

    fn set(&self, value: Option<RefValue>) {
        *self.0.lock() = value;
    }
}

/// Ref target attached to an element.
#[derive(Clone)]
pub enum NodeRef {
    Object(RefObject),
    Callback(Arc<dyn Fn(Option<RefValue>) + Send + Sync>),
}

impl NodeRef {
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Option<RefValue>) + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(f))
    }

    /// Attach or clear the ref.
    pub fn set(&self, value: Option<RefValue>) {
        match self {
            Self::Object(object) => object.set(value),
            Self::Callback(callback) => callback(value),
        }
    }
}

impl From<RefObject> for NodeRef {
    fn from(object: RefObject) -> Self {
        Self::Object(object)
    }
}

impl From<&RefObject> for NodeRef {
    fn from(object: &RefObject) -> Self {
        Self::Object(object.clone())
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(&a.0, &b.0),
            (Self::Callback(a), Self::Callback(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(object) => f.debug_tuple("Object").field(&object.current()).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ref_holds_node() {
        let object = RefObject::new();
        let node_ref = NodeRef::from(&object);

        node_ref.set(Some(RefValue::Node(HostHandle::from_raw(4))));
        assert_eq!(object.node(), Some(HostHandle::from_raw(4)));

        node_ref.set(None);
        assert!(object.current().is_none());
    }

    #[test]
    fn callback_ref_receives_values() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let node_ref = NodeRef::callback(move |value| sink.lock().push(value));

        node_ref.set(Some(RefValue::Handle(PropValue::from(1))));
        node_ref.set(None);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].is_none());
    }

    #[test]
    fn identity_equality() {
        let object = RefObject::new();
        assert_eq!(NodeRef::from(&object), NodeRef::from(object.clone()));
        assert_ne!(NodeRef::from(&object), NodeRef::from(RefObject::new()));
    }
}
