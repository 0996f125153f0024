//! Context Cells
//!
//! A context is a shared cell. Provider fibers write their `value` prop into it
//! while the build walk passes through them; descendants read it with
//! `use_context`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::value::PropValue;

/// Counter for generating unique context IDs.
static CONTEXT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Clone)]
pub struct Context {
    id: u64,
    name: Arc<str>,
    default: PropValue,
    current: Arc<Mutex<PropValue>>,
}

impl Context {
    pub fn new(name: impl Into<Arc<str>>, default: impl Into<PropValue>) -> Self {
        let default = default.into();
        Self {
            id: CONTEXT_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            current: Arc::new(Mutex::new(default.clone())),
            default,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value most recently provided, or the default.
    pub fn current(&self) -> PropValue {
        self.current.lock().clone()
    }

    pub(crate) fn provide(&self, value: PropValue) {
        *self.current.lock() = value;
    }

    /// Restore the default value.
    pub fn reset(&self) {
        self.provide(self.default.clone());
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}
