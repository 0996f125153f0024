//! Fibril Core
//!
//! This crate provides an incremental UI rendering engine built on fibers.
//! It implements:
//!
//! - A cooperative FIFO scheduler with cancellable work items
//! - Time-sliced builds that yield when their budget is spent
//! - A double-buffered fiber tree with a positional child diff
//! - A three-pass commit against a pluggable host renderer
//! - Hooks: state, reducers, effects, memos, refs, ids and context
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `element`: immutable descriptions of the desired UI
//! - `fiber`: the fiber arena and its walks
//! - `hooks`: the per-render hook context and hook state
//! - `reconciler`: roots, the work loop, the diff and the commit
//! - `scheduler`: the work queue and the yield clock
//! - `host`: the host renderer interface and an in-memory host
//!
//! # Example
//!
//! ```rust,ignore
//! use fibril_core::{deps, Component, Element, MemoryHost, Props, Renderer, Scheduler};
//!
//! let counter = Component::new("Counter", |hooks, _props| {
//!     let (count, set_count) = hooks.use_state(0)?;
//!     hooks.use_effect(move || { println!("count is {count}"); None }, Some(deps![count]))?;
//!     Ok(vec![Element::host("button")
//!         .on("click", move |_| set_count.update(|n| n + 1))
//!         .child(count)
//!         .into()])
//! });
//!
//! let host = MemoryHost::new();
//! let scheduler = Scheduler::new();
//! let renderer = Renderer::new(host.clone(), scheduler.clone());
//! renderer.render(Element::component(&counter, Props::new()), host.create_container());
//! scheduler.run_until_idle();
//! ```

pub mod hooks;
pub mod config;
pub mod element;
pub mod error;
pub mod fiber;
pub mod host;
pub mod reconciler;
pub mod scheduler;

pub use config::RendererConfig;
pub use element::{
    Child, Children, Component, Context, Element, ElementKind, Event, Listener, NodeRef, PropValue,
    Props, RefObject, RefValue, Style,
};
pub use error::{Error, Result};
pub use hooks::{Cleanup, Deps, Dispatch, HookKind, Hooks, MutableRef, SetState, StateAction};
pub use host::memory::MemoryHost;
pub use host::{HostError, HostHandle, HostRenderer};
pub use reconciler::{CommitSummary, Renderer, Root};
pub use scheduler::{ManualClock, Scheduler, SystemClock, TimeSource, WorkId};
