//! Reconciler
//!
//! Turns element trees into host mutations.
//!
//! # Phases
//!
//! A generation goes through two phases:
//!
//! 1. **Build**: a depth-first walk over the work-in-progress tree. Each unit
//!    of work renders one fiber (calling the component function for component
//!    fibers) and diffs its children against the previous generation. The walk
//!    can be suspended between any two fibers.
//! 2. **Commit**: deletions, then placements and updates, then layout effects.
//!    Runs to completion in the same scheduler turn as the end of the build.
//!    Passive effects follow on a later turn.
//!
//! An error raised during the build abandons it. Nothing is committed and the
//! previous generation stays on screen.
//!
//! # Example
//!
//! ```rust,ignore
//! let host = MemoryHost::new();
//! let scheduler = Scheduler::new();
//! let renderer = Renderer::new(host.clone(), scheduler.clone());
//!
//! let container = host.create_container();
//! renderer.render(Element::host("p").child("hello"), container);
//! scheduler.run_until_idle();
//! ```

mod commit;
mod diff;
mod root;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

pub use commit::CommitSummary;
pub use root::Root;

use crate::config::RendererConfig;
use crate::element::Child;
use crate::host::{HostHandle, HostRenderer};
use crate::scheduler::{Scheduler, SystemClock, TimeSource};

/// Entry point for embedding applications.
///
/// Keeps one [`Root`] per container. All roots share the renderer's host and
/// scheduler.
pub struct Renderer {
    host: Arc<dyn HostRenderer>,
    scheduler: Scheduler,
    config: RendererConfig,
    time: Arc<dyn TimeSource>,
    roots: Mutex<HashMap<HostHandle, Root>>,
}

impl Renderer {
    /// Create a renderer with the default configuration and the system clock.
    pub fn new<H>(host: H, scheduler: Scheduler) -> Self
    where
        H: HostRenderer + 'static,
    {
        Self {
            host: Arc::new(host),
            scheduler,
            config: RendererConfig::default(),
            time: Arc::new(SystemClock::new()),
            roots: Mutex::new(HashMap::new()),
        }
    }

    /// Use `config` for roots created from now on.
    pub fn with_config(mut self, config: RendererConfig) -> Self {
        self.config = config;
        self
    }

    /// Measure the yield budget with `source` for roots created from now on.
    pub fn with_time_source<T>(mut self, source: T) -> Self
    where
        T: TimeSource + 'static,
    {
        self.time = Arc::new(source);
        self
    }

    /// Render `element` into `container`.
    ///
    /// The first call for a container creates its root. Later calls reuse it
    /// and diff against what is mounted. The work runs on the scheduler.
    pub fn render(&self, element: impl Into<Child>, container: HostHandle) -> Root {
        let root = self
            .roots
            .lock()
            .entry(container)
            .or_insert_with(|| {
                tracing::debug!(container = container.raw(), "creating root");
                Root::new(
                    self.host.clone(),
                    self.scheduler.clone(),
                    container,
                    &self.config,
                    self.time.clone(),
                )
            })
            .clone();
        root.render(element);
        root
    }

    /// The root mounted into `container`, if any.
    pub fn root(&self, container: HostHandle) -> Option<Root> {
        self.roots.lock().get(&container).cloned()
    }

    /// Tear down the tree in `container` and forget its root.
    ///
    /// Returns `false` if nothing was rendered there.
    pub fn unmount(&self, container: HostHandle) -> bool {
        let root = self.roots.lock().remove(&container);
        match root {
            Some(root) => {
                root.unmount();
                true
            }
            None => false,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .field("roots", &self.roots.lock().len())
            .finish()
    }
}
