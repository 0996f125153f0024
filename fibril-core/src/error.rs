//! Error Types
//!
//! Errors raised while building a generation. Host-side failures have their
//! own type in [`crate::host::HostError`] because the commit phase guards them
//! instead of propagating.

use thiserror::Error;

use crate::hooks::HookKind;

/// Boxed error produced by application code inside a component function.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the rendering engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A hook at `index` was a different kind than in the previous generation.
    #[error(
        "hook #{index} in `{component}` changed from {previous} to {current} between renders"
    )]
    HookOrderChanged {
        component: String,
        index: usize,
        previous: HookKind,
        current: HookKind,
    },

    /// A component called a different number of hooks than last time.
    #[error("`{component}` called {current} hooks but its previous render called {previous}")]
    HookCountChanged {
        component: String,
        previous: usize,
        current: usize,
    },

    /// The persisted value behind a hook slot has a different type than requested.
    #[error("hook #{index} in `{component}` was read with a different value type")]
    HookTypeMismatch { component: String, index: usize },

    /// A component function failed.
    #[error("component `{component}` failed to render: {source}")]
    Render {
        component: String,
        #[source]
        source: BoxError,
    },

    /// Application code signalled a failure without naming a component.
    #[error("{0}")]
    Message(String),

    /// Configuration could not be parsed.
    #[error("invalid renderer configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Convenience for component code: `return Err(Error::msg("no data"))`.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wrap an arbitrary error raised while rendering `component`.
    pub fn render(component: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Render {
            component: component.into(),
            source: source.into(),
        }
    }

    /// Whether this error is a hooks usage violation.
    pub fn is_usage_violation(&self) -> bool {
        matches!(
            self,
            Self::HookOrderChanged { .. }
                | Self::HookCountChanged { .. }
                | Self::HookTypeMismatch { .. }
        )
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
