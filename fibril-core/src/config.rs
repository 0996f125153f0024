//! Renderer Configuration
//!
//! Tunables for a mounted root. Every field has a default, so an empty JSON
//! object is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default time budget for one contiguous run of the build walk.
pub const DEFAULT_TIME_BUDGET_MS: u64 = 5;

/// Configuration shared by every root created from a [`crate::Renderer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Milliseconds the build walk may run before yielding to the scheduler.
    pub time_budget_ms: u64,

    /// Prefix used by `use_id`, producing ids like `:r0:`.
    pub id_prefix: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            time_budget_ms: DEFAULT_TIME_BUDGET_MS,
            id_prefix: "r".to_string(),
        }
    }
}

impl RendererConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Override the yield budget.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget_ms = budget.as_millis() as u64;
        self
    }

    /// Override the `use_id` prefix.
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    /// The yield budget as a [`Duration`].
    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_budget_ms)
    }
}
