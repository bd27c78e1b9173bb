// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Tunables of the execution engine.
///
/// Every field has a default, so partial RON documents are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How many times one thread may enter the same node input within a
    /// single frame before it is aborted as a runaway loop
    pub max_reentry_per_frame: u32,
    /// Nesting limit for value-change notifications raised from within
    /// value-change handlers
    pub max_notify_depth: u32,
    /// Honor per-node logging flags
    pub node_logging: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_reentry_per_frame: 64,
            max_notify_depth: 32,
            node_logging: true,
        }
    }
}
