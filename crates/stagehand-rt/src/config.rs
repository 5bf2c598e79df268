// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Runtime configuration.
//!
//! Every field has a default, so an empty document is a valid config.
//! Parsing the file itself is the host's business.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Trace ring-buffer size; 0 disables tracing.
    pub trace_capacity: usize,
    /// Pause between host-loop frames.
    pub frame_sleep_ms: u64,
    /// Stop after this many frames. `None` runs until a stop is requested.
    pub max_frames: Option<u64>,
    /// User stages to register up front, ticked after `render` every frame.
    pub extra_stages: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            trace_capacity: 4096,
            frame_sleep_ms: 16,
            max_frames: None,
            extra_stages: Vec::new(),
        }
    }
}
