//! Configuration for the [`Orchestrator`](super::orchestrator::Orchestrator).
//!
//! ```ignore
//! let config = OrchestratorConfig::new("You are a helpful home assistant.")
//!     .with_history_window(10)
//!     .with_execution_order(ExecutionOrder::Concurrent);
//! ```

use crate::context::DEFAULT_HISTORY_WINDOW;
use crate::tools::{DEFAULT_MAX_RESULT_BYTES, DEFAULT_TOOL_DATA_CAPACITY};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default utterance when inference fails.
pub const DEFAULT_ERROR_UTTERANCE: &str =
    "Sorry, I ran into a problem answering that. Please try again.";

/// How multiple tool calls detected in one turn are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionOrder {
    /// One at a time, in the order the backend returned them.
    #[default]
    Sequential,
    /// All at once. Results are still reported in backend order.
    Concurrent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub system_prompt: String,
    /// Number of recent user/assistant exchanges sent to the model.
    pub history_window: usize,
    /// Capacity of each session's tool data cache.
    pub tool_data_capacity: usize,
    pub execution_order: ExecutionOrder,
    /// What the user hears when inference fails.
    pub error_utterance: String,
    /// Tool-result messages longer than this are truncated.
    pub max_result_bytes: usize,
    /// Validate local tool arguments against their JSON Schema.
    pub validate_local_args: bool,
    /// Timeout for local tool calls, in seconds.
    pub local_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful voice assistant. Use the available tools \
                            when they help answer the user. Keep answers short."
                .into(),
            history_window: DEFAULT_HISTORY_WINDOW,
            tool_data_capacity: DEFAULT_TOOL_DATA_CAPACITY,
            execution_order: ExecutionOrder::default(),
            error_utterance: DEFAULT_ERROR_UTTERANCE.into(),
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            validate_local_args: false,
            local_timeout_secs: 30,
        }
    }
}

impl OrchestratorConfig {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_history_window(mut self, exchanges: usize) -> Self {
        self.history_window = exchanges;
        self
    }

    pub fn with_tool_data_capacity(mut self, capacity: usize) -> Self {
        self.tool_data_capacity = capacity;
        self
    }

    pub fn with_execution_order(mut self, order: ExecutionOrder) -> Self {
        self.execution_order = order;
        self
    }

    pub fn with_error_utterance(mut self, utterance: impl Into<String>) -> Self {
        self.error_utterance = utterance.into();
        self
    }

    pub fn with_max_result_bytes(mut self, max: usize) -> Self {
        self.max_result_bytes = max;
        self
    }

    pub fn local_timeout(&self) -> Duration {
        Duration::from_secs(self.local_timeout_secs)
    }
}
