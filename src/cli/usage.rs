//! Token accounting, run metrics and todo items.

use serde::{Deserialize, Serialize};

use crate::cli::ResultMessage;

/// Token usage reported on a `result` event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl Usage {
    /// Input plus output tokens. Cache tokens are not counted.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Snapshot of a run's cost and token accounting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub cost_usd: f64,
    pub total_cost_usd: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub num_turns: u32,
    pub duration_ms: u64,
    pub duration_api_ms: u64,
    pub model: String,
    pub session_id: String,
    pub is_error: bool,
    pub result_subtype: String,
}

impl SessionMetrics {
    /// Build metrics from a result event.
    #[must_use]
    pub fn from_result(result: &ResultMessage) -> Self {
        let usage = result.usage.unwrap_or_default();
        Self {
            cost_usd: result.cost_usd,
            total_cost_usd: result.total_cost_usd,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cache_creation_input_tokens: usage.cache_creation_input_tokens,
            cache_read_input_tokens: usage.cache_read_input_tokens,
            num_turns: result.num_turns,
            duration_ms: result.duration_ms,
            duration_api_ms: result.duration_api_ms,
            model: result.model.clone(),
            session_id: result.session_id.clone(),
            is_error: result.is_error,
            result_subtype: result.subtype.clone(),
        }
    }

    /// Input plus output tokens.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    /// Fill model and session id from earlier events when the result omitted them.
    pub(crate) fn fill_missing(&mut self, model: &str, session_id: &str) {
        if self.model.is_empty() {
            self.model = model.to_string();
        }
        if self.session_id.is_empty() {
            self.session_id = session_id.to_string();
        }
    }
}

/// One entry written by the `TodoWrite` tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub content: String,
    /// `pending`, `in_progress` or `completed`.
    pub status: String,
    #[serde(rename = "activeForm", default, skip_serializing_if = "String::is_empty")]
    pub active_form: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub priority: String,
}
