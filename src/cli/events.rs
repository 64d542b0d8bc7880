//! Event types from Claude Code stream-json output.
//!
//! Each stdout line of `claude --print --output-format stream-json --verbose`
//! is one [`StreamMessage`]. The `type` field selects the variant; unknown
//! types parse as [`StreamMessage::Unknown`] and unknown fields are ignored.

use serde::{Deserialize, Serialize};

use crate::cli::{ContentBlock, MessageContent, Usage};

/// MCP server status reported on the init event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
}

/// `system` event. The first event of a run has subtype `init`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMessage {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subtype: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cwd: String,
    /// Enabled tool names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    #[serde(
        rename = "permissionMode",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub permission_mode: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<McpServerStatus>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

/// `assistant` or `user` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    /// Set when the event belongs to a sub-agent spawned by a tool call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tool_use_id: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

/// Terminal `result` event with the run's accounting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    /// `success`, `error_max_turns`, `error_during_execution`, ...
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subtype: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    /// Final text output.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub result: String,
    /// Cost of this invocation.
    #[serde(default)]
    pub cost_usd: f64,
    /// Cumulative cost of the session.
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub duration_api_ms: u64,
    #[serde(default)]
    pub num_turns: u32,
    /// Application-level failure flag; independent of the process exit code.
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Output validated against `--json-schema`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

impl ResultMessage {
    /// Input plus output tokens; zero when usage is absent.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.usage.map_or(0, |usage| usage.total_tokens())
    }
}

/// `error` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Free-form error payload.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub error: serde_json::Value,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

/// One parsed line of stream-json output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    System(SystemMessage),
    Assistant(ChatMessage),
    User(ChatMessage),
    Result(ResultMessage),
    Error(ErrorMessage),
    /// Catch-all for event types added after this crate.
    #[serde(other)]
    Unknown,
}

impl StreamMessage {
    /// Wire value of the `type` field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::System(_) => "system",
            Self::Assistant(_) => "assistant",
            Self::User(_) => "user",
            Self::Result(_) => "result",
            Self::Error(_) => "error",
            Self::Unknown => "unknown",
        }
    }

    /// Subtype of system and result events.
    #[must_use]
    pub fn subtype(&self) -> &str {
        match self {
            Self::System(system) => &system.subtype,
            Self::Result(result) => &result.subtype,
            _ => "",
        }
    }

    /// Session identifier, empty when absent.
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::System(system) => &system.session_id,
            Self::Assistant(chat) | Self::User(chat) => &chat.session_id,
            Self::Result(result) => &result.session_id,
            Self::Error(error) => &error.session_id,
            Self::Unknown => "",
        }
    }

    /// Model name from the event or its message body.
    #[must_use]
    pub fn model(&self) -> &str {
        match self {
            Self::System(system) => &system.model,
            Self::Assistant(chat) | Self::User(chat) => {
                chat.message.as_ref().map_or("", |body| body.model.as_str())
            }
            Self::Result(result) => &result.model,
            Self::Error(_) | Self::Unknown => "",
        }
    }

    #[must_use]
    pub fn uuid(&self) -> &str {
        match self {
            Self::System(system) => &system.uuid,
            Self::Assistant(chat) | Self::User(chat) => &chat.uuid,
            Self::Result(result) => &result.uuid,
            Self::Error(error) => &error.uuid,
            Self::Unknown => "",
        }
    }

    /// Top-level `text` field some events carry.
    #[must_use]
    pub fn direct_text(&self) -> &str {
        match self {
            Self::System(system) => &system.text,
            Self::Assistant(chat) | Self::User(chat) => &chat.text,
            Self::Result(result) => &result.text,
            Self::Error(error) => &error.text,
            Self::Unknown => "",
        }
    }

    /// Content blocks of assistant and user events.
    #[must_use]
    pub fn content(&self) -> &[ContentBlock] {
        match self {
            Self::Assistant(chat) | Self::User(chat) => chat
                .message
                .as_ref()
                .map_or(&[][..], |body| body.content.as_slice()),
            _ => &[],
        }
    }

    #[must_use]
    pub fn as_result(&self) -> Option<&ResultMessage> {
        match self {
            Self::Result(result) => Some(result),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_system(&self) -> Option<&SystemMessage> {
        match self {
            Self::System(system) => Some(system),
            _ => None,
        }
    }

    /// Returns true for the terminal result event.
    #[must_use]
    pub fn is_result(&self) -> bool {
        matches!(self, Self::Result(_))
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    #[must_use]
    pub fn is_assistant(&self) -> bool {
        matches!(self, Self::Assistant(_))
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System(_))
    }

    /// Returns true for the `system`/`init` event that opens a run.
    #[must_use]
    pub fn is_init(&self) -> bool {
        matches!(self, Self::System(system) if system.subtype == "init")
    }

    /// Returns true for user events, which carry tool results.
    #[must_use]
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User(_))
    }
}
