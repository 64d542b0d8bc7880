//! Message bodies and content blocks carried by assistant and user events.

use serde::{Deserialize, Deserializer, Serialize};

/// Body of an `assistant` or `user` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageContent {
    /// API message identifier.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Usually `assistant` or `user`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    /// Model that produced the message, when reported.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    /// Ordered content blocks.
    #[serde(
        default,
        deserialize_with = "deserialize_blocks",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub content: Vec<ContentBlock>,
}

impl MessageContent {
    /// Iterate over the tool invocations in source order.
    pub fn tool_uses(&self) -> impl Iterator<Item = &ContentBlock> {
        self.content.iter().filter(|block| block.is_tool_use())
    }
}

/// One element of a message's content list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        #[serde(default)]
        text: String,
    },
    /// Extended thinking output.
    Thinking {
        #[serde(default)]
        thinking: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        signature: String,
    },
    /// A request to run a tool.
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    /// The outcome of a tool run, sent back as a user event.
    ToolResult {
        #[serde(default)]
        tool_use_id: String,
        /// Either a string or a list of nested blocks.
        #[serde(default)]
        content: serde_json::Value,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    /// Block types this crate does not model (images, redacted thinking, ...).
    #[serde(other)]
    Unknown,
}

impl ContentBlock {
    /// Create a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Returns true for text blocks.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }

    /// Returns true for thinking blocks.
    #[must_use]
    pub fn is_thinking(&self) -> bool {
        matches!(self, Self::Thinking { .. })
    }

    /// Returns true for tool invocations that name a tool.
    #[must_use]
    pub fn is_tool_use(&self) -> bool {
        matches!(self, Self::ToolUse { name, .. } if !name.is_empty())
    }

    /// Returns true for tool results.
    #[must_use]
    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::ToolResult { .. })
    }

    /// Text of a text block.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Reasoning of a thinking block.
    #[must_use]
    pub fn as_thinking(&self) -> Option<&str> {
        match self {
            Self::Thinking { thinking, .. } => Some(thinking),
            _ => None,
        }
    }

    /// Tool name of a tool invocation.
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::ToolUse { name, .. } if !name.is_empty() => Some(name),
            _ => None,
        }
    }
}

/// User prompts arrive with `content` as a bare string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

fn deserialize_blocks<'de, D>(deserializer: D) -> Result<Vec<ContentBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawContent>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(RawContent::Text(text)) => vec![ContentBlock::text(text)],
        Some(RawContent::Blocks(blocks)) => blocks,
    })
}
