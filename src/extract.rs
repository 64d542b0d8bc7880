//! Pure helpers that pull common data out of a [`StreamMessage`].
//!
//! Missing parts yield the empty result (`""`, `None`, or an empty `Vec`)
//! so callers never need to match on the message shape themselves.

use crate::cli::{ContentBlock, StreamMessage, TodoItem, Usage};

/// A tool invocation borrowed from a message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolCall<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub input: &'a serde_json::Value,
}

/// First text found, checking the direct `text` field, then text blocks,
/// then (for results) the `result` field.
#[must_use]
pub fn extract_text(msg: &StreamMessage) -> &str {
    let direct = msg.direct_text();
    if !direct.is_empty() {
        return direct;
    }
    if let Some(text) = msg
        .content()
        .iter()
        .filter_map(ContentBlock::as_text)
        .find(|text| !text.is_empty())
    {
        return text;
    }
    match msg {
        StreamMessage::Result(result) => &result.result,
        _ => "",
    }
}

/// Every text source of the message, in order, joined by newlines.
#[must_use]
pub fn extract_all_text(msg: &StreamMessage) -> String {
    let result = match msg {
        StreamMessage::Result(result) => result.result.as_str(),
        _ => "",
    };
    std::iter::once(msg.direct_text())
        .chain(msg.content().iter().filter_map(ContentBlock::as_text))
        .chain(std::iter::once(result))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// First non-empty thinking block.
#[must_use]
pub fn extract_thinking(msg: &StreamMessage) -> &str {
    msg.content()
        .iter()
        .filter_map(ContentBlock::as_thinking)
        .find(|thinking| !thinking.is_empty())
        .unwrap_or("")
}

/// All thinking blocks joined by newlines.
#[must_use]
pub fn extract_all_thinking(msg: &StreamMessage) -> String {
    msg.content()
        .iter()
        .filter_map(ContentBlock::as_thinking)
        .filter(|thinking| !thinking.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Name of the first tool invoked by the message.
#[must_use]
pub fn get_tool_name(msg: &StreamMessage) -> Option<&str> {
    get_tool_call(msg).map(|call| call.name)
}

/// First tool invocation of the message.
#[must_use]
pub fn get_tool_call(msg: &StreamMessage) -> Option<ToolCall<'_>> {
    tool_calls(msg).next()
}

/// All tool invocations in source order. A message holds several when
/// tools are called in parallel.
#[must_use]
pub fn get_all_tool_calls(msg: &StreamMessage) -> Vec<ToolCall<'_>> {
    tool_calls(msg).collect()
}

fn tool_calls(msg: &StreamMessage) -> impl Iterator<Item = ToolCall<'_>> {
    msg.content().iter().filter_map(|block| match block {
        ContentBlock::ToolUse { id, name, input } if !name.is_empty() => Some(ToolCall {
            id,
            name,
            input,
        }),
        _ => None,
    })
}

fn string_field<'a>(input: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    input.get(key).and_then(serde_json::Value::as_str)
}

/// Command of the first `Bash` call.
#[must_use]
pub fn extract_bash_command(msg: &StreamMessage) -> Option<&str> {
    tool_calls(msg)
        .filter(|call| call.name == "Bash")
        .find_map(|call| string_field(call.input, "command"))
}

/// Path of the first `Read`, `Write` or `Edit` call.
#[must_use]
pub fn extract_file_access(msg: &StreamMessage) -> Option<&str> {
    tool_calls(msg)
        .filter(|call| matches!(call.name, "Read" | "Write" | "Edit"))
        .find_map(|call| string_field(call.input, "file_path"))
}

/// Paths touched by file tools, including `Glob` and `Grep` search roots.
#[must_use]
pub fn extract_all_file_access(msg: &StreamMessage) -> Vec<&str> {
    tool_calls(msg)
        .filter_map(|call| match call.name {
            "Read" | "Write" | "Edit" => string_field(call.input, "file_path"),
            "Glob" | "Grep" => string_field(call.input, "path"),
            _ => None,
        })
        .collect()
}

/// Todo list written by the first `TodoWrite` call.
///
/// Entries without a string `content` and `status` are skipped.
#[must_use]
pub fn extract_todos(msg: &StreamMessage) -> Option<Vec<TodoItem>> {
    let todos = tool_calls(msg)
        .filter(|call| call.name == "TodoWrite")
        .find_map(|call| call.input.get("todos").and_then(serde_json::Value::as_array))?;

    Some(
        todos
            .iter()
            .filter_map(|entry| {
                let field = |key| string_field(entry, key).map(str::to_string);
                Some(TodoItem {
                    content: field("content")?,
                    status: field("status")?,
                    id: field("id").unwrap_or_default(),
                    active_form: field("activeForm").unwrap_or_default(),
                    priority: field("priority").unwrap_or_default(),
                })
            })
            .collect(),
    )
}

/// Schema-validated output of a result message.
#[must_use]
pub fn extract_structured_output(msg: &StreamMessage) -> Option<&serde_json::Value> {
    msg.as_result()?.structured_output.as_ref()
}

/// Token usage of a result message.
#[must_use]
pub fn extract_usage(msg: &StreamMessage) -> Option<Usage> {
    msg.as_result()?.usage
}

/// Tool names announced by the init message.
#[must_use]
pub fn extract_init_tools(msg: &StreamMessage) -> Option<&[String]> {
    match msg {
        StreamMessage::System(system) if system.subtype == "init" => Some(system.tools.as_slice()),
        _ => None,
    }
}

/// Permission mode announced by the init message.
#[must_use]
pub fn extract_init_permission_mode(msg: &StreamMessage) -> Option<&str> {
    match msg {
        StreamMessage::System(system) if system.subtype == "init" => {
            Some(system.permission_mode.as_str())
        }
        _ => None,
    }
}

#[must_use]
pub fn is_result(msg: &StreamMessage) -> bool {
    msg.is_result()
}

#[must_use]
pub fn is_error(msg: &StreamMessage) -> bool {
    msg.is_error()
}

#[must_use]
pub fn is_assistant(msg: &StreamMessage) -> bool {
    msg.is_assistant()
}

#[must_use]
pub fn is_system(msg: &StreamMessage) -> bool {
    msg.is_system()
}

#[must_use]
pub fn is_init(msg: &StreamMessage) -> bool {
    msg.is_init()
}

#[must_use]
pub fn is_user(msg: &StreamMessage) -> bool {
    msg.is_user()
}
