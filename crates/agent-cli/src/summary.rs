//! Compact JSON views of requests and decisions
//!
//! Shared by the terminal display and the transcript so both show the same thing.

use agent_core::{Decision, Message, ToolInvocation, ToolResult, ToolSpec};
use serde_json::{json, Map, Value};

const MESSAGE_PREVIEW: usize = 200;
const RESPONSE_PREVIEW: usize = 300;
const PARAM_PREVIEW: usize = 50;
const RESULT_PREVIEW: usize = 500;
const ID_PREVIEW: usize = 8;

/// Truncate to `max` characters, appending `...` when shortened
pub fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

pub fn short_id(id: &str) -> String {
    let cut: String = id.chars().take(ID_PREVIEW).collect();
    format!("{}...", cut)
}

/// What the provider is about to be shown
pub fn request_summary(history: &[Message], tools: &[ToolSpec]) -> Value {
    let messages: Vec<Value> = history
        .iter()
        .map(|msg| {
            let mut entry = Map::new();
            entry.insert("role".into(), json!(msg.role.to_string()));
            if !msg.content.is_empty() {
                entry.insert("content".into(), json!(preview(&msg.content, MESSAGE_PREVIEW)));
            }
            if !msg.tool_invocations.is_empty() {
                let calls: Vec<Value> = msg
                    .tool_invocations
                    .iter()
                    .map(|inv| json!({"name": inv.tool_name, "id": short_id(&inv.id)}))
                    .collect();
                entry.insert("tool_calls".into(), Value::Array(calls));
            }
            if let Some(id) = msg.tool_result_ref() {
                entry.insert("tool_use_id".into(), json!(short_id(id)));
            }
            Value::Object(entry)
        })
        .collect();

    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    json!({ "messages": messages, "tools": names })
}

/// What the provider decided
pub fn response_summary(decision: &Decision) -> Value {
    let mut info = Map::new();
    match decision {
        Decision::Final(answer) => {
            if !answer.is_empty() {
                info.insert("content".into(), json!(preview(answer, RESPONSE_PREVIEW)));
            }
            info.insert("is_final".into(), json!(true));
        }
        Decision::ActionBatch(batch) => {
            if let Some(text) = batch.preamble.as_deref().filter(|t| !t.is_empty()) {
                info.insert("content".into(), json!(preview(text, RESPONSE_PREVIEW)));
            }
            let calls: Vec<Value> = batch
                .invocations
                .iter()
                .map(|inv| {
                    json!({
                        "name": inv.tool_name,
                        "parameters": inv.parameters,
                        "id": short_id(&inv.id),
                    })
                })
                .collect();
            info.insert("tool_calls".into(), Value::Array(calls));
        }
    }
    Value::Object(info)
}

/// `key: value` lines for a tool call, long strings shortened
pub fn parameter_lines(invocation: &ToolInvocation) -> Vec<String> {
    match &invocation.parameters {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                let shown = match value {
                    Value::String(s) if s.chars().count() > PARAM_PREVIEW => {
                        json!(preview(s, PARAM_PREVIEW))
                    }
                    other => other.clone(),
                };
                format!("{}: {}", key, shown)
            })
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

/// Result text as shown to the user, capped for readability
pub fn result_text(result: &ToolResult) -> String {
    let text = result.to_content();
    match text.char_indices().nth(RESULT_PREVIEW) {
        Some((idx, _)) => format!("{}\n... (truncated)", &text[..idx]),
        None => text,
    }
}

pub fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
