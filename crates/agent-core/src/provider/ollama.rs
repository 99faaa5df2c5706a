//! Ollama chat API backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{check_status, http_client, parse_body, Provider};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::message::{ActionBatch, Decision, Message, Role, ToolInvocation};
use crate::tools::ToolSpec;

/// Provider backed by a local Ollama server
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    system_prompt: Option<String>,
    parse_content_tool_calls: bool,
    timeout: Option<Duration>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDefinition>,
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Serialize)]
struct ToolDefinition {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: FunctionDefinition,
}

#[derive(Debug, Serialize)]
struct FunctionDefinition {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
}

impl OllamaProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(config.timeout())?,
            base_url: config.base_url().to_string(),
            model: config.model().to_string(),
            system_prompt: config.system_prompt.clone(),
            parse_content_tool_calls: config.parse_content_tool_calls,
            timeout: config.timeout(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request<'a>(&'a self, history: &[Message], tools: &[ToolSpec]) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(ref system) = self.system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
                tool_calls: Vec::new(),
                tool_name: None,
            });
        }
        messages.extend(convert_messages(history));

        ChatRequest {
            model: &self.model,
            messages,
            tools: tools
                .iter()
                .map(|spec| ToolDefinition {
                    tool_type: "function",
                    function: FunctionDefinition {
                        name: spec.name.clone(),
                        description: spec.description.clone(),
                        parameters: spec.input_schema(),
                    },
                })
                .collect(),
            stream: false,
        }
    }

    fn parse_response(&self, resp: ChatResponse) -> Result<Decision, ProviderError> {
        let message = resp
            .message
            .ok_or_else(|| {
                ProviderError::MalformedDecision("response has no message".to_string())
            })?;

        let mut invocations: Vec<ToolInvocation> = message
            .tool_calls
            .into_iter()
            .map(|call| {
                ToolInvocation::new(
                    call.id.filter(|id| !id.is_empty()).unwrap_or_else(new_call_id),
                    call.function.name,
                    normalize_arguments(call.function.arguments),
                )
            })
            .collect();

        if invocations.is_empty() && self.parse_content_tool_calls {
            if let Some(parsed) = parse_json_tool_calls(&message.content) {
                debug!(count = parsed.len(), "Parsed tool calls from content JSON");
                invocations = parsed;
            }
        }

        if invocations.is_empty() {
            return Ok(Decision::Final(message.content));
        }

        let preamble = message.content.trim();
        Ok(Decision::ActionBatch(ActionBatch {
            preamble: if preamble.is_empty() || self.parse_content_tool_calls {
                None
            } else {
                Some(preamble.to_string())
            },
            invocations,
        }))
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip_all, fields(model = %self.model, messages = history.len()))]
    async fn decide(
        &self,
        history: &[Message],
        tools: &[ToolSpec],
    ) -> Result<Decision, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let request = self.build_request(history, tools);

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        let resp = check_status(resp).await.map_err(|e| {
            warn!(error = %e, "Ollama request rejected");
            e
        })?;

        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;
        let parsed: ChatResponse = parse_body(&body)?;
        debug!(done = parsed.done, "Received response");

        self.parse_response(parsed)
    }
}

fn new_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

/// Some models send arguments as a JSON-encoded string
fn normalize_arguments(arguments: Value) -> Value {
    match arguments {
        Value::String(ref s) => serde_json::from_str::<Value>(s)
            .ok()
            .filter(|v| v.is_object())
            .unwrap_or(arguments),
        Value::Null => Value::Object(Default::default()),
        other => other,
    }
}

fn convert_messages(history: &[Message]) -> Vec<ChatMessage> {
    let mut tool_names: HashMap<&str, &str> = HashMap::new();
    let mut out = Vec::with_capacity(history.len());

    for msg in history {
        match msg.role {
            Role::User | Role::Assistant => {
                for inv in &msg.tool_invocations {
                    tool_names.insert(&inv.id, &inv.tool_name);
                }
                out.push(ChatMessage {
                    role: msg.role.to_string(),
                    content: msg.content.clone(),
                    tool_calls: msg
                        .tool_invocations
                        .iter()
                        .map(|inv| ToolCall {
                            id: Some(inv.id.clone()),
                            function: FunctionCall {
                                name: inv.tool_name.clone(),
                                arguments: inv.parameters.clone(),
                            },
                        })
                        .collect(),
                    tool_name: None,
                });
            }
            Role::ToolResult => {
                let Some(result) = &msg.tool_result else {
                    continue;
                };
                out.push(ChatMessage {
                    role: "tool".to_string(),
                    content: result.to_content(),
                    tool_calls: Vec::new(),
                    tool_name: tool_names
                        .get(result.invocation_id.as_str())
                        .map(|n| n.to_string()),
                });
            }
        }
    }

    out
}

/// Parse JSON tool calls from content text
///
/// Supports:
/// - Raw JSON: `{"name": "tool_name", "arguments": {...}}`
/// - Markdown code blocks: ```json\n{"name": ...}\n```
/// - Multiple tool calls (array or sequential)
fn parse_json_tool_calls(content: &str) -> Option<Vec<ToolInvocation>> {
    let content = content.trim();
    if content.is_empty() {
        return None;
    }

    let json_content = extract_json_from_markdown(content).unwrap_or(content);

    if let Some(call) = try_parse_single_tool_call(json_content) {
        return Some(vec![call]);
    }

    if let Some(calls) = try_parse_tool_call_array(json_content) {
        return Some(calls);
    }

    extract_json_objects(content)
}

/// Extract JSON content from markdown code blocks
fn extract_json_from_markdown(content: &str) -> Option<&str> {
    let patterns = ["```json\n", "```JSON\n", "```\n"];

    for pattern in patterns {
        if let Some(start) = content.find(pattern) {
            let json_start = start + pattern.len();
            if let Some(end) = content[json_start..].find("```") {
                return Some(content[json_start..json_start + end].trim());
            }
        }
    }

    None
}

#[derive(Deserialize)]
struct ContentToolCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl ContentToolCall {
    fn into_invocation(self) -> Option<ToolInvocation> {
        if self.name.is_empty() {
            return None;
        }
        Some(ToolInvocation::new(
            new_call_id(),
            self.name,
            normalize_arguments(self.arguments),
        ))
    }
}

fn try_parse_single_tool_call(content: &str) -> Option<ToolInvocation> {
    serde_json::from_str::<ContentToolCall>(content)
        .ok()?
        .into_invocation()
}

fn try_parse_tool_call_array(content: &str) -> Option<Vec<ToolInvocation>> {
    let parsed: Vec<ContentToolCall> = serde_json::from_str(content).ok()?;
    let calls: Vec<ToolInvocation> = parsed
        .into_iter()
        .filter_map(ContentToolCall::into_invocation)
        .collect();

    if calls.is_empty() {
        None
    } else {
        Some(calls)
    }
}

/// Extract top-level JSON objects embedded in prose
fn extract_json_objects(content: &str) -> Option<Vec<ToolInvocation>> {
    let mut calls = Vec::new();
    let mut depth = 0usize;
    let mut start = None;

    for (i, c) in content.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        if let Some(call) = try_parse_single_tool_call(&content[s..=i]) {
                            calls.push(call);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    if calls.is_empty() {
        None
    } else {
        Some(calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::message::{History, ToolResult};
    use serde_json::json;

    fn provider(parse_content: bool) -> OllamaProvider {
        let mut config = ProviderConfig::new(ProviderKind::Ollama);
        config.parse_content_tool_calls = parse_content;
        config.system_prompt = Some("Be brief.".to_string());
        OllamaProvider::new(&config).unwrap()
    }

    fn response(body: Value) -> ChatResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_request_shape() {
        let mut history = History::new();
        history.push_user("list files");
        history
            .push_action_batch(
                "",
                vec![ToolInvocation::new("c1", "shell", json!({"command": "ls"}))],
            )
            .unwrap();
        history.push_tool_result(ToolResult::success("c1", "a.txt")).unwrap();

        let specs = crate::tools::builtin::default_registry().specs();
        let ollama = provider(false);
        let request = serde_json::to_value(ollama.build_request(history.messages(), &specs)).unwrap();

        assert_eq!(request["model"], crate::config::DEFAULT_OLLAMA_MODEL);
        assert_eq!(request["stream"], false);
        let messages = request["messages"].as_array().unwrap();
        assert_eq!(messages[0], json!({"role": "system", "content": "Be brief."}));
        assert_eq!(messages[2]["tool_calls"][0]["function"]["name"], "shell");
        assert_eq!(messages[3], json!({"role": "tool", "content": "a.txt", "tool_name": "shell"}));
        assert_eq!(request["tools"][0]["type"], "function");
        assert_eq!(request["tools"][0]["function"]["name"], "read_file");
    }

    #[test]
    fn test_parse_native_tool_calls() {
        let decision = provider(false)
            .parse_response(response(json!({
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [
                        {"function": {"name": "read_file", "arguments": {"path": "a.txt"}}},
                        {"function": {"name": "shell", "arguments": "{\"command\": \"ls\"}"}}
                    ]
                },
                "done": true
            })))
            .unwrap();

        match decision {
            Decision::ActionBatch(batch) => {
                assert_eq!(batch.invocations.len(), 2);
                assert!(batch.invocations[0].id.starts_with("call_"));
                assert_ne!(batch.invocations[0].id, batch.invocations[1].id);
                assert_eq!(batch.invocations[1].parameters, json!({"command": "ls"}));
                assert!(batch.preamble.is_none());
            }
            other => panic!("expected action batch, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_final() {
        let decision = provider(false)
            .parse_response(response(json!({
                "message": {"role": "assistant", "content": "Done."},
                "done": true
            })))
            .unwrap();
        assert_eq!(decision, Decision::Final("Done.".to_string()));
    }

    #[test]
    fn test_parse_missing_message() {
        let err = provider(false).parse_response(response(json!({"done": true}))).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedDecision(_)));
    }

    #[test]
    fn test_content_tool_calls_only_when_enabled() {
        let body = json!({
            "message": {"role": "assistant", "content": "{\"name\": \"read_file\", \"arguments\": {\"path\": \"a\"}}"},
            "done": true
        });

        assert!(provider(false).parse_response(response(body.clone())).unwrap().is_final());
        assert!(!provider(true).parse_response(response(body)).unwrap().is_final());
    }

    #[test]
    fn test_parse_json_tool_call_markdown() {
        let content = "```json\n{\"name\": \"read_file\", \"arguments\": {\"path\": \"/tmp/test.txt\"}}\n```";
        let calls = parse_json_tool_calls(content).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_name, "read_file");
    }

    #[test]
    fn test_parse_json_tool_call_with_text() {
        let content = r#"I'll look at that file.
{"name": "read_file", "arguments": {"path": "src/main.rs"}}
Let me know if you need more."#;
        let calls = parse_json_tool_calls(content).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].parameters, json!({"path": "src/main.rs"}));
    }

    #[test]
    fn test_parse_json_tool_call_array() {
        let content = r#"[
            {"name": "read_file", "arguments": {"path": "a.txt"}},
            {"name": "read_file", "arguments": {"path": "b.txt"}}
        ]"#;
        let calls = parse_json_tool_calls(content).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].parameters["path"], "b.txt");
    }

    #[test]
    fn test_parse_json_tool_call_no_match() {
        assert!(parse_json_tool_calls("Just a regular response }{ with no tool calls.").is_none());
    }
}
