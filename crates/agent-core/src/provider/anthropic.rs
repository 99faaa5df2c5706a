//! Anthropic Messages API backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{check_status, http_client, parse_body, Provider};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::message::{ActionBatch, Decision, Message, Role, ToolInvocation};
use crate::tools::ToolSpec;

const API_VERSION: &str = "2023-06-01";

/// Provider backed by Claude models
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    system_prompt: Option<String>,
    timeout: Option<Duration>,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<RequestBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

impl AnthropicProvider {
    /// Create a provider; the config must carry an API key
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::Config(
                    "an API key is required for the anthropic provider".to_string(),
                )
            })?;

        Ok(Self {
            client: http_client(config.timeout())?,
            base_url: config.base_url().to_string(),
            api_key,
            model: config.model().to_string(),
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone(),
            timeout: config.timeout(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request<'a>(&'a self, history: &[Message], tools: &[ToolSpec]) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: self.system_prompt.as_deref(),
            messages: convert_messages(history),
            tools: tools.iter().map(convert_tool).collect(),
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    #[instrument(skip_all, fields(model = %self.model, messages = history.len()))]
    async fn decide(
        &self,
        history: &[Message],
        tools: &[ToolSpec],
    ) -> Result<Decision, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let request = self.build_request(history, tools);

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        let resp = check_status(resp).await.map_err(|e| {
            warn!(error = %e, "Anthropic request rejected");
            e
        })?;

        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;
        let parsed: MessagesResponse = parse_body(&body)?;
        debug!(
            stop_reason = ?parsed.stop_reason,
            blocks = parsed.content.len(),
            "Received response"
        );

        Ok(parse_response(parsed))
    }
}

fn convert_tool(spec: &ToolSpec) -> WireTool {
    WireTool {
        name: spec.name.clone(),
        description: spec.description.clone(),
        input_schema: spec.input_schema(),
    }
}

/// Map history onto Messages API turns
///
/// Consecutive tool results are grouped into one user turn, which is how the API
/// expects the answers to a multi-call assistant turn.
fn convert_messages(history: &[Message]) -> Vec<WireMessage> {
    let mut out: Vec<WireMessage> = Vec::new();
    let mut last_was_result = false;

    for msg in history {
        match msg.role {
            Role::User => {
                out.push(WireMessage {
                    role: "user",
                    content: vec![RequestBlock::Text {
                        text: msg.content.clone(),
                    }],
                });
                last_was_result = false;
            }
            Role::Assistant => {
                let mut content = Vec::new();
                if !msg.content.is_empty() {
                    content.push(RequestBlock::Text {
                        text: msg.content.clone(),
                    });
                }
                for inv in &msg.tool_invocations {
                    content.push(RequestBlock::ToolUse {
                        id: inv.id.clone(),
                        name: inv.tool_name.clone(),
                        input: inv.parameters.clone(),
                    });
                }
                if !content.is_empty() {
                    out.push(WireMessage {
                        role: "assistant",
                        content,
                    });
                }
                last_was_result = false;
            }
            Role::ToolResult => {
                let Some(result) = &msg.tool_result else {
                    continue;
                };
                let block = RequestBlock::ToolResult {
                    tool_use_id: result.invocation_id.clone(),
                    content: result.to_content(),
                    is_error: !result.success,
                };
                match out.last_mut() {
                    Some(prev) if last_was_result => prev.content.push(block),
                    _ => out.push(WireMessage {
                        role: "user",
                        content: vec![block],
                    }),
                }
                last_was_result = true;
            }
        }
    }

    out
}

fn parse_response(resp: MessagesResponse) -> Decision {
    let mut texts = Vec::new();
    let mut invocations = Vec::new();

    for block in resp.content {
        match block {
            ResponseBlock::Text { text } => {
                if !text.is_empty() {
                    texts.push(text);
                }
            }
            ResponseBlock::ToolUse { id, name, input } => {
                invocations.push(ToolInvocation::new(id, name, input));
            }
            ResponseBlock::Other => {}
        }
    }

    let text = texts.join("\n");
    if invocations.is_empty() {
        Decision::Final(text)
    } else {
        Decision::ActionBatch(ActionBatch {
            preamble: if text.is_empty() { None } else { Some(text) },
            invocations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::message::{History, ToolErrorKind, ToolResult};
    use crate::tools::{ParameterProperty, ParameterSchema};
    use serde_json::json;

    fn provider() -> AnthropicProvider {
        let config = ProviderConfig::new(ProviderKind::Anthropic)
            .with_api_key("sk-test")
            .with_base_url("http://localhost:9/");
        AnthropicProvider::new(&config).unwrap()
    }

    fn sample_history() -> History {
        let mut history = History::new();
        history.push_user("Create hello.py");
        history
            .push_action_batch(
                "Writing the file.",
                vec![
                    ToolInvocation::new(
                        "toolu_1",
                        "write_file",
                        json!({"path": "hello.py", "content": "x"}),
                    ),
                    ToolInvocation::new("toolu_2", "shell", json!({"command": "python hello.py"})),
                ],
            )
            .unwrap();
        history
            .push_tool_result(ToolResult::success("toolu_1", "Wrote 1 bytes to hello.py"))
            .unwrap();
        history
            .push_tool_result(ToolResult::failure(
                "toolu_2",
                ToolErrorKind::ExecutionFailure,
                "exit code: 1",
            ))
            .unwrap();
        history
    }

    #[test]
    fn test_new_without_key_fails() {
        let config = ProviderConfig::new(ProviderKind::Anthropic).with_api_key("  ");
        assert!(matches!(
            AnthropicProvider::new(&config),
            Err(ProviderError::Config(_))
        ));
    }

    #[test]
    fn test_request_groups_tool_results() {
        let provider = provider();
        let history = sample_history();
        let tools = vec![ToolSpec::new(
            "write_file",
            "Write a file",
            ParameterSchema::new().with_required("path", ParameterProperty::string("Path")),
        )];

        let request =
            serde_json::to_value(provider.build_request(history.messages(), &tools)).unwrap();

        assert_eq!(request["model"], crate::config::DEFAULT_ANTHROPIC_MODEL);
        assert_eq!(request["max_tokens"], 4096);
        assert!(request.get("system").is_none());

        let messages = request["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[0],
            json!({"role": "user", "content": [{"type": "text", "text": "Create hello.py"}]})
        );

        let assistant = &messages[1]["content"];
        assert_eq!(assistant[0], json!({"type": "text", "text": "Writing the file."}));
        assert_eq!(assistant[1]["type"], "tool_use");
        assert_eq!(assistant[1]["id"], "toolu_1");
        assert_eq!(assistant[2]["name"], "shell");

        let results = messages[2]["content"].as_array().unwrap();
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0],
            json!({"type": "tool_result", "tool_use_id": "toolu_1", "content": "Wrote 1 bytes to hello.py"})
        );
        assert_eq!(results[1]["is_error"], true);
        assert_eq!(results[1]["content"], "Error: exit code: 1");

        assert_eq!(request["tools"][0]["name"], "write_file");
        assert_eq!(request["tools"][0]["input_schema"]["required"], json!(["path"]));
    }

    #[test]
    fn test_parse_final_answer() {
        let resp: MessagesResponse = parse_body(
            r#"{"id":"msg_1","type":"message","role":"assistant","stop_reason":"end_turn",
                "content":[{"type":"text","text":"All done."}]}"#,
        )
        .unwrap();

        assert_eq!(parse_response(resp), Decision::Final("All done.".to_string()));
    }

    #[test]
    fn test_parse_tool_use_passes_unknown_tools_through() {
        let resp: MessagesResponse = parse_body(
            r#"{"stop_reason":"tool_use","content":[
                {"type":"thinking","thinking":"hmm","signature":"x"},
                {"type":"text","text":"Let me clean up."},
                {"type":"tool_use","id":"toolu_9","name":"delete_everything","input":{"force":"yes"}}
            ]}"#,
        )
        .unwrap();

        match parse_response(resp) {
            Decision::ActionBatch(batch) => {
                assert_eq!(batch.preamble.as_deref(), Some("Let me clean up."));
                assert_eq!(batch.invocations.len(), 1);
                assert_eq!(batch.invocations[0].tool_name, "delete_everything");
                assert_eq!(batch.invocations[0].parameters, json!({"force": "yes"}));
            }
            other => panic!("expected action batch, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_malformed_body() {
        let err = parse_body::<MessagesResponse>(r#"{"content": "not a list"}"#).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedDecision(_)));
    }
}
