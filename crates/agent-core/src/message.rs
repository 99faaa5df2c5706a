//! Conversation data model
//!
//! The [`History`] is the only conversation state in a run. It is append-only:
//! there is no API to remove, edit or reorder a message once pushed.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HistoryError;

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    #[serde(rename = "tool")]
    ToolResult,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::ToolResult => write!(f, "tool"),
        }
    }
}

/// A requested action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Unique within the conversation
    pub id: String,
    /// Name of the tool to run
    pub tool_name: String,
    /// Arguments, expected to be a JSON object
    pub parameters: Value,
}

impl ToolInvocation {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, parameters: Value) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            parameters,
        }
    }
}

/// Category of a failed tool result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Unknown tool or parameters that do not satisfy the tool's schema
    SchemaViolation,
    /// The tool ran (or tried to) and its operation failed
    ExecutionFailure,
    /// The tool did not finish within its time bound
    Timeout,
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolErrorKind::SchemaViolation => write!(f, "schema violation"),
            ToolErrorKind::ExecutionFailure => write!(f, "execution failure"),
            ToolErrorKind::Timeout => write!(f, "timeout"),
        }
    }
}

/// Structured description of a tool failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

/// Outcome of executing one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub invocation_id: String,
    pub success: bool,
    /// Text summary; may be non-empty on failure (e.g. partial command output)
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolResult {
    pub fn success(invocation_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(
        invocation_id: impl Into<String>,
        kind: ToolErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            success: false,
            output: String::new(),
            error: Some(ToolError {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Text shown to the model for this result
    pub fn to_content(&self) -> String {
        match &self.error {
            None if self.output.is_empty() => "(no output)".to_string(),
            None => self.output.clone(),
            Some(err) if self.output.is_empty() => format!("Error: {}", err.message),
            Some(err) => format!("{}\nError: {}", self.output, err.message),
        }
    }
}

/// One turn in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_invocations: Vec::new(),
            tool_result: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_invocations: Vec::new(),
            tool_result: None,
        }
    }

    pub fn assistant_with_invocations(
        content: impl Into<String>,
        invocations: Vec<ToolInvocation>,
    ) -> Self {
        Self {
            tool_invocations: invocations,
            ..Self::assistant(content)
        }
    }

    pub fn tool_result(result: ToolResult) -> Self {
        Self {
            role: Role::ToolResult,
            content: String::new(),
            tool_invocations: Vec::new(),
            tool_result: Some(result),
        }
    }

    /// Id of the invocation a tool-result message answers
    pub fn tool_result_ref(&self) -> Option<&str> {
        self.tool_result.as_ref().map(|r| r.invocation_id.as_str())
    }
}

/// A batch of actions requested in one turn
#[derive(Debug, Clone, PartialEq)]
pub struct ActionBatch {
    /// Free text the model emitted alongside the calls
    pub preamble: Option<String>,
    /// Invocations in the order they must run
    pub invocations: Vec<ToolInvocation>,
}

/// The provider's output for one turn
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Final(String),
    ActionBatch(ActionBatch),
}

impl Decision {
    pub fn final_answer(answer: impl Into<String>) -> Self {
        Decision::Final(answer.into())
    }

    pub fn actions(invocations: Vec<ToolInvocation>) -> Self {
        Decision::ActionBatch(ActionBatch {
            preamble: None,
            invocations,
        })
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Decision::Final(_))
    }
}

/// Append-only conversation history for a single run
#[derive(Debug, Clone, Default)]
pub struct History {
    messages: Vec<Message>,
    /// Every invocation id ever appended
    invocation_ids: HashSet<String>,
    /// Invocation ids still waiting for a result, in request order
    pending: Vec<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// Append an assistant message requesting `invocations`
    ///
    /// Ids must be unique across the whole history; nothing is appended on error.
    pub fn push_action_batch(
        &mut self,
        content: impl Into<String>,
        invocations: Vec<ToolInvocation>,
    ) -> Result<(), HistoryError> {
        let mut batch_ids = HashSet::new();
        for inv in &invocations {
            if self.invocation_ids.contains(&inv.id) || !batch_ids.insert(inv.id.as_str()) {
                return Err(HistoryError::DuplicateInvocation(inv.id.clone()));
            }
        }

        for inv in &invocations {
            self.invocation_ids.insert(inv.id.clone());
            self.pending.push(inv.id.clone());
        }
        self.messages
            .push(Message::assistant_with_invocations(content, invocations));
        Ok(())
    }

    /// Append the result for a prior, unanswered invocation
    pub fn push_tool_result(&mut self, result: ToolResult) -> Result<(), HistoryError> {
        let id = &result.invocation_id;
        match self.pending.iter().position(|p| p == id) {
            Some(idx) => {
                self.pending.remove(idx);
            }
            None if self.invocation_ids.contains(id) => {
                return Err(HistoryError::AlreadyAnswered(id.clone()));
            }
            None => return Err(HistoryError::UnknownInvocation(id.clone())),
        }
        self.messages.push(Message::tool_result(result));
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn contains_invocation(&self, id: &str) -> bool {
        self.invocation_ids.contains(id)
    }

    /// Invocations that have been requested but not yet answered
    pub fn unanswered(&self) -> &[String] {
        &self.pending
    }

    /// Look up a requested invocation by id
    pub fn find_invocation(&self, id: &str) -> Option<&ToolInvocation> {
        self.messages
            .iter()
            .flat_map(|m| m.tool_invocations.iter())
            .find(|inv| inv.id == id)
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invocation(id: &str) -> ToolInvocation {
        ToolInvocation::new(id, "read_file", json!({"path": "a.txt"}))
    }

    #[test]
    fn test_history_pairs_results_with_invocations() {
        let mut history = History::new();
        history.push_user("read a.txt");
        history
            .push_action_batch("", vec![invocation("1"), invocation("2")])
            .unwrap();
        assert_eq!(history.unanswered(), &["1".to_string(), "2".to_string()]);

        history
            .push_tool_result(ToolResult::success("2", "second"))
            .unwrap();
        history
            .push_tool_result(ToolResult::success("1", "first"))
            .unwrap();

        assert!(history.unanswered().is_empty());
        assert_eq!(history.len(), 4);
        assert_eq!(history.messages()[2].tool_result_ref(), Some("2"));
    }

    #[test]
    fn test_history_rejects_unknown_and_repeated_results() {
        let mut history = History::new();
        history.push_user("task");
        history.push_action_batch("", vec![invocation("1")]).unwrap();

        assert_eq!(
            history.push_tool_result(ToolResult::success("nope", "")),
            Err(HistoryError::UnknownInvocation("nope".to_string()))
        );

        history.push_tool_result(ToolResult::success("1", "ok")).unwrap();
        assert_eq!(
            history.push_tool_result(ToolResult::success("1", "again")),
            Err(HistoryError::AlreadyAnswered("1".to_string()))
        );
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_history_rejects_duplicate_ids() {
        let mut history = History::new();
        history.push_user("task");

        let err = history
            .push_action_batch("", vec![invocation("1"), invocation("1")])
            .unwrap_err();
        assert_eq!(err, HistoryError::DuplicateInvocation("1".to_string()));
        assert_eq!(history.len(), 1);

        history.push_action_batch("", vec![invocation("1")]).unwrap();
        assert!(history.push_action_batch("", vec![invocation("1")]).is_err());
        assert!(history.find_invocation("1").is_some());
    }

    #[test]
    fn test_tool_result_content() {
        assert_eq!(ToolResult::success("1", "").to_content(), "(no output)");
        assert_eq!(ToolResult::success("1", "hi").to_content(), "hi");

        let failed = ToolResult::failure("1", ToolErrorKind::ExecutionFailure, "exit code: 2");
        assert_eq!(failed.to_content(), "Error: exit code: 2");
        assert_eq!(
            failed.with_output("partial").to_content(),
            "partial\nError: exit code: 2"
        );
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_value(Role::ToolResult).unwrap(), json!("tool"));
        assert_eq!(serde_json::to_value(Role::User).unwrap(), json!("user"));
    }
}
