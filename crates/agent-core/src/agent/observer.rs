//! Lifecycle notifications for a run
//!
//! Observers see every step the loop takes but only ever get shared references,
//! so they cannot alter the conversation.

use crate::error::AgentError;
use crate::message::{Decision, Message, ToolInvocation, ToolResult};
use crate::tools::ToolSpec;

/// Receives notifications as a run progresses
///
/// Every method has an empty default, so implementors only override what they need.
pub trait AgentObserver: Send {
    fn on_task(&mut self, _task: &str) {}

    /// Called before each provider call with the history it will see
    fn on_request(&mut self, _turn: usize, _history: &[Message], _tools: &[ToolSpec]) {}

    fn on_decision(&mut self, _turn: usize, _decision: &Decision) {}

    fn on_tool_call(&mut self, _invocation: &ToolInvocation) {}

    fn on_tool_result(&mut self, _invocation: &ToolInvocation, _result: &ToolResult) {}

    fn on_answer(&mut self, _answer: &str) {}

    fn on_error(&mut self, _error: &AgentError) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AgentObserver for NoopObserver {}
