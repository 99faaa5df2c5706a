//! Agent configuration and run outcome

use std::path::PathBuf;
use std::time::Duration;

use crate::message::History;
use crate::tools::ToolContext;

/// Configuration for the agent loop
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum provider turns before giving up; `None` runs until a final answer
    pub max_turns: Option<usize>,
    /// Bound on each provider call
    pub provider_timeout: Option<Duration>,
    /// Bound on each tool execution
    pub tool_timeout: Option<Duration>,
    /// Working directory handed to tools
    pub working_dir: PathBuf,
    pub max_output_len: usize,
    pub command_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let ctx = ToolContext::default();
        Self {
            max_turns: Some(50),
            provider_timeout: Some(Duration::from_secs(120)),
            tool_timeout: Some(Duration::from_secs(60)),
            working_dir: ctx.working_dir,
            max_output_len: ctx.max_output_len,
            command_timeout_secs: ctx.command_timeout_secs,
        }
    }
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_turns(mut self, max: Option<usize>) -> Self {
        self.max_turns = max;
        self
    }

    pub fn with_provider_timeout(mut self, limit: Option<Duration>) -> Self {
        self.provider_timeout = limit;
        self
    }

    pub fn with_tool_timeout(mut self, limit: Option<Duration>) -> Self {
        self.tool_timeout = limit;
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn with_max_output_len(mut self, len: usize) -> Self {
        self.max_output_len = len;
        self
    }

    pub fn with_command_timeout(mut self, secs: u64) -> Self {
        self.command_timeout_secs = secs;
        self
    }

    /// Ambient environment passed to every tool
    pub fn tool_context(&self) -> ToolContext {
        ToolContext::new(self.working_dir.clone())
            .with_max_output_len(self.max_output_len)
            .with_command_timeout(self.command_timeout_secs)
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Final answer text, returned verbatim from the provider
    pub answer: String,
    /// Full conversation, ending with the assistant's answer
    pub history: History,
    /// Number of provider calls made
    pub turns: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_turns, Some(50));
        assert_eq!(config.tool_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.max_output_len, 50000);
    }

    #[test]
    fn test_tool_context() {
        let ctx = AgentConfig::new()
            .with_working_dir(PathBuf::from("/tmp/work"))
            .with_max_output_len(10)
            .with_command_timeout(5)
            .tool_context();

        assert_eq!(ctx.working_dir, PathBuf::from("/tmp/work"));
        assert_eq!(ctx.max_output_len, 10);
        assert_eq!(ctx.command_timeout_secs, 5);
    }
}
