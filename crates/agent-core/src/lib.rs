//! agent-core: the task-execution loop behind minagent
//!
//! Provides:
//! - Conversation data model (append-only history, decisions, tool results)
//! - Provider abstraction with Anthropic and Ollama backends
//! - Tool registry, schema validation and dispatch
//! - The agent loop itself
//! - Configuration loading (minagent.toml)

pub mod agent;
pub mod config;
pub mod error;
pub mod message;
pub mod provider;
pub mod tools;

pub use agent::{AgentConfig, AgentLoop, AgentObserver, AgentRun, NoopObserver};
pub use config::{Config, ProviderConfig, ProviderKind};
pub use error::{AgentError, ExecutionError, HistoryError, ProviderError};
pub use message::{
    ActionBatch, Decision, History, Message, Role, ToolError, ToolErrorKind, ToolInvocation,
    ToolResult,
};
pub use provider::{AnthropicProvider, OllamaProvider, Provider};
pub use tools::registry::ToolRegistry;
pub use tools::router::ToolRouter;
pub use tools::{Tool, ToolContext, ToolOutput, ToolSpec};
pub use tokio_util::sync::CancellationToken;
