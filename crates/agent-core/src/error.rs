//! Error types for the agent loop and its providers
//!
//! Only [`ProviderError`] and [`ExecutionError`] ever abort a run. Tool-level
//! problems are recorded in the conversation as failed [`ToolResult`]s instead.
//!
//! [`ToolResult`]: crate::message::ToolResult

use std::time::Duration;

use thiserror::Error;

use crate::message::History;

/// Failure talking to, or understanding, the reasoning service
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection, DNS or read failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The service rejected our credentials
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Any other non-success HTTP status
    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The call did not complete within the configured bound
    #[error("provider call timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The response could not be turned into a decision
    #[error("malformed decision: {0}")]
    MalformedDecision(String),

    /// The provider could not be constructed from its configuration
    #[error("provider configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Map a reqwest failure, using `limit` to describe timeouts
    pub fn from_reqwest(err: reqwest::Error, limit: Option<Duration>) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(limit.unwrap_or_default())
        } else if err.is_decode() {
            ProviderError::MalformedDecision(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// Violation of the history pairing invariants
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("tool result references unknown invocation '{0}'")]
    UnknownInvocation(String),

    #[error("invocation '{0}' already has a result")]
    AlreadyAnswered(String),

    #[error("duplicate invocation id '{0}'")]
    DuplicateInvocation(String),
}

/// Loop-level failure unrelated to the provider
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("agent reached maximum turns ({0})")]
    MaxTurnsExceeded(usize),

    #[error("run was cancelled")]
    Cancelled,

    #[error("history invariant violated: {0}")]
    History(#[from] HistoryError),
}

/// Error returned from a run, carrying the history accumulated so far
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("provider error: {source}")]
    Provider {
        source: ProviderError,
        history: History,
    },

    #[error("execution error: {source}")]
    Execution {
        source: ExecutionError,
        history: History,
    },
}

impl AgentError {
    /// History as it stood when the run aborted
    pub fn history(&self) -> &History {
        match self {
            AgentError::Provider { history, .. } | AgentError::Execution { history, .. } => history,
        }
    }

    pub fn into_history(self) -> History {
        match self {
            AgentError::Provider { history, .. } | AgentError::Execution { history, .. } => history,
        }
    }

    pub fn is_provider(&self) -> bool {
        matches!(self, AgentError::Provider { .. })
    }

    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            AgentError::Provider { source, .. } => Some(source),
            AgentError::Execution { .. } => None,
        }
    }

    pub fn execution_error(&self) -> Option<&ExecutionError> {
        match self {
            AgentError::Execution { source, .. } => Some(source),
            AgentError::Provider { .. } => None,
        }
    }
}
