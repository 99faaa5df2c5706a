//! Agent loop implementation

use std::collections::HashSet;
use std::sync::Arc;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::observer::{AgentObserver, NoopObserver};
use super::state::{AgentConfig, AgentRun};
use crate::error::{AgentError, ExecutionError, HistoryError, ProviderError};
use crate::message::{Decision, History, ToolErrorKind, ToolInvocation, ToolResult};
use crate::provider::Provider;
use crate::tools::registry::ToolRegistry;
use crate::tools::router::ToolRouter;
use crate::tools::{ToolContext, ToolSpec};

/// The agent loop orchestrator
///
/// Holds no per-run state, so one loop can serve several runs; each run owns
/// its own [`History`].
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    router: ToolRouter,
    specs: Vec<ToolSpec>,
    config: AgentConfig,
}

/// Why a run stopped early; the history is attached by the caller
enum Abort {
    Provider(ProviderError),
    Execution(ExecutionError),
}

impl From<ProviderError> for Abort {
    fn from(err: ProviderError) -> Self {
        Abort::Provider(err)
    }
}

impl From<ExecutionError> for Abort {
    fn from(err: ExecutionError) -> Self {
        Abort::Execution(err)
    }
}

impl From<HistoryError> for Abort {
    fn from(err: HistoryError) -> Self {
        Abort::Execution(err.into())
    }
}

impl AgentLoop {
    /// Create a new agent loop
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        let specs = registry.specs();
        let router = ToolRouter::new(registry).with_timeout(config.tool_timeout);

        Self {
            provider,
            router,
            specs,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Tool catalogue advertised to the provider, in registration order
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Run the agent with a task and return the final answer
    pub async fn run(&self, task: &str) -> Result<String, AgentError> {
        self.run_with_cancel(task, &CancellationToken::new()).await
    }

    /// Like [`AgentLoop::run`], stopping early once `cancel` fires
    pub async fn run_with_cancel(
        &self,
        task: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let mut observer = NoopObserver;
        self.run_detailed(task, cancel, &mut observer)
            .await
            .map(|run| run.answer)
    }

    /// Run to completion, reporting every step to `observer`
    #[instrument(skip_all, fields(provider = %self.provider.name(), task_len = task.len()))]
    pub async fn run_detailed(
        &self,
        task: &str,
        cancel: &CancellationToken,
        observer: &mut dyn AgentObserver,
    ) -> Result<AgentRun, AgentError> {
        info!(
            max_turns = ?self.config.max_turns,
            tools = self.specs.len(),
            "Starting agent loop"
        );
        observer.on_task(task);

        let mut history = History::new();
        history.push_user(task);

        let mut turns = 0;
        let outcome = self
            .drive(&mut history, &mut turns, cancel, observer)
            .await;

        match outcome {
            Ok(answer) => {
                info!(turns, messages = history.len(), "Agent completed");
                observer.on_answer(&answer);
                Ok(AgentRun {
                    answer,
                    history,
                    turns,
                })
            }
            Err(abort) => {
                let err = match abort {
                    Abort::Provider(source) => AgentError::Provider { source, history },
                    Abort::Execution(source) => AgentError::Execution { source, history },
                };
                warn!(turns, error = %err, "Agent run failed");
                observer.on_error(&err);
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        history: &mut History,
        turns: &mut usize,
        cancel: &CancellationToken,
        observer: &mut dyn AgentObserver,
    ) -> Result<String, Abort> {
        let ctx = self.config.tool_context();

        loop {
            if cancel.is_cancelled() {
                return Err(ExecutionError::Cancelled.into());
            }
            if let Some(max) = self.config.max_turns {
                if *turns >= max {
                    return Err(ExecutionError::MaxTurnsExceeded(max).into());
                }
            }

            *turns += 1;
            debug!(turn = *turns, messages = history.len(), "Requesting decision");
            observer.on_request(*turns, history.messages(), &self.specs);

            let decision = self.decide(history, cancel).await?;
            observer.on_decision(*turns, &decision);

            match decision {
                Decision::Final(answer) => {
                    debug!(turn = *turns, answer_len = answer.len(), "Received final answer");
                    history.push_assistant(answer.clone());
                    return Ok(answer);
                }
                Decision::ActionBatch(batch) => {
                    if batch.invocations.is_empty() {
                        return Err(ProviderError::MalformedDecision(
                            "action batch contains no invocations".to_string(),
                        )
                        .into());
                    }

                    let invocations = assign_ids(history, batch.invocations);
                    debug!(turn = *turns, count = invocations.len(), "Executing action batch");
                    history.push_action_batch(
                        batch.preamble.unwrap_or_default(),
                        invocations.clone(),
                    )?;

                    self.execute_batch(&invocations, history, &ctx, cancel, observer)
                        .await?;
                }
            }
        }
    }

    /// One provider call, bounded by the provider timeout and the cancel signal
    async fn decide(
        &self,
        history: &History,
        cancel: &CancellationToken,
    ) -> Result<Decision, Abort> {
        let call = self.provider.decide(history.messages(), &self.specs);
        let bounded = async {
            match self.config.provider_timeout {
                Some(limit) => match timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(limit)),
                },
                None => call.await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(ExecutionError::Cancelled.into()),
            result = bounded => result.map_err(|e| {
                warn!(error = %e, "Provider call failed");
                e.into()
            }),
        }
    }

    /// Execute a batch in order, appending one result per invocation
    ///
    /// Cancellation is only checked between tools. Once it fires, the rest of the
    /// batch is answered with failures so every invocation keeps exactly one result.
    async fn execute_batch(
        &self,
        invocations: &[ToolInvocation],
        history: &mut History,
        ctx: &ToolContext,
        cancel: &CancellationToken,
        observer: &mut dyn AgentObserver,
    ) -> Result<(), Abort> {
        for (idx, invocation) in invocations.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(skipped = invocations.len() - idx, "Run cancelled mid-batch");
                for skipped in &invocations[idx..] {
                    let result = ToolResult::failure(
                        &skipped.id,
                        ToolErrorKind::ExecutionFailure,
                        "cancelled before execution",
                    );
                    observer.on_tool_result(skipped, &result);
                    history.push_tool_result(result)?;
                }
                return Err(ExecutionError::Cancelled.into());
            }

            observer.on_tool_call(invocation);
            let result = self.router.route(invocation, ctx).await;
            observer.on_tool_result(invocation, &result);
            history.push_tool_result(result)?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for AgentLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentLoop")
            .field("provider", &self.provider.name())
            .field("tools", &self.specs.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Replace empty or reused invocation ids with fresh ones
fn assign_ids(history: &History, invocations: Vec<ToolInvocation>) -> Vec<ToolInvocation> {
    let mut seen: HashSet<String> = HashSet::new();

    invocations
        .into_iter()
        .map(|mut inv| {
            if inv.id.is_empty()
                || history.contains_invocation(&inv.id)
                || !seen.insert(inv.id.clone())
            {
                let fresh = format!("call_{}", uuid::Uuid::new_v4().simple());
                debug!(original = %inv.id, assigned = %fresh, "Reassigned invocation id");
                seen.insert(fresh.clone());
                inv.id = fresh;
            }
            inv
        })
        .collect()
}
