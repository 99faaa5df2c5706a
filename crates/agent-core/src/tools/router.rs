//! Tool routing and dispatch

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, instrument, warn};

use super::registry::ToolRegistry;
use super::{ToolContext, ToolOutput};
use crate::message::{ToolErrorKind, ToolInvocation, ToolResult};

/// Router for dispatching tool invocations
///
/// Every call to [`ToolRouter::route`] yields exactly one [`ToolResult`]; nothing
/// a tool does can turn into a loop-fatal error.
pub struct ToolRouter {
    registry: Arc<ToolRegistry>,
    timeout: Option<Duration>,
}

impl ToolRouter {
    /// Create a new router over the given registry
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    /// Bound every tool execution by `limit`
    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    /// Validate and execute a single invocation
    #[instrument(skip(self, ctx), fields(tool = %invocation.tool_name, invocation_id = %invocation.id))]
    pub async fn route(&self, invocation: &ToolInvocation, ctx: &ToolContext) -> ToolResult {
        let tool = match self.registry.validate(invocation) {
            Ok(t) => t,
            Err(violation) => {
                warn!(error = %violation, "Rejected tool invocation");
                return ToolResult::failure(
                    &invocation.id,
                    ToolErrorKind::SchemaViolation,
                    violation.to_string(),
                );
            }
        };

        info!("Executing tool");
        let call = tool.execute(&invocation.parameters, ctx);
        let outcome = match self.timeout {
            Some(limit) => match timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(timeout_secs = limit.as_secs_f64(), "Tool execution timed out");
                    return ToolResult::failure(
                        &invocation.id,
                        ToolErrorKind::Timeout,
                        format!("Tool timed out after {} seconds", limit.as_secs_f64()),
                    );
                }
            },
            None => call.await,
        };

        match outcome {
            Ok(output) => {
                if output.success {
                    info!(output_len = output.output.len(), "Tool executed successfully");
                } else {
                    warn!(error = ?output.error, "Tool execution failed");
                }
                into_result(&invocation.id, output)
            }
            Err(e) => {
                warn!(error = %e, "Tool execution error");
                ToolResult::failure(&invocation.id, ToolErrorKind::ExecutionFailure, e.to_string())
            }
        }
    }
}

fn into_result(invocation_id: &str, output: ToolOutput) -> ToolResult {
    if output.success {
        return ToolResult::success(invocation_id, output.output);
    }
    let message = output
        .error
        .unwrap_or_else(|| "tool reported failure".to_string());
    ToolResult::failure(invocation_id, ToolErrorKind::ExecutionFailure, message)
        .with_output(output.output)
}

impl std::fmt::Debug for ToolRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRouter")
            .field("registry", &self.registry)
            .field("timeout", &self.timeout)
            .finish()
    }
}
