//! Shell command execution tool

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use crate::tools::{required_str, ParameterProperty, ParameterSchema, Tool, ToolContext, ToolOutput};

/// Tool for executing shell commands
pub struct ShellTool;

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its output. Use for running programs, listing files, etc."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required("command", ParameterProperty::string("The shell command to execute"))
            .with_property(
                "timeout",
                ParameterProperty::integer("Timeout in seconds (default: 30)"),
            )
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let command = required_str(args, "command")?;

        let timeout_secs = args
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(ctx.command_timeout_secs);

        if !ctx.working_dir.exists() {
            return Ok(ToolOutput::error(format!(
                "Working directory does not exist: {}",
                ctx.working_dir.display()
            )));
        }

        let (shell, shell_arg) = if cfg!(target_os = "windows") {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        let mut cmd = Command::new(shell);
        cmd.arg(shell_arg)
            .arg(command)
            .current_dir(&ctx.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = timeout(Duration::from_secs(timeout_secs), cmd.output()).await;

        match result {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);

                let mut combined = String::new();
                combined.push_str(&stdout);
                combined.push_str(&stderr);
                let combined = combined.trim().to_string();
                let combined = if combined.is_empty() {
                    "(no output)".to_string()
                } else {
                    ctx.truncate(combined)
                };

                if output.status.success() {
                    Ok(ToolOutput::success(combined))
                } else {
                    let exit_code = output
                        .status
                        .code()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    Ok(ToolOutput::failure(combined, format!("exit code: {}", exit_code)))
                }
            }
            Ok(Err(e)) => Ok(ToolOutput::error(format!("Error executing command: {}", e))),
            Err(_) => Ok(ToolOutput::error(format!(
                "Command timed out after {} seconds",
                timeout_secs
            ))),
        }
    }
}
