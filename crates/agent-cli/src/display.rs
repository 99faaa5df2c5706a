//! Terminal rendering of an agent run
//!
//! Colour scheme:
//! - Blue: the task
//! - Yellow / magenta: provider requests and responses
//! - Cyan: tool calls
//! - Green: tool results (red when they failed)
//! - Bold: the final answer

use agent_core::{Decision, Message, ToolInvocation, ToolResult, ToolSpec};

use crate::summary;

// ANSI colors
const BLUE: &str = "\x1b[94m";
const YELLOW: &str = "\x1b[93m";
const MAGENTA: &str = "\x1b[95m";
const CYAN: &str = "\x1b[96m";
const GREEN: &str = "\x1b[92m";
const RED: &str = "\x1b[91m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Prints run events to stdout; errors always go to stderr
#[derive(Debug, Clone)]
pub struct Display {
    quiet: bool,
}

impl Display {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn show_task(&self, task: &str) {
        self.print(panel("Task", BLUE, task));
    }

    pub fn show_request(&self, turn: usize, history: &[Message], tools: &[ToolSpec]) {
        let body = summary::pretty(&summary::request_summary(history, tools));
        self.print(panel(&format!("LLM Request (turn {})", turn), YELLOW, &body));
    }

    pub fn show_response(&self, decision: &Decision) {
        let body = summary::pretty(&summary::response_summary(decision));
        self.print(panel("LLM Response", MAGENTA, &body));
    }

    pub fn show_tool_call(&self, invocation: &ToolInvocation) {
        self.print(tool_call_panel(invocation));
    }

    pub fn show_tool_result(&self, result: &ToolResult) {
        let color = if result.success { GREEN } else { RED };
        self.print(panel("Result", color, &summary::result_text(result)));
    }

    pub fn show_answer(&self, answer: &str) {
        self.print(panel("Answer", BOLD, answer));
    }

    pub fn show_error(&self, error: &str) {
        eprintln!("{}", panel("Error", RED, error));
    }

    fn print(&self, text: String) {
        if !self.quiet {
            println!("{}", text);
        }
    }
}

fn tool_call_panel(invocation: &ToolInvocation) -> String {
    let mut body = format!("{}{}{}", BOLD, invocation.tool_name, RESET);
    for line in summary::parameter_lines(invocation) {
        body.push('\n');
        body.push_str(&line);
    }
    panel("Tool Call", CYAN, &body)
}

/// A titled block: coloured header, body, blank line
fn panel(title: &str, color: &str, body: &str) -> String {
    format!(
        "{}── {} ──{}\n{}\n{}{}{}\n",
        color,
        title,
        RESET,
        body,
        DIM,
        "─".repeat(title.chars().count() + 6),
        RESET
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_panel_layout() {
        let out = panel("Task", BLUE, "do it");
        assert!(out.starts_with(&format!("{}── Task ──{}", BLUE, RESET)));
        assert!(out.contains("\ndo it\n"));
        assert!(out.contains(&"─".repeat(10)));
    }

    #[test]
    fn test_tool_call_panel() {
        let inv = ToolInvocation::new("c1", "shell", json!({"command": "ls -la"}));
        let out = tool_call_panel(&inv);
        assert!(out.contains("Tool Call"));
        assert!(out.contains("shell"));
        assert!(out.contains("command: \"ls -la\""));
    }
}
