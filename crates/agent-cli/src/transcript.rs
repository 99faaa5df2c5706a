//! Transcript writer for saving agent runs to a file
//!
//! Markdown when the path ends in `.md`, plain text otherwise. Nothing touches
//! the disk until [`Transcript::save`].

use std::path::{Path, PathBuf};

use agent_core::{Decision, Message, ToolInvocation, ToolResult, ToolSpec};
use anyhow::{Context, Result};

use crate::summary;

const RULE_WIDTH: usize = 60;

#[derive(Debug, Clone)]
pub struct Transcript {
    path: PathBuf,
    markdown: bool,
    lines: Vec<String>,
}

impl Transcript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let markdown = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("md"))
            .unwrap_or(false);
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        let lines = if markdown {
            vec![
                "# Agent Transcript".to_string(),
                format!("*Generated: {}*", timestamp),
                String::new(),
            ]
        } else {
            vec![
                "AGENT TRANSCRIPT".to_string(),
                format!("Generated: {}", timestamp),
                "=".repeat(RULE_WIDTH),
                String::new(),
            ]
        };

        Self {
            path,
            markdown,
            lines,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_task(&mut self, task: &str) {
        self.section("Task", task, None);
    }

    pub fn write_request(&mut self, history: &[Message], tools: &[ToolSpec]) {
        let body = summary::pretty(&summary::request_summary(history, tools));
        self.section("LLM Request", &body, Some("json"));
    }

    pub fn write_response(&mut self, decision: &Decision) {
        let body = summary::pretty(&summary::response_summary(decision));
        self.section("LLM Response", &body, Some("json"));
    }

    pub fn write_tool_call(&mut self, invocation: &ToolInvocation) {
        let params = summary::parameter_lines(invocation);
        if self.markdown {
            self.lines.push("## Tool Call".to_string());
            self.lines.push(String::new());
            self.lines.push(format!("**{}**", invocation.tool_name));
            self.lines.push(String::new());
        } else {
            self.lines.push("TOOL CALL".to_string());
            self.lines.push("-".repeat(RULE_WIDTH));
            self.lines.push(invocation.tool_name.clone());
        }
        self.lines.extend(params);
        self.lines.push(String::new());
    }

    pub fn write_tool_result(&mut self, result: &ToolResult) {
        self.section("Result", &summary::result_text(result), Some(""));
    }

    pub fn write_answer(&mut self, answer: &str) {
        self.section("Answer", answer, None);
    }

    pub fn write_error(&mut self, error: &str) {
        self.section("Error", error, None);
    }

    /// Rendered transcript text
    pub fn render(&self) -> String {
        self.lines.join("\n")
    }

    /// Write the transcript to disk
    pub fn save(&self) -> Result<()> {
        std::fs::write(&self.path, self.render())
            .with_context(|| format!("Failed to write transcript to {}", self.path.display()))
    }

    /// `fence` wraps the body in a code block in Markdown mode
    fn section(&mut self, title: &str, body: &str, fence: Option<&str>) {
        if self.markdown {
            self.lines.push(format!("## {}", title));
            self.lines.push(String::new());
            match fence {
                Some(lang) => {
                    self.lines.push(format!("```{}", lang));
                    self.lines.push(body.to_string());
                    self.lines.push("```".to_string());
                }
                None => self.lines.push(body.to_string()),
            }
        } else {
            self.lines.push(title.to_uppercase());
            self.lines.push("-".repeat(RULE_WIDTH));
            self.lines.push(body.to_string());
        }
        self.lines.push(String::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::ToolErrorKind;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_markdown_transcript() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.MD");
        let mut transcript = Transcript::new(&path);
        assert!(transcript.markdown);

        transcript.write_task("Create hello.py");
        transcript.write_response(&Decision::final_answer("Done."));
        transcript.write_tool_call(&ToolInvocation::new(
            "c1",
            "write_file",
            json!({"path": "hello.py"}),
        ));
        transcript.write_tool_result(&ToolResult::success("c1", "Wrote 20 bytes to hello.py"));
        transcript.write_answer("Done.");
        transcript.save().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# Agent Transcript\n*Generated: "));
        assert!(text.contains("## Task\n\nCreate hello.py\n"));
        assert!(text.contains("## LLM Response\n\n```json\n{"));
        assert!(text.contains("**write_file**\n\npath: \"hello.py\""));
        assert!(text.contains("## Result\n\n```\nWrote 20 bytes to hello.py\n```"));
        assert!(text.contains("## Answer\n\nDone."));
    }

    #[test]
    fn test_plain_transcript() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.txt");
        let mut transcript = Transcript::new(&path);
        assert!(!transcript.markdown);

        transcript.write_task("task");
        transcript.write_tool_result(&ToolResult::failure(
            "c1",
            ToolErrorKind::ExecutionFailure,
            "exit code: 1",
        ));
        transcript.write_error("provider error: boom");
        transcript.save().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let rule = "-".repeat(60);
        assert!(text.starts_with("AGENT TRANSCRIPT\nGenerated: "));
        assert!(text.contains(&"=".repeat(60)));
        assert!(text.contains(&format!("TASK\n{}\ntask\n", rule)));
        assert!(text.contains(&format!("RESULT\n{}\nError: exit code: 1\n", rule)));
        assert!(text.contains(&format!("ERROR\n{}\nprovider error: boom", rule)));
    }

    #[test]
    fn test_save_to_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let transcript = Transcript::new(temp_dir.path().join("missing/run.md"));
        assert!(transcript.save().is_err());
    }
}
