//! File read tool

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use tokio::fs;

use crate::tools::{required_str, ParameterProperty, ParameterSchema, Tool, ToolContext, ToolOutput};

/// Tool for reading file contents
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given path."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required("path", ParameterProperty::string("The path to the file to read"))
            .with_property(
                "offset",
                ParameterProperty::integer("Line number to start reading from (1-indexed, default: 1)"),
            )
            .with_property(
                "limit",
                ParameterProperty::integer("Maximum number of lines to read (default: unlimited)"),
            )
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let path_str = required_str(args, "path")?;

        let offset = args
            .get("offset")
            .and_then(|v| v.as_u64())
            .map(|v| v.saturating_sub(1) as usize)
            .unwrap_or(0);

        let limit = args.get("limit").and_then(|v| v.as_u64()).map(|v| v as usize);

        let path = ctx.resolve(path_str);

        let metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(ToolOutput::error(format!("File '{}' does not exist", path_str)));
            }
            Err(e) => {
                return Ok(ToolOutput::error(format!("Error reading file: {}", e)));
            }
        };

        if !metadata.is_file() {
            return Ok(ToolOutput::error(format!("'{}' is not a file", path_str)));
        }

        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Ok(ToolOutput::error(format!(
                    "Permission denied reading '{}'",
                    path_str
                )));
            }
            Err(e) => {
                return Ok(ToolOutput::error(format!("Error reading file: {}", e)));
            }
        };

        if offset == 0 && limit.is_none() {
            return Ok(ToolOutput::success(ctx.truncate(content)));
        }

        let total_lines = content.lines().count();
        let selected: Vec<&str> = content
            .lines()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect();

        if selected.is_empty() {
            return Ok(ToolOutput::success(format!(
                "(offset {} exceeds file length of {} lines)",
                offset + 1,
                total_lines
            )));
        }

        Ok(ToolOutput::success(ctx.truncate(selected.join("\n"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[tokio::test]
    async fn test_read_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "line 1").unwrap();
        writeln!(temp, "line 2").unwrap();

        let tool = ReadFileTool;
        let ctx = ToolContext::default();
        let args = json!({ "path": temp.path().to_str().unwrap() });

        let result = tool.execute(&args, &ctx).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "line 1\nline 2\n");
    }

    #[tokio::test]
    async fn test_read_relative_to_working_dir() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "hello").unwrap();

        let tool = ReadFileTool;
        let ctx = ToolContext::new(temp_dir.path().to_path_buf());
        let result = tool.execute(&json!({ "path": "notes.txt" }), &ctx).await.unwrap();

        assert!(result.success);
        assert_eq!(result.output, "hello");
    }

    #[tokio::test]
    async fn test_read_file_with_offset_limit() {
        let mut temp = NamedTempFile::new().unwrap();
        for i in 1..=10 {
            writeln!(temp, "line {}", i).unwrap();
        }

        let tool = ReadFileTool;
        let ctx = ToolContext::default();
        let args = json!({
            "path": temp.path().to_str().unwrap(),
            "offset": 3,
            "limit": 2
        });

        let result = tool.execute(&args, &ctx).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "line 3\nline 4");
    }

    #[tokio::test]
    async fn test_read_nonexistent_file() {
        let tool = ReadFileTool;
        let ctx = ToolContext::default();
        let args = json!({ "path": "/nonexistent/path/file.txt" });

        let result = tool.execute(&args, &ctx).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_read_directory() {
        let temp_dir = TempDir::new().unwrap();
        let tool = ReadFileTool;
        let ctx = ToolContext::default();
        let args = json!({ "path": temp_dir.path().to_str().unwrap() });

        let result = tool.execute(&args, &ctx).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("is not a file"));
    }
}
