//! File write tool

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::tools::{required_str, ParameterProperty, ParameterSchema, Tool, ToolContext, ToolOutput};

/// Tool for writing file contents
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file at the given path. Creates the file if it doesn't exist, or overwrites if it does."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required("path", ParameterProperty::string("The path to the file to write"))
            .with_required("content", ParameterProperty::string("The content to write to the file"))
            .with_property(
                "append",
                ParameterProperty::boolean("Append to file instead of overwriting (default: false)"),
            )
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let path_str = required_str(args, "path")?;
        let content = required_str(args, "content")?;
        let append = args.get("append").and_then(|v| v.as_bool()).unwrap_or(false);

        let path = ctx.resolve(path_str);

        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                return Ok(ToolOutput::error(format!("Failed to create directories: {}", e)));
            }
        }

        let result = if append {
            append_to(&path, content).await
        } else {
            fs::write(&path, content).await
        };

        match result {
            Ok(()) => {
                let verb = if append { "Appended" } else { "Wrote" };
                Ok(ToolOutput::success(format!(
                    "{} {} bytes to {}",
                    verb,
                    content.len(),
                    path_str
                )))
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Ok(ToolOutput::error(format!(
                "Permission denied writing to '{}'",
                path_str
            ))),
            Err(e) => Ok(ToolOutput::error(format!("Error writing file: {}", e))),
        }
    }
}

async fn append_to(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_file() {
        let temp_dir = TempDir::new().unwrap();

        let tool = WriteFileTool;
        let ctx = ToolContext::new(temp_dir.path().to_path_buf());
        let args = json!({
            "path": "hello.py",
            "content": "print(\"Hello World\")"
        });

        let result = tool.execute(&args, &ctx).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "Wrote 20 bytes to hello.py");

        let content = fs::read_to_string(temp_dir.path().join("hello.py")).unwrap();
        assert_eq!(content, "print(\"Hello World\")");
    }

    #[tokio::test]
    async fn test_write_file_creates_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("a/b/c/test.txt");

        let tool = WriteFileTool;
        let ctx = ToolContext::new(temp_dir.path().to_path_buf());
        let args = json!({
            "path": file_path.to_str().unwrap(),
            "content": "nested content"
        });

        let result = tool.execute(&args, &ctx).await.unwrap();
        assert!(result.success);
        assert!(file_path.exists());
    }

    #[tokio::test]
    async fn test_write_file_append() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("append.txt");
        fs::write(&file_path, "line1\n").unwrap();

        let tool = WriteFileTool;
        let ctx = ToolContext::new(temp_dir.path().to_path_buf());
        let args = json!({
            "path": "append.txt",
            "content": "line2\n",
            "append": true
        });

        let result = tool.execute(&args, &ctx).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "Appended 6 bytes to append.txt");

        let content = fs::read_to_string(&file_path).unwrap();
        assert_eq!(content, "line1\nline2\n");
    }

    #[tokio::test]
    async fn test_write_into_file_as_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("blocker"), "x").unwrap();

        let tool = WriteFileTool;
        let ctx = ToolContext::new(temp_dir.path().to_path_buf());
        let args = json!({ "path": "blocker/inner.txt", "content": "y" });

        let result = tool.execute(&args, &ctx).await.unwrap();
        assert!(!result.success);
        assert!(result.error.is_some());
    }
}
