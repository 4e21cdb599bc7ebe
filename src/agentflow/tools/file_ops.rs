// src/agentflow/tools/file_ops.rs

//! File system operations scoped to an optional sandbox root. Read-family operations
//! (`read_file`, `list_directory`, `get_file_stats`) are always available; write-family
//! operations (`write_file`, `delete_file`, `move_file`) are refused with a typed error unless
//! the operator has explicitly enabled them, since the reference leaves them unimplemented "for
//! safety" rather than guessing an intended behavior.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;

use crate::agentflow::config::ToolsConfig;

use super::{Tool, ToolOutcome};

const READ_OPERATIONS: &[&str] = &["read_file", "list_directory", "get_file_stats", "create_directory"];
const WRITE_OPERATIONS: &[&str] = &["write_file", "delete_file", "move_file"];

pub struct FileOpsTool {
    config: ToolsConfig,
}

impl FileOpsTool {
    pub fn new(config: ToolsConfig) -> Self {
        FileOpsTool { config }
    }

    fn resolve(&self, raw_path: &str) -> Result<PathBuf, String> {
        let path = Path::new(raw_path);
        match &self.config.sandbox_root {
            None => Ok(path.to_path_buf()),
            Some(root) => {
                let joined = Path::new(root).join(path);
                if !joined.starts_with(root) {
                    return Err(format!("path '{raw_path}' escapes the sandbox root"));
                }
                Ok(joined)
            }
        }
    }
}

#[async_trait]
impl Tool for FileOpsTool {
    fn name(&self) -> &str {
        "file_operations"
    }

    fn tool_class(&self) -> &'static str {
        "FileOperationsTool"
    }

    fn validate(&self, params: &Value) -> Result<(), String> {
        let operation = params.get("operation").and_then(Value::as_str).ok_or("missing required parameter: operation")?;
        if !READ_OPERATIONS.contains(&operation) && !WRITE_OPERATIONS.contains(&operation) {
            return Err(format!("unknown file operation: {operation}"));
        }
        if operation != "list_directory" && params.get("path").and_then(Value::as_str).is_none() {
            return Err("missing required parameter: path".to_string());
        }
        Ok(())
    }

    fn check_safety(&self, params: &Value) -> Result<(), String> {
        let operation = params.get("operation").and_then(Value::as_str).unwrap_or("");
        if WRITE_OPERATIONS.contains(&operation) && !self.config.allow_destructive_file_ops {
            return Err(format!("'{operation}' is disabled; set AGENTFLOW_ALLOW_DESTRUCTIVE_FILE_OPS=true to enable it"));
        }
        if let Some(path) = params.get("path").and_then(Value::as_str) {
            if let Err(e) = self.resolve(path) {
                return Err(e);
            }
        }
        Ok(())
    }

    async fn run(&self, params: &Value) -> ToolOutcome {
        let operation = params.get("operation").and_then(Value::as_str).unwrap_or("");
        match operation {
            "read_file" => self.read_file(params).await,
            "list_directory" => self.list_directory(params).await,
            "get_file_stats" => self.get_file_stats(params).await,
            "create_directory" => self.create_directory(params).await,
            "write_file" => self.write_file(params).await,
            "delete_file" => self.delete_file(params).await,
            "move_file" => self.move_file(params).await,
            other => ToolOutcome::failure(format!("unhandled operation: {other}")),
        }
    }
}

impl FileOpsTool {
    async fn read_file(&self, params: &Value) -> ToolOutcome {
        let Some(path) = params.get("path").and_then(Value::as_str) else {
            return ToolOutcome::failure("missing path");
        };
        let Ok(resolved) = self.resolve(path) else {
            return ToolOutcome::failure("path escapes sandbox");
        };
        match fs::read_to_string(&resolved).await {
            Ok(content) => ToolOutcome::success(content),
            Err(e) => ToolOutcome::failure(format!("failed to read {path}: {e}")),
        }
    }

    async fn list_directory(&self, params: &Value) -> ToolOutcome {
        let path = params.get("path").and_then(Value::as_str).unwrap_or(".");
        let Ok(resolved) = self.resolve(path) else {
            return ToolOutcome::failure("path escapes sandbox");
        };
        let mut entries = match fs::read_dir(&resolved).await {
            Ok(e) => e,
            Err(e) => return ToolOutcome::failure(format!("failed to list {path}: {e}")),
        };
        let mut names = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => names.push(entry.file_name().to_string_lossy().to_string()),
                Ok(None) => break,
                Err(e) => return ToolOutcome::failure(format!("error reading directory entry: {e}")),
            }
        }
        names.sort();
        ToolOutcome { success: true, output: names.join("\n"), metadata: serde_json::json!({"entry_count": names.len()}), ..Default::default() }
    }

    async fn get_file_stats(&self, params: &Value) -> ToolOutcome {
        let Some(path) = params.get("path").and_then(Value::as_str) else {
            return ToolOutcome::failure("missing path");
        };
        let Ok(resolved) = self.resolve(path) else {
            return ToolOutcome::failure("path escapes sandbox");
        };
        match fs::metadata(&resolved).await {
            Ok(meta) => ToolOutcome {
                success: true,
                output: format!("{} bytes", meta.len()),
                metadata: serde_json::json!({"size_bytes": meta.len(), "is_dir": meta.is_dir(), "is_file": meta.is_file()}),
                ..Default::default()
            },
            Err(e) => ToolOutcome::failure(format!("failed to stat {path}: {e}")),
        }
    }

    async fn create_directory(&self, params: &Value) -> ToolOutcome {
        let Some(path) = params.get("path").and_then(Value::as_str) else {
            return ToolOutcome::failure("missing path");
        };
        let Ok(resolved) = self.resolve(path) else {
            return ToolOutcome::failure("path escapes sandbox");
        };
        match fs::create_dir_all(&resolved).await {
            Ok(()) => ToolOutcome::success(format!("created {path}")),
            Err(e) => ToolOutcome::failure(format!("failed to create {path}: {e}")),
        }
    }

    async fn write_file(&self, params: &Value) -> ToolOutcome {
        let (Some(path), Some(content)) = (params.get("path").and_then(Value::as_str), params.get("content").and_then(Value::as_str)) else {
            return ToolOutcome::failure("missing path or content");
        };
        let Ok(resolved) = self.resolve(path) else {
            return ToolOutcome::failure("path escapes sandbox");
        };
        match fs::write(&resolved, content).await {
            Ok(()) => ToolOutcome::success(format!("wrote {} bytes to {path}", content.len())),
            Err(e) => ToolOutcome::failure(format!("failed to write {path}: {e}")),
        }
    }

    async fn delete_file(&self, params: &Value) -> ToolOutcome {
        let Some(path) = params.get("path").and_then(Value::as_str) else {
            return ToolOutcome::failure("missing path");
        };
        let Ok(resolved) = self.resolve(path) else {
            return ToolOutcome::failure("path escapes sandbox");
        };
        match fs::remove_file(&resolved).await {
            Ok(()) => ToolOutcome::success(format!("deleted {path}")),
            Err(e) => ToolOutcome::failure(format!("failed to delete {path}: {e}")),
        }
    }

    async fn move_file(&self, params: &Value) -> ToolOutcome {
        let (Some(from), Some(to)) = (params.get("path").and_then(Value::as_str), params.get("destination").and_then(Value::as_str)) else {
            return ToolOutcome::failure("missing path or destination");
        };
        let (Ok(resolved_from), Ok(resolved_to)) = (self.resolve(from), self.resolve(to)) else {
            return ToolOutcome::failure("path escapes sandbox");
        };
        match fs::rename(&resolved_from, &resolved_to).await {
            Ok(()) => ToolOutcome::success(format!("moved {from} to {to}")),
            Err(e) => ToolOutcome::failure(format!("failed to move {from} to {to}: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> FileOpsTool {
        FileOpsTool::new(ToolsConfig { allow_destructive_file_ops: false, shell_timeout: std::time::Duration::from_secs(5), sandbox_root: None })
    }

    #[test]
    fn write_file_is_refused_without_the_operator_flag() {
        let t = tool();
        let err = t.check_safety(&serde_json::json!({"operation": "write_file", "path": "/tmp/x"}));
        assert!(err.is_err());
    }

    #[test]
    fn read_file_requires_no_special_flag() {
        let t = tool();
        assert!(t.check_safety(&serde_json::json!({"operation": "read_file", "path": "/tmp/x"})).is_ok());
    }

    #[test]
    fn unknown_operation_fails_validation() {
        let t = tool();
        assert!(t.validate(&serde_json::json!({"operation": "format_disk", "path": "/tmp/x"})).is_err());
    }

    #[tokio::test]
    async fn write_then_read_round_trips_when_enabled() {
        let dir = std::env::temp_dir().join(format!("agentflow-test-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let t = FileOpsTool::new(ToolsConfig { allow_destructive_file_ops: true, shell_timeout: std::time::Duration::from_secs(5), sandbox_root: None });
        let file_path = dir.join("note.txt").to_string_lossy().to_string();

        let write_result = t.run(&serde_json::json!({"operation": "write_file", "path": file_path, "content": "hello"})).await;
        assert!(write_result.success);

        let read_result = t.run(&serde_json::json!({"operation": "read_file", "path": file_path})).await;
        assert_eq!(read_result.output, "hello");
    }
}
