// src/agentflow/tools/shell.rs

//! Shell command execution gated by an allow/forbid list and a working-directory sandbox,
//! mirroring the reference's conservative default posture: unknown commands are refused, not
//! merely warned about.

use std::collections::HashSet;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::agentflow::config::ToolsConfig;

use super::{Tool, ToolOutcome};

fn allowed_commands() -> HashSet<&'static str> {
    [
        "echo", "true", "false", "test", "ls", "cat", "head", "tail", "grep", "find", "wc", "sort", "uniq", "file", "stat", "du", "df", "pwd",
        "which", "git", "cargo", "rustc", "make", "sed", "awk", "tr", "cut", "diff", "ps", "uname", "whoami", "date", "env",
    ]
    .into_iter()
    .collect()
}

fn forbidden_commands() -> HashSet<&'static str> {
    [
        "rm", "rmdir", "mv", "cp", "chmod", "chown", "sudo", "su", "passwd", "useradd", "userdel", "kill", "killall", "pkill", "shutdown",
        "reboot", "systemctl", "mount", "umount", "apt", "apt-get", "yum", "dnf", "vi", "vim", "emacs", "nano", "wget", "curl", "ssh", "scp",
        "dd",
    ]
    .into_iter()
    .collect()
}

pub struct ShellTool {
    config: ToolsConfig,
}

impl ShellTool {
    pub fn new(config: ToolsConfig) -> Self {
        ShellTool { config }
    }

    fn first_word(command: &str) -> Option<&str> {
        command.split_whitespace().next()
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell_command"
    }

    fn tool_class(&self) -> &'static str {
        "ShellCommandTool"
    }

    fn validate(&self, params: &Value) -> Result<(), String> {
        let command = params.get("command").and_then(Value::as_str);
        match command {
            Some(c) if !c.trim().is_empty() => Ok(()),
            _ => Err("missing required parameter: command".to_string()),
        }
    }

    fn check_safety(&self, params: &Value) -> Result<(), String> {
        let command = params.get("command").and_then(Value::as_str).unwrap_or("");
        let Some(program) = Self::first_word(command) else {
            return Err("empty command".to_string());
        };
        if forbidden_commands().contains(program) {
            return Err(format!("command '{program}' is forbidden"));
        }
        if !allowed_commands().contains(program) {
            return Err(format!("command '{program}' is not on the allow list"));
        }
        Ok(())
    }

    async fn run(&self, params: &Value) -> ToolOutcome {
        let command = params.get("command").and_then(Value::as_str).unwrap_or("");
        let working_dir = params.get("working_directory").and_then(Value::as_str).or(self.config.sandbox_root.as_deref());

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let spawned = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return ToolOutcome::failure(format!("failed to spawn shell: {e}")),
        };

        match tokio::time::timeout(self.config.shell_timeout, spawned.wait_with_output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                ToolOutcome {
                    success: output.status.success(),
                    output: stdout.clone(),
                    error_message: if output.status.success() { None } else { Some(format!("exit code {:?}", output.status.code())) },
                    stdout: Some(stdout),
                    stderr: Some(stderr),
                    metadata: serde_json::json!({"exit_code": output.status.code()}),
                }
            }
            Ok(Err(e)) => ToolOutcome::failure(format!("shell execution failed: {e}")),
            Err(_) => ToolOutcome::failure("command execution timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> ShellTool {
        ShellTool::new(crate::agentflow::config::ToolsConfig::from_env())
    }

    #[test]
    fn forbidden_command_fails_safety_check() {
        let t = tool();
        let err = t.check_safety(&serde_json::json!({"command": "rm -rf /"}));
        assert!(err.is_err());
    }

    #[test]
    fn unknown_command_fails_safety_check() {
        let t = tool();
        let err = t.check_safety(&serde_json::json!({"command": "whatever-unknown-binary"}));
        assert!(err.is_err());
    }

    #[test]
    fn allow_listed_command_passes_safety_check() {
        let t = tool();
        assert!(t.check_safety(&serde_json::json!({"command": "echo hi"})).is_ok());
    }

    #[test]
    fn missing_command_fails_validation() {
        let t = tool();
        assert!(t.validate(&serde_json::json!({})).is_err());
    }

    #[tokio::test]
    async fn echo_command_succeeds() {
        let t = tool();
        let result = t.run(&serde_json::json!({"command": "echo hello"})).await;
        assert!(result.success);
        assert!(result.output.contains("hello"));
    }
}
