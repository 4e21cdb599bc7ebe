// src/agentflow/tools/mod.rs

//! The tool registry: uniform, sandboxed invocation of external effects (shell, file I/O,
//! outbound HTTP) with parameter validation, safety checks, and execution logging, mirroring
//! the agent runtime's own validate/execute/persist shape.

pub mod file_ops;
pub mod http_tool;
pub mod shell;

use std::time::Instant;

use async_trait::async_trait;
use log::warn;
use serde_json::Value;
use uuid::Uuid;

use crate::agentflow::persistence::store::ToolExecutionRecord;
use crate::agentflow::runtime::Runtime;

#[derive(Debug, Clone, Default)]
pub struct ToolOutcome {
    pub success: bool,
    pub output: String,
    pub error_message: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub metadata: Value,
}

impl ToolOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        ToolOutcome { success: false, error_message: Some(message.into()), ..Default::default() }
    }

    pub fn success(output: impl Into<String>) -> Self {
        ToolOutcome { success: true, output: output.into(), ..Default::default() }
    }
}

/// One external-effect capability. `validate` rejects malformed parameters before anything
/// runs; `check_safety` rejects well-formed but disallowed requests (forbidden command,
/// disallowed path, destructive op without the operator flag).
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn tool_class(&self) -> &'static str;
    fn validate(&self, params: &Value) -> Result<(), String>;
    fn check_safety(&self, params: &Value) -> Result<(), String>;
    async fn run(&self, params: &Value) -> ToolOutcome;
}

/// Runs `tool` through validate -> safety -> execute -> persist, matching the base tool's own
/// lifecycle. Persistence failures are logged and never override the tool's own result, per the
/// "persistence write errors must not block the primary execution path" policy.
pub async fn execute_and_log(tool: &dyn Tool, runtime: &Runtime, agent_id: Uuid, thought_tree_id: Uuid, params: Value) -> ToolOutcome {
    let started = Instant::now();

    let outcome = match tool.validate(&params) {
        Err(e) => ToolOutcome::failure(format!("parameter validation failed: {e}")),
        Ok(()) => match tool.check_safety(&params) {
            Err(e) => ToolOutcome::failure(format!("safety validation failed: {e}")),
            Ok(()) => tool.run(&params).await,
        },
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    let record = ToolExecutionRecord {
        id: Uuid::new_v4(),
        agent_id,
        thought_tree_id,
        tool_name: tool.name().to_string(),
        tool_class: tool.tool_class().to_string(),
        input_params: params,
        output_result: if outcome.success { Some(outcome.output.clone()) } else { outcome.error_message.clone() },
        stdout: outcome.stdout.clone(),
        stderr: outcome.stderr.clone(),
        duration_ms,
    };
    if let Err(e) = runtime.store.insert_tool_execution(&record) {
        warn!("failed to persist tool execution for {}: {e}", tool.name());
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agentflow::tools::shell::ShellTool;

    #[tokio::test]
    async fn execute_and_log_persists_a_record_on_success() {
        let runtime = Runtime::for_testing().unwrap();
        let tool = ShellTool::new(runtime.config.tools.clone());
        let outcome = execute_and_log(&tool, &runtime, Uuid::new_v4(), Uuid::new_v4(), serde_json::json!({"command": "echo hello"})).await;
        assert!(outcome.success);
    }
}
