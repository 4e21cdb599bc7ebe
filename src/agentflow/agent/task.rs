// src/agentflow/agent/task.rs

//! Task agent: bounded synchronous work against a closed set of task types, each with its own
//! system-prompt persona and a temperature tuned to the task (lower for code/structured
//! output, higher for creative work).

use async_trait::async_trait;
use serde_json::Value;

use crate::agentflow::llm::{call_and_log, CallRequest};
use crate::agentflow::tools::file_ops::FileOpsTool;
use crate::agentflow::tools::http_tool::HttpTool;
use crate::agentflow::tools::shell::ShellTool;
use crate::agentflow::tools::{execute_and_log, Tool};

use super::{AgentExecutionContext, AgentKind, AgentOutcome, AgentSpecialization};

/// The closed set of task types a `TaskAgent` accepts. Unlisted types are rejected at
/// validation time, never silently routed anywhere.
pub const SUPPORTED_TASK_TYPES: &[&str] = &[
    "document_generation",
    "code_synthesis",
    "data_analysis",
    "content_summary",
    "content_transformation",
    "structured_extraction",
    "creative_writing",
    "technical_writing",
    "conversational_response",
    "decomposition_analysis",
    "subtask_execution",
    "tool_invocation",
];

fn build_tool(tool_name: &str, ctx: &AgentExecutionContext) -> Option<Box<dyn Tool>> {
    match tool_name {
        "shell_command" => Some(Box::new(ShellTool::new(ctx.runtime.config.tools.clone()))),
        "file_operations" => Some(Box::new(FileOpsTool::new(ctx.runtime.config.tools.clone()))),
        "http_request" => Some(Box::new(HttpTool::new(ctx.runtime.config.tools.shell_timeout))),
        _ => None,
    }
}

fn default_temperature(task_type: &str) -> f32 {
    match task_type {
        "code_synthesis" | "structured_extraction" | "decomposition_analysis" => 0.3,
        "technical_writing" => 0.4,
        "data_analysis" => 0.5,
        "content_summary" => 0.5,
        "content_transformation" => 0.6,
        "document_generation" | "conversational_response" | "subtask_execution" => 0.7,
        "creative_writing" => 0.8,
        _ => 0.7,
    }
}

fn default_max_tokens(task_type: &str) -> u32 {
    match task_type {
        "content_summary" => 2048,
        "structured_extraction" => 3072,
        "conversational_response" => 800,
        _ => 4096,
    }
}

fn system_prompt_for(task_type: &str) -> &'static str {
    match task_type {
        "document_generation" => {
            "You write high-quality, well-structured documents: business reports, technical \
             specs, academic summaries, and long-form content. Follow the requested format, \
             use a professional tone, and organize content into clear sections."
        }
        "code_synthesis" => {
            "You write clean, efficient, well-documented code. Handle errors explicitly, \
             follow language conventions, and explain non-obvious logic briefly."
        }
        "data_analysis" => {
            "You perform statistical analysis, pattern identification, and insight generation. \
             Provide quantitative findings where possible, state your assumptions, and note \
             confidence levels and limitations."
        }
        "content_summary" => {
            "You distill complex content into clear, concise summaries that preserve key facts \
             and conclusions while cutting everything non-essential."
        }
        "content_transformation" => {
            "You convert content between formats, styles, and audiences while preserving its \
             core meaning and accuracy."
        }
        "structured_extraction" => {
            "You extract structured information from unstructured content and format it exactly \
             to the requested schema. Handle ambiguous cases explicitly rather than guessing \
             silently."
        }
        "creative_writing" => {
            "You write engaging, original narrative content: stories, scripts, and similar. \
             Build a consistent voice and maintain it throughout."
        }
        "technical_writing" => {
            "You write precise technical documentation: specs, guides, API references, and \
             procedures, calibrated to the stated audience skill level."
        }
        "conversational_response" => {
            "You answer direct questions plainly and conversationally, without padding or \
             excessive hedging."
        }
        "decomposition_analysis" => {
            "You decompose a task into an ordered list of subtasks. Respond with a JSON array \
             of objects, each with fields: id, title, description, dependencies (array of ids), \
             estimated_complexity (low|medium|high), required_agent_kinds (array). Respond with \
             nothing but the JSON array."
        }
        "subtask_execution" => {
            "You execute one subtask of a larger decomposed workflow and report your work \
             clearly enough for a synthesis step to combine it with sibling subtasks."
        }
        _ => "You complete the requested task accurately and concisely.",
    }
}

fn user_prompt_for(task_type: &str, description: &str, content: &str, input: &Value) -> String {
    let extra = |key: &str, default: &str| input.get(key).and_then(|v| v.as_str()).unwrap_or(default).to_string();

    match task_type {
        "document_generation" => format!(
            "Task: {description}\n\nContent requirements: {content}\n\nOutput format: {}\n\nGenerate the complete document.",
            extra("output_format", "Professional document with clear sections")
        ),
        "code_synthesis" => format!(
            "Task: {description}\n\nRequirements: {content}\n\nLanguage: {}\n\nProvide complete, working code with documentation.",
            extra("language", "Rust")
        ),
        "data_analysis" => format!(
            "Analysis task: {description}\n\nData/context: {content}\n\nQuestions: {}\n\nProvide findings and recommendations.",
            extra("questions", "Provide key insights and recommendations")
        ),
        "content_summary" => format!(
            "Summary task: {description}\n\nContent: {content}\n\nSummary length: {}\n\nProvide the summary.",
            extra("summary_length", "Medium detail")
        ),
        "content_transformation" => format!(
            "Transformation task: {description}\n\nSource: {content}\n\nTarget format: {}\n\nProvide the transformed content.",
            extra("target_format", "specified in the task description")
        ),
        "structured_extraction" | "decomposition_analysis" => format!(
            "Extraction task: {description}\n\nSource: {content}\n\nOutput schema: {}\n\nProvide the structured output.",
            extra("output_schema", "JSON with relevant fields")
        ),
        "creative_writing" => format!(
            "Creative task: {description}\n\nBrief: {content}\n\nGenre: {}\n\nWrite the content.",
            extra("genre", "general creative writing")
        ),
        "technical_writing" | "subtask_execution" => format!(
            "Technical writing task: {description}\n\nContent: {content}\n\nAudience: {}\n\nWrite the documentation.",
            extra("audience_level", "technical professionals")
        ),
        "conversational_response" => format!("{content}"),
        _ => format!("Task: {description}\n\nContent: {content}"),
    }
}

pub struct TaskAgent;

impl TaskAgent {
    pub fn new() -> Self {
        TaskAgent
    }
}

impl Default for TaskAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentSpecialization for TaskAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Task
    }

    fn implementation_class(&self) -> &'static str {
        "TaskAgent"
    }

    async fn validate_input(&self, input: &Value) -> bool {
        let task_type = match input.get("task_type").and_then(|v| v.as_str()) {
            Some(t) => t,
            None => return false,
        };
        if !SUPPORTED_TASK_TYPES.contains(&task_type) {
            return false;
        }
        if task_type == "tool_invocation" {
            return input.get("tool_name").and_then(|v| v.as_str()).is_some();
        }
        let description = input.get("description").and_then(|v| v.as_str()).unwrap_or("");
        if description.trim().len() < 10 {
            return false;
        }
        let content = input.get("content").and_then(|v| v.as_str()).unwrap_or("");
        !content.trim().is_empty()
    }

    async fn execute(&self, ctx: &AgentExecutionContext, input: Value) -> AgentOutcome {
        let task_type = input.get("task_type").and_then(|v| v.as_str()).unwrap_or("").to_string();

        if task_type == "tool_invocation" {
            let tool_name = input.get("tool_name").and_then(|v| v.as_str()).unwrap_or("");
            let Some(tool) = build_tool(tool_name, ctx) else {
                return AgentOutcome::failed(format!("unknown tool: {tool_name}"));
            };
            let tool_params = input.get("tool_params").cloned().unwrap_or(serde_json::json!({}));
            let outcome = execute_and_log(tool.as_ref(), &ctx.runtime, ctx.agent_id, ctx.thought_tree_id, tool_params).await;
            return if outcome.success {
                AgentOutcome::ok(outcome.output, 0, 0.0).with_metadata(serde_json::json!({"tool_name": tool_name, "tool_metadata": outcome.metadata}))
            } else {
                AgentOutcome::failed(outcome.error_message.unwrap_or_else(|| "tool execution failed".to_string()))
            };
        }
        let description = input.get("description").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let content = input.get("content").and_then(|v| v.as_str()).unwrap_or("").to_string();

        let max_tokens = input
            .get("max_tokens")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
            .unwrap_or_else(|| default_max_tokens(&task_type));
        let temperature = input
            .get("temperature")
            .and_then(|v| v.as_f64())
            .map(|v| v as f32)
            .unwrap_or_else(|| default_temperature(&task_type));

        let mut request = CallRequest::new(system_prompt_for(&task_type), user_prompt_for(&task_type, &description, &content, &input), ctx.llm_model.clone());
        request.max_output_tokens = max_tokens;
        request.temperature = temperature;
        request.thought_tree_id = Some(ctx.thought_tree_id);
        request.agent_id = Some(ctx.agent_id);

        match call_and_log(&ctx.runtime, request, Some(ctx.agent_id)).await {
            Ok(response) => AgentOutcome::ok(response.text, response.usage.total_tokens(), response.cost_usd).with_metadata(serde_json::json!({
                "model": response.model,
                "cache_hit": response.usage.is_cache_hit(),
                "input_tokens": response.usage.input_tokens,
                "output_tokens": response.usage.output_tokens,
                "task_type": task_type,
            })),
            Err(e) => AgentOutcome::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_unsupported_task_type() {
        let agent = TaskAgent::new();
        let input = serde_json::json!({
            "task_type": "not_a_real_type",
            "description": "a valid description here",
            "content": "some content",
        });
        assert!(!agent.validate_input(&input).await);
    }

    #[tokio::test]
    async fn rejects_short_description() {
        let agent = TaskAgent::new();
        let input = serde_json::json!({
            "task_type": "content_summary",
            "description": "short",
            "content": "some content",
        });
        assert!(!agent.validate_input(&input).await);
    }

    #[tokio::test]
    async fn accepts_well_formed_input() {
        let agent = TaskAgent::new();
        let input = serde_json::json!({
            "task_type": "content_summary",
            "description": "Summarize this long piece of writing",
            "content": "some content",
        });
        assert!(agent.validate_input(&input).await);
    }

    #[test]
    fn code_synthesis_uses_low_temperature() {
        assert!(default_temperature("code_synthesis") < default_temperature("creative_writing"));
    }

    #[tokio::test]
    async fn tool_invocation_requires_a_tool_name() {
        let agent = TaskAgent::new();
        let input = serde_json::json!({"task_type": "tool_invocation"});
        assert!(!agent.validate_input(&input).await);
        let input = serde_json::json!({"task_type": "tool_invocation", "tool_name": "shell_command"});
        assert!(agent.validate_input(&input).await);
    }
}
