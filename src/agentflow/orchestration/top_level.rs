// src/agentflow/orchestration/top_level.rs

//! Entry point for every workflow: complexity scoring, resource estimation, strategy
//! selection among six execution paths, live monitoring, and result synthesis.

use std::sync::Mutex;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::agentflow::agent::AgentOptions;
use crate::agentflow::runtime::Runtime;

use super::base::{BaseOrchestrator, OrchestratorResult};
use super::sub::{DecompositionTask, SubOrchestrator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowInputType {
    UserPrompt,
    StructuredTask,
    GoalWorkflow,
    ScheduledWorkflow,
    ReactiveWorkflow,
    ContinuationWorkflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStrategy {
    DirectExecution,
    SequentialDecomposition,
    ParallelExecution,
    RecursiveDecomposition,
    CouncilDriven,
    IterativeRefinement,
}

impl WorkflowStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStrategy::DirectExecution => "direct_execution",
            WorkflowStrategy::SequentialDecomposition => "sequential_decomposition",
            WorkflowStrategy::ParallelExecution => "parallel_execution",
            WorkflowStrategy::RecursiveDecomposition => "recursive_decomposition",
            WorkflowStrategy::CouncilDriven => "council_driven",
            WorkflowStrategy::IterativeRefinement => "iterative_refinement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowComplexity {
    pub cognitive: ComplexityLevelOrLow,
    pub technical: ComplexityLevelOrLow,
    pub coordination: ComplexityLevelOrLow,
    pub data: ComplexityLevelOrLow,
    pub time_sensitivity: ComplexityLevelOrLow,
    pub quality_requirements: ComplexityLevelOrLow,
    pub scope_breadth: ComplexityLevelOrLow,
    pub risk: ComplexityLevelOrLow,
}

/// Newtype so `WorkflowComplexity` can derive `Default` (`ComplexityLevel` has no natural zero
/// value otherwise) while keeping the field type ergonomic to read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplexityLevelOrLow(pub ComplexityLevel);

impl Default for ComplexityLevelOrLow {
    fn default() -> Self {
        ComplexityLevelOrLow(ComplexityLevel::Low)
    }
}

impl WorkflowComplexity {
    fn dimensions(&self) -> [ComplexityLevel; 8] {
        [
            self.cognitive.0,
            self.technical.0,
            self.coordination.0,
            self.data.0,
            self.time_sensitivity.0,
            self.quality_requirements.0,
            self.scope_breadth.0,
            self.risk.0,
        ]
    }

    pub fn overall(&self) -> ComplexityLevel {
        let dims = self.dimensions();
        let critical_count = dims.iter().filter(|l| **l == ComplexityLevel::Critical).count();
        let high_count = dims.iter().filter(|l| **l == ComplexityLevel::High).count();
        let medium_count = dims.iter().filter(|l| **l == ComplexityLevel::Medium).count();

        if critical_count >= 1 || high_count >= 4 {
            ComplexityLevel::Critical
        } else if high_count >= 2 {
            ComplexityLevel::High
        } else if high_count >= 1 || medium_count >= 4 {
            ComplexityLevel::Medium
        } else {
            ComplexityLevel::Low
        }
    }

    pub fn requires_decomposition(&self) -> bool {
        matches!(self.overall(), ComplexityLevel::High | ComplexityLevel::Critical)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceEstimate {
    pub estimated_agents: u32,
    pub estimated_cost_usd: f64,
    pub estimated_minutes: f64,
    pub resource_warnings: Vec<String>,
    pub confidence_level: f64,
}

#[derive(Debug, Clone, Default)]
pub struct MonitoringState {
    pub phase: String,
    pub progress_percentage: f64,
    pub agents_active: u32,
    pub agents_completed: u32,
    pub agents_failed: u32,
    pub cost_consumed: f64,
    pub bottlenecks: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct WorkflowInput {
    pub input_type: WorkflowInputType,
    pub content: Value,
    pub require_council_consensus: bool,
    pub validation_level: Option<String>,
    pub optimization_focus: Option<String>,
}

fn default_timeout(secs: u64) -> AgentOptions {
    AgentOptions {
        max_retries: 2,
        retry_backoff_cap: std::time::Duration::from_secs(10),
        timeout: std::time::Duration::from_secs(secs),
        llm_model: "claude-3-5-haiku-20241022".to_string(),
    }
}

/// Heuristic dimension assignment: short definitional prompts score low cognitively; a
/// council/critical-validation request raises quality and risk; many deliverables raise scope
/// and coordination.
fn analyze_complexity(input: &WorkflowInput) -> WorkflowComplexity {
    let mut complexity = WorkflowComplexity::default();

    let prompt = input.content.get("prompt").and_then(|v| v.as_str()).unwrap_or("").to_lowercase();
    let is_simple_lookup = ["what is", "who is", "define"].iter().any(|p| prompt.starts_with(p));
    if !is_simple_lookup && prompt.len() > 200 {
        complexity.cognitive = ComplexityLevelOrLow(ComplexityLevel::Medium);
    }

    if input.require_council_consensus || input.validation_level.as_deref() == Some("critical") {
        complexity.quality_requirements = ComplexityLevelOrLow(ComplexityLevel::High);
        complexity.risk = ComplexityLevelOrLow(ComplexityLevel::High);
    }

    let deliverable_count = input.content.get("deliverables").and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0);
    if deliverable_count > 3 {
        complexity.scope_breadth = ComplexityLevelOrLow(ComplexityLevel::High);
        complexity.coordination = ComplexityLevelOrLow(ComplexityLevel::High);
    } else if deliverable_count > 1 {
        complexity.scope_breadth = ComplexityLevelOrLow(ComplexityLevel::Medium);
    }

    if matches!(input.input_type, WorkflowInputType::GoalWorkflow) {
        complexity.coordination = ComplexityLevelOrLow(ComplexityLevel::High);
    }

    complexity
}

fn estimate_resources(complexity: &WorkflowComplexity) -> ResourceEstimate {
    let multiplier = match complexity.overall() {
        ComplexityLevel::Low => 1.0,
        ComplexityLevel::Medium => 2.0,
        ComplexityLevel::High | ComplexityLevel::Critical => 4.0,
    };
    let base_agents = 2.0;
    let base_cost = 0.50;
    let base_minutes = 3.0;

    let mut warnings = Vec::new();
    let estimated_cost = base_cost * multiplier;
    if estimated_cost > 20.0 {
        warnings.push("estimated cost approaches the configured budget cap".to_string());
    }

    ResourceEstimate {
        estimated_agents: (base_agents * multiplier) as u32,
        estimated_cost_usd: estimated_cost,
        estimated_minutes: base_minutes * multiplier,
        resource_warnings: warnings,
        confidence_level: 0.7,
    }
}

fn select_strategy(input: &WorkflowInput, complexity: &WorkflowComplexity) -> WorkflowStrategy {
    if matches!(input.input_type, WorkflowInputType::GoalWorkflow) {
        return WorkflowStrategy::RecursiveDecomposition;
    }
    if matches!(complexity.risk.0, ComplexityLevel::High | ComplexityLevel::Critical) && input.require_council_consensus {
        return WorkflowStrategy::CouncilDriven;
    }
    if complexity.requires_decomposition() {
        return if matches!(input.input_type, WorkflowInputType::ReactiveWorkflow) {
            WorkflowStrategy::ParallelExecution
        } else {
            WorkflowStrategy::RecursiveDecomposition
        };
    }
    match input.optimization_focus.as_deref() {
        Some("speed") => return WorkflowStrategy::ParallelExecution,
        Some("quality") => return WorkflowStrategy::IterativeRefinement,
        _ => {}
    }
    match complexity.overall() {
        ComplexityLevel::Low => WorkflowStrategy::DirectExecution,
        ComplexityLevel::High | ComplexityLevel::Critical => WorkflowStrategy::ParallelExecution,
        ComplexityLevel::Medium => WorkflowStrategy::SequentialDecomposition,
    }
}

pub struct TopLevelOrchestrator {
    base: BaseOrchestrator,
    max_recursion_depth: u32,
    monitoring: Mutex<MonitoringState>,
}

impl TopLevelOrchestrator {
    pub fn new(runtime: Runtime, max_concurrent_agents: u32, max_recursion_depth: u32) -> Self {
        TopLevelOrchestrator {
            base: BaseOrchestrator::new(runtime, "top_level", None, None, max_concurrent_agents),
            max_recursion_depth,
            monitoring: Mutex::new(MonitoringState::default()),
        }
    }

    pub fn initialize(&self) -> bool {
        self.base.initialize();
        self.base.activate();
        true
    }

    fn update_monitoring(&self, phase: &str, progress: f64) {
        let mut state = self.monitoring.lock().expect("monitoring state lock poisoned");
        state.phase = phase.to_string();
        state.progress_percentage = progress;
        state.cost_consumed = self.base.total_cost_usd();
    }

    pub fn monitoring_snapshot(&self) -> MonitoringState {
        self.monitoring.lock().expect("monitoring state lock poisoned").clone()
    }

    fn conversion_prompt(input: &WorkflowInput) -> Value {
        let prompt = input.content.get("prompt").and_then(|v| v.as_str()).unwrap_or("").to_string();
        serde_json::json!({
            "task_type": "conversational_response",
            "description": "Respond to the workflow's direct request",
            "content": prompt,
        })
    }

    async fn execute_direct(&self, input: &WorkflowInput) -> (String, bool) {
        let Some(agent) = self.base.spawn_agent("task", default_timeout(120), None) else {
            return ("failed to spawn task agent for direct execution".to_string(), false);
        };
        let result = agent.execute(Self::conversion_prompt(input)).await;
        self.base.track_agent_completion(&agent, &result);
        (result.content, result.success)
    }

    async fn execute_sequential(&self, input: &WorkflowInput) -> (String, bool) {
        let prompt = input.content.get("prompt").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let subtask_count = 3usize.min(5);
        let mut context = String::new();
        let mut last_success = true;
        for i in 0..subtask_count {
            let Some(agent) = self.base.spawn_agent("task", default_timeout(180), None) else {
                last_success = false;
                break;
            };
            let content = if context.is_empty() {
                format!("Step {} of {subtask_count} for: {prompt}", i + 1)
            } else {
                format!("Step {} of {subtask_count} for: {prompt}\nPrior context:\n{context}", i + 1)
            };
            let task_input = serde_json::json!({
                "task_type": "subtask_execution",
                "description": format!("Step {} of workflow", i + 1),
                "content": content,
            });
            let result = agent.execute(task_input).await;
            self.base.track_agent_completion(&agent, &result);
            last_success = result.success;
            if result.success {
                context.push_str(&result.content);
                context.push('\n');
            } else {
                break;
            }
        }
        (context, last_success)
    }

    async fn execute_parallel(&self, input: &WorkflowInput) -> (String, bool) {
        let prompt = input.content.get("prompt").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let batch_size = 6usize;
        let spawned: Vec<_> = (0..batch_size).filter_map(|i| self.base.spawn_agent("task", default_timeout(180), None).map(|a| (i, a))).collect();

        let futures = spawned.iter().map(|(i, agent)| {
            let task_input = serde_json::json!({
                "task_type": "subtask_execution",
                "description": format!("Parallel branch {}", i + 1),
                "content": format!("Branch {} of parallel execution for: {prompt}", i + 1),
            });
            agent.execute(task_input)
        });
        let outcomes = join_all(futures).await;

        let mut pieces = Vec::new();
        let mut any_success = false;
        for ((_, agent), result) in spawned.into_iter().zip(outcomes) {
            self.base.track_agent_completion(&agent, &result);
            if result.success {
                any_success = true;
                pieces.push(result.content);
            }
        }
        (pieces.join("\n"), any_success)
    }

    async fn execute_recursive(&self, input: &WorkflowInput, thought_tree_id: Uuid) -> (String, bool) {
        let prompt = input.content.get("prompt").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let task = DecompositionTask {
            title: input.content.get("title").and_then(|v| v.as_str()).unwrap_or("workflow goal").to_string(),
            description: if prompt.is_empty() { "achieve the stated goal".to_string() } else { prompt },
            thought_tree_id,
            current_depth: 1,
        };
        let sub = SubOrchestrator::new(self.base.runtime_clone(), self.base.id, task, self.max_recursion_depth, 8, 10);
        if !sub.initialize() {
            return self.execute_parallel(input).await;
        }
        let result = sub.execute_decomposition().await;
        self.base.roll_up_child_cost(result.total_tokens, result.total_cost_usd);
        let content = result.final_output.get("content").and_then(|v| v.as_str()).unwrap_or("").to_string();
        (content, result.success)
    }

    async fn execute_council_driven(&self, input: &WorkflowInput) -> (String, bool) {
        let prompt = input.content.get("prompt").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let Some(agent) = self.base.spawn_agent("council", default_timeout(600), None) else {
            return self.execute_parallel(input).await;
        };
        let council_input = serde_json::json!({
            "decision_context": format!("Workflow requiring consensus: {prompt}"),
            "decision_question": "What is the best course of action for this workflow?",
        });
        let result = agent.execute(council_input).await;
        self.base.track_agent_completion(&agent, &result);
        if !result.success {
            return self.execute_parallel(input).await;
        }
        let (parallel_content, parallel_success) = self.execute_parallel(input).await;
        (format!("{}\n\n{}", result.content, parallel_content), parallel_success)
    }

    async fn execute_iterative_refinement(&self, input: &WorkflowInput) -> (String, bool) {
        let prompt = input.content.get("prompt").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let mut content = String::new();
        let mut success = false;
        for iteration in 0..3 {
            let Some(agent) = self.base.spawn_agent("task", default_timeout(180), None) else { break };
            let task_input = serde_json::json!({
                "task_type": "subtask_execution",
                "description": format!("Refinement iteration {}", iteration + 1),
                "content": format!("Iteration {} for: {prompt}\nPrior draft:\n{content}", iteration + 1),
            });
            let result = agent.execute(task_input).await;
            self.base.track_agent_completion(&agent, &result);
            if !result.success {
                break;
            }
            content = result.content;
            success = true;

            if iteration < 2 {
                let Some(validator) = self.base.spawn_agent("validator", default_timeout(180), None) else { break };
                let validation_input = serde_json::json!({"content_to_validate": content, "validation_level": "standard"});
                let validation_result = validator.execute(validation_input).await;
                self.base.track_agent_completion(&validator, &validation_result);
                if validation_result.success {
                    break;
                }
            }
        }
        (content, success)
    }

    async fn execute_with_strategy(&self, input: &WorkflowInput, strategy: WorkflowStrategy, thought_tree_id: Uuid) -> (String, bool) {
        match strategy {
            WorkflowStrategy::DirectExecution => self.execute_direct(input).await,
            WorkflowStrategy::SequentialDecomposition => self.execute_sequential(input).await,
            WorkflowStrategy::ParallelExecution => self.execute_parallel(input).await,
            WorkflowStrategy::RecursiveDecomposition => self.execute_recursive(input, thought_tree_id).await,
            WorkflowStrategy::CouncilDriven => self.execute_council_driven(input).await,
            WorkflowStrategy::IterativeRefinement => self.execute_iterative_refinement(input).await,
        }
    }

    pub async fn execute_workflow(&self, input: WorkflowInput) -> OrchestratorResult {
        self.update_monitoring("analysis", 10.0);
        let complexity = analyze_complexity(&input);

        self.update_monitoring("planning", 20.0);
        let resource_estimate = estimate_resources(&complexity);

        self.update_monitoring("strategy_selection", 30.0);
        let strategy = select_strategy(&input, &complexity);

        self.update_monitoring("executing", 40.0);
        let (content, success) = self.execute_with_strategy(&input, strategy, self.base.thought_tree_id).await;

        self.update_monitoring("finalizing", 90.0);
        let mut result = self
            .base
            .terminate(serde_json::json!({
                "content": content,
                "success": success,
            }))
            .await;
        result.success = success;
        result.metadata = serde_json::json!({
            "strategy_used": strategy.as_str(),
            "complexity": {
                "overall": format!("{:?}", complexity.overall()).to_lowercase(),
            },
            "resource_estimate": {
                "estimated_agents": resource_estimate.estimated_agents,
                "estimated_cost_usd": resource_estimate.estimated_cost_usd,
                "confidence_level": resource_estimate.confidence_level,
                "warnings": resource_estimate.resource_warnings,
            },
            "monitoring": self.monitoring_snapshot().phase,
        });

        self.update_monitoring("completed", 100.0);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_with(input_type: WorkflowInputType, prompt: &str) -> WorkflowInput {
        WorkflowInput {
            input_type,
            content: serde_json::json!({"prompt": prompt}),
            require_council_consensus: false,
            validation_level: None,
            optimization_focus: None,
        }
    }

    #[test]
    fn goal_workflow_always_selects_recursive_decomposition() {
        let input = input_with(WorkflowInputType::GoalWorkflow, "do a big thing");
        let complexity = analyze_complexity(&input);
        assert_eq!(select_strategy(&input, &complexity), WorkflowStrategy::RecursiveDecomposition);
    }

    #[test]
    fn simple_lookup_prompt_selects_direct_execution() {
        let input = input_with(WorkflowInputType::UserPrompt, "what is rust");
        let complexity = analyze_complexity(&input);
        assert_eq!(complexity.overall(), ComplexityLevel::Low);
        assert_eq!(select_strategy(&input, &complexity), WorkflowStrategy::DirectExecution);
    }

    #[test]
    fn council_consensus_with_high_risk_selects_council_driven() {
        let mut input = input_with(WorkflowInputType::UserPrompt, "should we deploy this change");
        input.require_council_consensus = true;
        let complexity = analyze_complexity(&input);
        assert_eq!(select_strategy(&input, &complexity), WorkflowStrategy::CouncilDriven);
    }

    #[test]
    fn overall_complexity_is_critical_with_one_critical_dimension() {
        let mut complexity = WorkflowComplexity::default();
        complexity.risk = ComplexityLevelOrLow(ComplexityLevel::Critical);
        assert_eq!(complexity.overall(), ComplexityLevel::Critical);
    }

    #[test]
    fn resource_estimate_scales_with_complexity() {
        let low = estimate_resources(&WorkflowComplexity::default());
        let mut high_complexity = WorkflowComplexity::default();
        high_complexity.risk = ComplexityLevelOrLow(ComplexityLevel::High);
        high_complexity.scope_breadth = ComplexityLevelOrLow(ComplexityLevel::High);
        let high = estimate_resources(&high_complexity);
        assert!(high.estimated_cost_usd > low.estimated_cost_usd);
    }
}
