// src/agentflow/orchestration/sub.rs

//! Recursive decomposition: plan a task into subtasks, execute them sequentially or in
//! parallel depending on whether any declare dependencies, then synthesize the results.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::agentflow::agent::AgentOptions;
use crate::agentflow::runtime::Runtime;

use super::base::{BaseOrchestrator, OrchestratorResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompositionStrategy {
    Sequential,
    Parallel,
    DependencyOrdered,
}

impl DecompositionStrategy {
    fn as_str(&self) -> &'static str {
        match self {
            DecompositionStrategy::Sequential => "sequential",
            DecompositionStrategy::Parallel => "parallel",
            DecompositionStrategy::DependencyOrdered => "dependency_ordered",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtaskDefinition {
    pub subtask_id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default = "default_complexity")]
    pub estimated_complexity: String,
    #[serde(default = "default_agent_kinds")]
    pub required_agent_kinds: Vec<String>,
}

fn default_complexity() -> String {
    "medium".to_string()
}

fn default_agent_kinds() -> Vec<String> {
    vec!["task".to_string()]
}

#[derive(Debug, Clone)]
pub struct DecompositionTask {
    pub title: String,
    pub description: String,
    pub thought_tree_id: Uuid,
    pub current_depth: u32,
}

pub struct DecompositionPlan {
    pub subtasks: Vec<SubtaskDefinition>,
    pub strategy: DecompositionStrategy,
}

fn choose_strategy(subtasks: &[SubtaskDefinition]) -> DecompositionStrategy {
    if subtasks.iter().any(|s| !s.dependencies.is_empty()) {
        DecompositionStrategy::DependencyOrdered
    } else if subtasks.len() <= 2 {
        DecompositionStrategy::Sequential
    } else {
        DecompositionStrategy::Parallel
    }
}

fn fallback_plan(task: &DecompositionTask) -> DecompositionPlan {
    DecompositionPlan {
        subtasks: vec![SubtaskDefinition {
            subtask_id: Uuid::new_v4().to_string(),
            title: format!("Execute: {}", task.title),
            description: task.description.clone(),
            dependencies: Vec::new(),
            estimated_complexity: "medium".to_string(),
            required_agent_kinds: vec!["task".to_string()],
        }],
        strategy: DecompositionStrategy::Sequential,
    }
}

fn parse_plan_from_analysis(content: &str, task: &DecompositionTask, max_subtasks: usize) -> DecompositionPlan {
    let parsed: Result<Vec<SubtaskDefinition>, _> = serde_json::from_str(content);
    match parsed {
        Ok(mut subtasks) if !subtasks.is_empty() => {
            subtasks.truncate(max_subtasks);
            for s in subtasks.iter_mut() {
                if s.subtask_id.is_empty() {
                    s.subtask_id = Uuid::new_v4().to_string();
                }
            }
            let strategy = choose_strategy(&subtasks);
            DecompositionPlan { subtasks, strategy }
        }
        _ => fallback_plan(task),
    }
}

/// A recursive decomposition run. Constructed once per decomposition task; `execute` drives it
/// through plan/strategy-pick/execute/synthesize and reports a single [`OrchestratorResult`].
pub struct SubOrchestrator {
    base: BaseOrchestrator,
    task: DecompositionTask,
    max_depth: u32,
    max_subtasks: usize,
}

impl SubOrchestrator {
    pub fn new(runtime: Runtime, parent_orchestrator_id: Uuid, task: DecompositionTask, max_depth: u32, max_subtasks: usize, max_concurrent_agents: u32) -> Self {
        SubOrchestrator {
            base: BaseOrchestrator::new(runtime, "sub", Some(task.thought_tree_id), Some(parent_orchestrator_id), max_concurrent_agents),
            task,
            max_depth,
            max_subtasks,
        }
    }

    /// Refuses to proceed past depth or missing-field guards, matching the "refuse to
    /// initialize" contract rather than silently degrading.
    pub fn initialize(&self) -> bool {
        if self.task.current_depth >= self.max_depth {
            log::error!("sub-orchestrator {} depth limit exceeded ({} >= {})", self.base.id, self.task.current_depth, self.max_depth);
            return false;
        }
        if self.task.title.is_empty() || self.task.description.is_empty() {
            log::error!("sub-orchestrator {} decomposition task missing title/description", self.base.id);
            return false;
        }
        self.base.initialize();
        self.base.activate();
        true
    }

    fn agent_options(&self, timeout_secs: u64) -> AgentOptions {
        AgentOptions {
            max_retries: 2,
            retry_backoff_cap: std::time::Duration::from_secs(10),
            timeout: std::time::Duration::from_secs(timeout_secs),
            llm_model: "claude-3-5-haiku-20241022".to_string(),
        }
    }

    async fn plan(&self) -> DecompositionPlan {
        let Some(agent) = self.base.spawn_agent("task", self.agent_options(180), None) else {
            return fallback_plan(&self.task);
        };

        let content = format!(
            "Analyze and decompose this task into subtasks:\nTask Title: {}\nTask Description: {}\nConstraints:\n- Maximum {} subtasks\n- Maximum depth remaining: {}\n- Current depth: {}",
            self.task.title,
            self.task.description,
            self.max_subtasks,
            self.max_depth - self.task.current_depth,
            self.task.current_depth
        );
        let input = serde_json::json!({
            "task_type": "decomposition_analysis",
            "description": format!("Analyze and decompose task: {}", self.task.title),
            "content": content,
        });

        let result = agent.execute(input).await;
        self.base.track_agent_completion(&agent, &result);

        if !result.success {
            return fallback_plan(&self.task);
        }
        parse_plan_from_analysis(&result.content, &self.task, self.max_subtasks)
    }

    fn subtask_input(&self, subtask: &SubtaskDefinition, prior_context: &str) -> Value {
        let mut content = format!("Execute subtask: {}\nDescription: {}", subtask.title, subtask.description);
        if !prior_context.is_empty() {
            content.push_str(&format!("\nContext from previous subtasks:\n{prior_context}"));
        }
        content.push_str(&format!("\nParent task: {} (depth: {})", self.task.title, self.task.current_depth));
        serde_json::json!({
            "task_type": "subtask_execution",
            "description": subtask.description,
            "content": content,
        })
    }

    async fn execute_sequential(&self, subtasks: &[SubtaskDefinition]) -> Vec<(String, crate::agentflow::agent::AgentResult)> {
        let mut results = Vec::new();
        let mut prior_context = String::new();
        for subtask in subtasks {
            let Some(agent) = self.base.spawn_agent(subtask.required_agent_kinds.first().map(|s| s.as_str()).unwrap_or("task"), self.agent_options(300), None) else {
                continue;
            };
            let input = self.subtask_input(subtask, &prior_context);
            let result = agent.execute(input).await;
            self.base.track_agent_completion(&agent, &result);
            if result.success {
                prior_context.push_str(&format!("- {}: {}\n", subtask.title, truncate(&result.content, 200)));
            }
            results.push((subtask.subtask_id.clone(), result));
        }
        results
    }

    async fn execute_parallel(&self, subtasks: &[SubtaskDefinition]) -> Vec<(String, crate::agentflow::agent::AgentResult)> {
        let spawned: Vec<_> = subtasks
            .iter()
            .filter_map(|s| {
                self.base
                    .spawn_agent(s.required_agent_kinds.first().map(|k| k.as_str()).unwrap_or("task"), self.agent_options(300), None)
                    .map(|agent| (s.subtask_id.clone(), agent, self.subtask_input(s, "")))
            })
            .collect();

        let futures = spawned.iter().map(|(_, agent, input)| agent.execute(input.clone()));
        let outcomes = join_all(futures).await;

        spawned
            .into_iter()
            .zip(outcomes)
            .map(|((id, agent, _), result)| {
                self.base.track_agent_completion(&agent, &result);
                (id, result)
            })
            .collect()
    }

    async fn synthesize(&self, subtask_results: &[(String, crate::agentflow::agent::AgentResult)]) -> (String, bool) {
        let successful: Vec<_> = subtask_results.iter().filter(|(_, r)| r.success).collect();
        if successful.is_empty() {
            return ("no subtask results to synthesize".to_string(), false);
        }

        let Some(agent) = self.base.spawn_agent("memory", self.agent_options(300), None) else {
            return (fallback_synthesis(&successful), true);
        };

        let payload: Vec<Value> = successful
            .iter()
            .map(|(id, r)| serde_json::json!({"subtask_id": id, "content": r.content, "success": r.success}))
            .collect();
        let input = serde_json::json!({
            "operation": "summarize",
            "scope": "thought_tree",
            "summary_focus": serde_json::to_string(&payload).unwrap_or_default(),
        });

        let result = agent.execute(input).await;
        self.base.track_agent_completion(&agent, &result);

        if result.success {
            (result.content, true)
        } else {
            (fallback_synthesis(&successful), true)
        }
    }

    pub async fn execute_decomposition(&self) -> OrchestratorResult {
        let plan = self.plan().await;
        if plan.subtasks.is_empty() {
            return self.base.terminate(serde_json::json!({"error": "failed to create decomposition plan"})).await;
        }

        let subtask_results = match plan.strategy {
            DecompositionStrategy::Parallel => self.execute_parallel(&plan.subtasks).await,
            DecompositionStrategy::Sequential | DecompositionStrategy::DependencyOrdered => self.execute_sequential(&plan.subtasks).await,
        };

        let (content, synthesis_success) = self.synthesize(&subtask_results).await;
        let completed = subtask_results.iter().filter(|(_, r)| r.success).count();
        let failed = subtask_results.len() - completed;

        let mut result = self
            .base
            .terminate(serde_json::json!({
                "content": content,
                "success": synthesis_success,
            }))
            .await;
        result.success = synthesis_success;
        result.metadata = serde_json::json!({
            "decomposition_strategy": plan.strategy.as_str(),
            "subtasks_completed": completed,
            "subtasks_failed": failed,
            "depth": self.task.current_depth,
        });
        result
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        &s[..max]
    }
}

fn fallback_synthesis(successful: &[&(String, crate::agentflow::agent::AgentResult)]) -> String {
    let pieces: Vec<&str> = successful.iter().take(3).map(|(_, r)| r.content.as_str()).collect();
    format!("Completed {} subtask(s) successfully. Results: {}", successful.len(), pieces.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subtask(id: &str, deps: Vec<&str>) -> SubtaskDefinition {
        SubtaskDefinition {
            subtask_id: id.to_string(),
            title: format!("subtask {id}"),
            description: "do work".to_string(),
            dependencies: deps.into_iter().map(String::from).collect(),
            estimated_complexity: "medium".to_string(),
            required_agent_kinds: vec!["task".to_string()],
        }
    }

    #[test]
    fn dependencies_force_dependency_ordered_strategy() {
        let subtasks = vec![subtask("a", vec![]), subtask("b", vec!["a"])];
        assert_eq!(choose_strategy(&subtasks), DecompositionStrategy::DependencyOrdered);
    }

    #[test]
    fn two_or_fewer_independent_subtasks_run_sequentially() {
        let subtasks = vec![subtask("a", vec![]), subtask("b", vec![])];
        assert_eq!(choose_strategy(&subtasks), DecompositionStrategy::Sequential);
    }

    #[test]
    fn three_or_more_independent_subtasks_run_in_parallel() {
        let subtasks = vec![subtask("a", vec![]), subtask("b", vec![]), subtask("c", vec![])];
        assert_eq!(choose_strategy(&subtasks), DecompositionStrategy::Parallel);
    }

    #[tokio::test]
    async fn depth_at_limit_refuses_to_initialize() {
        let runtime = Runtime::for_testing().unwrap();
        let task = DecompositionTask { title: "t".into(), description: "d".into(), thought_tree_id: Uuid::new_v4(), current_depth: 3 };
        let sub = SubOrchestrator::new(runtime, Uuid::new_v4(), task, 3, 8, 10);
        assert!(!sub.initialize());
    }
}
