// src/agentflow/orchestration/base.rs

//! The orchestrator lifecycle shared by the sub- and top-level orchestrators: agent spawning
//! under a concurrency quota, completion tracking, state persistence, and shutdown.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agentflow::agent::council::CouncilAgent;
use crate::agentflow::agent::memory::MemoryAgent;
use crate::agentflow::agent::social::SocialMonitorAgent;
use crate::agentflow::agent::task::TaskAgent;
use crate::agentflow::agent::validator::ValidatorAgent;
use crate::agentflow::agent::{AgentOptions, AgentResult, AgentRuntime, AgentSpecialization};
use crate::agentflow::persistence::store::OrchestratorRecord;
use crate::agentflow::runtime::Runtime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Initializing,
    Active,
    Paused,
    Completed,
    Failed,
    Terminated,
}

impl OrchestratorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorState::Initializing => "initializing",
            OrchestratorState::Active => "active",
            OrchestratorState::Paused => "paused",
            OrchestratorState::Completed => "completed",
            OrchestratorState::Failed => "failed",
            OrchestratorState::Terminated => "terminated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorResult {
    pub success: bool,
    pub workflow_id: Uuid,
    pub agents_spawned: u32,
    pub agents_completed: u32,
    pub agents_failed: u32,
    pub total_cost_usd: f64,
    pub total_tokens: u64,
    pub execution_time_ms: u64,
    pub error_message: Option<String>,
    pub final_output: serde_json::Value,
    pub metadata: serde_json::Value,
}

/// Resolves one of the four agent kinds named in the data model into a boxed specialization. A
/// social monitor is spawnable by kind `"social"` even though it persists under `AgentKind::Task`
/// — its own scheduler loop, not its storage kind, is what distinguishes it.
fn build_specialization(kind: &str, feed: Option<Arc<dyn crate::agentflow::agent::social::FeedClient>>) -> Option<Box<dyn AgentSpecialization>> {
    match kind {
        "task" => Some(Box::new(TaskAgent::new())),
        "council" => Some(Box::new(CouncilAgent::new())),
        "validator" => Some(Box::new(ValidatorAgent::new())),
        "memory" => Some(Box::new(MemoryAgent::new())),
        "social" => feed.map(|f| Box::new(SocialMonitorAgent::new(f)) as Box<dyn AgentSpecialization>),
        _ => None,
    }
}

/// Shared orchestrator machinery. Sub- and top-level orchestrators each hold one of these and
/// delegate spawn/track/coordinate/terminate to it rather than reimplementing the quota gate.
pub struct BaseOrchestrator {
    pub id: Uuid,
    pub orchestrator_type: String,
    pub thought_tree_id: Uuid,
    pub parent_orchestrator_id: Option<Uuid>,
    pub max_concurrent_agents: u32,
    current_active_agents: AtomicU32,
    state: Mutex<OrchestratorState>,
    runtime: Runtime,
    spawned: Mutex<Vec<Arc<AgentRuntime>>>,
    completed_count: AtomicU32,
    failed_count: AtomicU32,
    total_tokens: AtomicU64,
    total_cost_millicents: AtomicU64,
    started_at: Mutex<Option<Instant>>,
}

impl BaseOrchestrator {
    pub fn new(
        runtime: Runtime,
        orchestrator_type: impl Into<String>,
        thought_tree_id: Option<Uuid>,
        parent_orchestrator_id: Option<Uuid>,
        max_concurrent_agents: u32,
    ) -> Self {
        BaseOrchestrator {
            id: Uuid::new_v4(),
            orchestrator_type: orchestrator_type.into(),
            thought_tree_id: thought_tree_id.unwrap_or_else(Uuid::new_v4),
            parent_orchestrator_id,
            max_concurrent_agents,
            current_active_agents: AtomicU32::new(0),
            state: Mutex::new(OrchestratorState::Initializing),
            runtime,
            spawned: Mutex::new(Vec::new()),
            completed_count: AtomicU32::new(0),
            failed_count: AtomicU32::new(0),
            total_tokens: AtomicU64::new(0),
            total_cost_millicents: AtomicU64::new(0),
            started_at: Mutex::new(None),
        }
    }

    pub fn state(&self) -> OrchestratorState {
        *self.state.lock().expect("orchestrator state lock poisoned")
    }

    pub fn runtime_clone(&self) -> Runtime {
        self.runtime.clone()
    }

    fn set_state(&self, state: OrchestratorState) {
        *self.state.lock().expect("orchestrator state lock poisoned") = state;
    }

    fn persist(&self) {
        let depth_goal = format!("{} workflow", self.orchestrator_type);
        if let Err(e) = self.runtime.store.ensure_thought_tree_exists(self.thought_tree_id, &depth_goal) {
            error!("failed to ensure thought tree for orchestrator {}: {e}", self.id);
        }
        let record = OrchestratorRecord {
            id: self.id,
            parent_orchestrator_id: self.parent_orchestrator_id,
            thought_tree_id: self.thought_tree_id,
            kind: self.orchestrator_type.clone(),
            status: self.state().as_str().to_string(),
            current_active_agents: self.current_active_agents.load(Ordering::SeqCst),
            max_concurrent_agents: self.max_concurrent_agents,
            global_context: serde_json::json!({}),
        };
        if let Err(e) = self.runtime.store.upsert_orchestrator(&record) {
            warn!("failed to persist orchestrator {}: {e}", self.id);
        }
    }

    /// Runs base initialization (thought tree + persistence); the caller transitions to
    /// `Active` once its own specific setup succeeds.
    pub fn initialize(&self) -> bool {
        *self.started_at.lock().expect("orchestrator timer lock poisoned") = Some(Instant::now());
        self.persist();
        true
    }

    pub fn activate(&self) {
        self.set_state(OrchestratorState::Active);
        self.persist();
        info!("orchestrator {} ({}) active", self.id, self.orchestrator_type);
    }

    pub fn mark_failed(&self) {
        self.set_state(OrchestratorState::Failed);
        self.persist();
    }

    /// Returns `None` when the quota is exhausted or `agent_kind` isn't spawnable, matching
    /// the "`SpawnAgent` returns nil" contract.
    pub fn spawn_agent(&self, agent_kind: &str, options: AgentOptions, parent_agent_id: Option<Uuid>) -> Option<Arc<AgentRuntime>> {
        self.spawn_agent_with_feed(agent_kind, options, parent_agent_id, None)
    }

    pub fn spawn_agent_with_feed(
        &self,
        agent_kind: &str,
        options: AgentOptions,
        parent_agent_id: Option<Uuid>,
        feed: Option<Arc<dyn crate::agentflow::agent::social::FeedClient>>,
    ) -> Option<Arc<AgentRuntime>> {
        if self.current_active_agents.load(Ordering::SeqCst) >= self.max_concurrent_agents {
            warn!(
                "orchestrator {} at agent limit ({}/{})",
                self.id,
                self.current_active_agents.load(Ordering::SeqCst),
                self.max_concurrent_agents
            );
            return None;
        }

        let specialization = match build_specialization(agent_kind, feed) {
            Some(s) => s,
            None => {
                error!("orchestrator {} cannot spawn unknown agent kind: {agent_kind}", self.id);
                return None;
            }
        };

        let agent = Arc::new(AgentRuntime::new(self.runtime.clone(), self.thought_tree_id, parent_agent_id, options, specialization));
        if !agent.initialize() {
            error!("orchestrator {} failed to initialize {agent_kind} agent", self.id);
            return None;
        }

        self.current_active_agents.fetch_add(1, Ordering::SeqCst);
        self.spawned.lock().expect("spawned agents lock poisoned").push(agent.clone());
        self.persist();
        info!("orchestrator {} spawned {agent_kind} agent {}", self.id, agent.id);
        Some(agent)
    }

    pub fn track_agent_completion(&self, agent: &Arc<AgentRuntime>, result: &AgentResult) {
        self.spawned.lock().expect("spawned agents lock poisoned").retain(|a| a.id != agent.id);
        self.current_active_agents.fetch_sub(1, Ordering::SeqCst);
        if result.success {
            self.completed_count.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed_count.fetch_add(1, Ordering::SeqCst);
        }
        self.total_tokens.fetch_add(result.tokens_used, Ordering::SeqCst);
        self.total_cost_millicents.fetch_add((result.cost_usd * 100_000.0) as u64, Ordering::SeqCst);
        self.persist();
    }

    /// Executes agents sequentially and tracks each completion. Subclasses needing parallel
    /// fan-out (the sub-orchestrator's parallel strategy) bypass this and join futures directly,
    /// then call `track_agent_completion` themselves.
    pub async fn coordinate(&self, agents: Vec<(Arc<AgentRuntime>, serde_json::Value)>) -> Vec<AgentResult> {
        let mut results = Vec::with_capacity(agents.len());
        for (agent, input) in agents {
            let result = agent.execute(input).await;
            self.track_agent_completion(&agent, &result);
            results.push(result);
        }
        results
    }

    pub fn roll_up_child_cost(&self, tokens: u64, cost_usd: f64) {
        self.total_tokens.fetch_add(tokens, Ordering::SeqCst);
        self.total_cost_millicents.fetch_add((cost_usd * 100_000.0) as u64, Ordering::SeqCst);
    }

    pub fn status(&self) -> serde_json::Value {
        serde_json::json!({
            "orchestrator_id": self.id,
            "orchestrator_type": self.orchestrator_type,
            "state": self.state().as_str(),
            "thought_tree_id": self.thought_tree_id,
            "current_active_agents": self.current_active_agents.load(Ordering::SeqCst),
            "max_concurrent_agents": self.max_concurrent_agents,
            "agents_completed": self.completed_count.load(Ordering::SeqCst),
            "agents_failed": self.failed_count.load(Ordering::SeqCst),
            "total_tokens": self.total_tokens.load(Ordering::SeqCst),
            "total_cost_usd": self.total_cost_usd(),
        })
    }

    pub fn total_cost_usd(&self) -> f64 {
        self.total_cost_millicents.load(Ordering::SeqCst) as f64 / 100_000.0
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens.load(Ordering::SeqCst)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at
            .lock()
            .expect("orchestrator timer lock poisoned")
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    /// Terminates every still-spawned agent, records a synthetic failed result for each, and
    /// transitions the orchestrator itself to `terminated`.
    pub async fn terminate(&self, final_output: serde_json::Value) -> OrchestratorResult {
        let remaining: Vec<Arc<AgentRuntime>> = self.spawned.lock().expect("spawned agents lock poisoned").drain(..).collect();
        for agent in remaining {
            agent.terminate();
            self.current_active_agents.fetch_sub(1, Ordering::SeqCst);
            self.failed_count.fetch_add(1, Ordering::SeqCst);
        }

        self.set_state(OrchestratorState::Terminated);
        self.persist();

        let completed = self.completed_count.load(Ordering::SeqCst);
        let failed = self.failed_count.load(Ordering::SeqCst);
        info!("orchestrator {} ({}) terminated", self.id, self.orchestrator_type);

        OrchestratorResult {
            success: failed == 0,
            workflow_id: self.thought_tree_id,
            agents_spawned: completed + failed,
            agents_completed: completed,
            agents_failed: failed,
            total_cost_usd: self.total_cost_usd(),
            total_tokens: self.total_tokens(),
            execution_time_ms: self.elapsed_ms(),
            error_message: None,
            final_output,
            metadata: serde_json::json!({}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn opts() -> AgentOptions {
        AgentOptions {
            max_retries: 1,
            retry_backoff_cap: Duration::from_millis(5),
            timeout: Duration::from_secs(5),
            llm_model: "claude-3-5-haiku-20241022".to_string(),
        }
    }

    #[tokio::test]
    async fn spawn_respects_concurrency_quota() {
        let runtime = Runtime::for_testing().unwrap();
        let orch = BaseOrchestrator::new(runtime, "test", None, None, 1);
        orch.initialize();
        orch.activate();
        let first = orch.spawn_agent("task", opts(), None);
        assert!(first.is_some());
        let second = orch.spawn_agent("task", opts(), None);
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn unknown_kind_returns_none() {
        let runtime = Runtime::for_testing().unwrap();
        let orch = BaseOrchestrator::new(runtime, "test", None, None, 5);
        orch.initialize();
        assert!(orch.spawn_agent("not_a_kind", opts(), None).is_none());
    }

    #[tokio::test]
    async fn terminate_forces_remaining_agents_terminal() {
        let runtime = Runtime::for_testing().unwrap();
        let orch = BaseOrchestrator::new(runtime, "test", None, None, 5);
        orch.initialize();
        orch.activate();
        let agent = orch.spawn_agent("task", opts(), None).unwrap();
        let result = orch.terminate(serde_json::json!({})).await;
        assert_eq!(result.agents_failed, 1);
        assert_eq!(agent.state(), crate::agentflow::agent::AgentState::Terminated);
    }
}
