// src/agentflow/agent/mod.rs

//! Agent lifecycle state machine, retry/timeout wrapping, persistence, and statistics.
//!
//! [`AgentRuntime`] is the lifecycle driver shared by every specialization; the specializations
//! themselves (`task`, `council`, `validator`, `memory`, `social`) implement
//! [`AgentSpecialization`] and contain only domain logic.

pub mod council;
pub mod memory;
pub mod social;
pub mod task;
pub mod validator;

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use uuid::Uuid;

use crate::agentflow::error::{CoreError, CoreResult};
use crate::agentflow::persistence::store::AgentRecord;
use crate::agentflow::runtime::Runtime;

/// Lifecycle states. Transitions are validated by [`AgentRuntime`]; anything not listed in
/// `legal_transition` is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Spawned,
    Active,
    Waiting,
    Coordinating,
    Completed,
    Failed,
    Terminated,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Spawned => "spawned",
            AgentState::Active => "active",
            AgentState::Waiting => "waiting",
            AgentState::Coordinating => "coordinating",
            AgentState::Completed => "completed",
            AgentState::Failed => "failed",
            AgentState::Terminated => "terminated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Completed | AgentState::Failed | AgentState::Terminated)
    }

    pub fn is_executable(&self) -> bool {
        matches!(self, AgentState::Active | AgentState::Waiting | AgentState::Coordinating)
    }

    fn legal_transition(&self, to: AgentState) -> bool {
        matches!(
            (self, to),
            (AgentState::Spawned, AgentState::Active)
                | (AgentState::Active, AgentState::Waiting)
                | (AgentState::Waiting, AgentState::Coordinating)
                | (AgentState::Coordinating, AgentState::Active)
                | (AgentState::Active, AgentState::Completed)
                | (AgentState::Active, AgentState::Failed)
                | (AgentState::Waiting, AgentState::Completed)
                | (AgentState::Waiting, AgentState::Failed)
                | (AgentState::Coordinating, AgentState::Completed)
                | (AgentState::Coordinating, AgentState::Failed)
                | (_, AgentState::Terminated)
        )
    }
}

/// The closed set of agent kinds named in the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Task,
    Council,
    Validator,
    Memory,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Task => "task",
            AgentKind::Council => "council",
            AgentKind::Validator => "validator",
            AgentKind::Memory => "memory",
        }
    }
}

/// The outcome a specialization hands back to [`AgentRuntime::execute`] before retry/timeout
/// bookkeeping is layered on top.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub success: bool,
    pub content: String,
    pub metadata: serde_json::Value,
    pub error_message: Option<String>,
    pub tokens_used: u64,
    pub cost_usd: f64,
}

impl AgentOutcome {
    pub fn ok(content: impl Into<String>, tokens_used: u64, cost_usd: f64) -> Self {
        AgentOutcome {
            success: true,
            content: content.into(),
            metadata: serde_json::json!({}),
            error_message: None,
            tokens_used,
            cost_usd,
        }
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        AgentOutcome {
            success: false,
            content: String::new(),
            metadata: serde_json::json!({}),
            error_message: Some(error_message.into()),
            tokens_used: 0,
            cost_usd: 0.0,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// The final result returned to whatever orchestrator called `execute`, including the
/// retry/timeout bookkeeping the runtime layered on top of the specialization's outcome.
#[derive(Debug, Clone)]
pub struct AgentResult {
    pub success: bool,
    pub content: String,
    pub metadata: serde_json::Value,
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
    pub tokens_used: u64,
    pub cost_usd: f64,
}

/// Everything a specialization needs to do its work: the shared runtime, and identifiers to
/// stamp on every downstream LLM/tool call.
pub struct AgentExecutionContext {
    pub runtime: Runtime,
    pub agent_id: Uuid,
    pub thought_tree_id: Uuid,
    pub llm_model: String,
}

/// Domain logic plugged into [`AgentRuntime`]. Specializations never manage retries, timeouts,
/// or state transitions themselves — the runtime does that uniformly.
#[async_trait]
pub trait AgentSpecialization: Send + Sync {
    fn kind(&self) -> AgentKind;
    fn implementation_class(&self) -> &'static str;
    async fn validate_input(&self, input: &serde_json::Value) -> bool;
    async fn execute(&self, ctx: &AgentExecutionContext, input: serde_json::Value) -> AgentOutcome;
}

/// Per-agent tunables; defaults come from [`crate::agentflow::config::AgentConfig`].
#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub max_retries: u32,
    pub retry_backoff_cap: Duration,
    pub timeout: Duration,
    pub llm_model: String,
}

/// The lifecycle driver. One `AgentRuntime` wraps exactly one specialization and owns its
/// state machine, persistence, and statistics for its whole lifetime.
pub struct AgentRuntime {
    pub id: Uuid,
    pub thought_tree_id: Uuid,
    pub parent_agent_id: Option<Uuid>,
    state: std::sync::Mutex<AgentState>,
    retry_count: AtomicU32,
    options: AgentOptions,
    specialization: Box<dyn AgentSpecialization>,
    runtime: Runtime,
    total_tokens_used: std::sync::atomic::AtomicU64,
    total_cost_millicents: std::sync::atomic::AtomicU64,
    execution_count: AtomicU32,
    success_count: AtomicU32,
}

impl AgentRuntime {
    pub fn new(
        runtime: Runtime,
        thought_tree_id: Uuid,
        parent_agent_id: Option<Uuid>,
        options: AgentOptions,
        specialization: Box<dyn AgentSpecialization>,
    ) -> Self {
        AgentRuntime {
            id: Uuid::new_v4(),
            thought_tree_id,
            parent_agent_id,
            state: std::sync::Mutex::new(AgentState::Spawned),
            retry_count: AtomicU32::new(0),
            options,
            specialization,
            runtime,
            total_tokens_used: std::sync::atomic::AtomicU64::new(0),
            total_cost_millicents: std::sync::atomic::AtomicU64::new(0),
            execution_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> AgentState {
        *self.state.lock().expect("agent state lock poisoned")
    }

    fn set_state(&self, new_state: AgentState) -> CoreResult<()> {
        let mut state = self.state.lock().expect("agent state lock poisoned");
        if !state.legal_transition(new_state) {
            return Err(CoreError::internal(format!(
                "illegal agent state transition from {:?} to {:?}",
                *state, new_state
            )));
        }
        *state = new_state;
        Ok(())
    }

    fn persist(&self) {
        let snapshot = serde_json::json!({
            "current_state": self.state().as_str(),
            "retry_count": self.retry_count.load(Ordering::Relaxed),
            "total_tokens_used": self.total_tokens_used.load(Ordering::Relaxed),
        });
        if self.state() == AgentState::Spawned {
            let record = AgentRecord {
                id: self.id,
                thought_tree_id: self.thought_tree_id,
                kind: self.specialization.kind().as_str().to_string(),
                implementation_class: self.specialization.implementation_class().to_string(),
                state: self.state().as_str().to_string(),
                spawning_agent_id: self.parent_agent_id,
                config_snapshot: serde_json::json!({
                    "max_retries": self.options.max_retries,
                    "timeout_seconds": self.options.timeout.as_secs(),
                    "llm_model": self.options.llm_model,
                }),
            };
            if let Err(e) = self.runtime.store.insert_agent(&record) {
                warn!("failed to persist new agent {}: {e}", self.id);
            }
            return;
        }
        if self.state().is_terminal() {
            if let Err(e) = self.runtime.store.complete_agent(self.id, self.state().as_str(), &snapshot) {
                warn!("failed to persist agent completion {}: {e}", self.id);
            }
        } else if let Err(e) = self.runtime.store.update_agent_state(self.id, self.state().as_str(), &snapshot) {
            warn!("failed to persist agent state {}: {e}", self.id);
        }
    }

    /// Creates the thought tree (if missing), persists the spawned-state row, then runs
    /// specialization-level setup and transitions to `active`.
    pub fn initialize(&self) -> bool {
        if let Err(e) = self
            .runtime
            .store
            .ensure_thought_tree_exists(self.thought_tree_id, &format!("Agent {} operations", self.specialization.kind().as_str()))
        {
            error!("failed to ensure thought tree for agent {}: {e}", self.id);
        }
        self.persist();
        match self.set_state(AgentState::Active) {
            Ok(()) => {
                self.persist();
                info!("agent {} ({}) initialized", self.id, self.specialization.kind().as_str());
                true
            }
            Err(e) => {
                error!("agent {} failed to activate: {e}", self.id);
                let _ = self.set_state(AgentState::Failed);
                self.persist();
                false
            }
        }
    }

    pub fn transition_to_waiting(&self) -> CoreResult<()> {
        self.set_state(AgentState::Waiting)?;
        self.persist();
        Ok(())
    }

    pub fn transition_to_coordinating(&self) -> CoreResult<()> {
        self.set_state(AgentState::Coordinating)?;
        self.persist();
        Ok(())
    }

    pub fn return_to_active(&self) -> CoreResult<()> {
        self.set_state(AgentState::Active)?;
        self.persist();
        Ok(())
    }

    pub fn terminate(&self) {
        if self.set_state(AgentState::Terminated).is_ok() {
            self.persist();
            info!("agent {} terminated", self.id);
        }
    }

    /// Validates input, confirms state, delegates to the specialization, retries with
    /// exponential backoff capped at `retry_backoff_cap`, times out each attempt, and
    /// transitions to a terminal state on completion or exhaustion.
    pub async fn execute(&self, input: serde_json::Value) -> AgentResult {
        let started = Instant::now();

        if !self.specialization.validate_input(&input).await {
            return AgentResult {
                success: false,
                content: String::new(),
                metadata: serde_json::json!({}),
                error_message: Some("input validation failed".to_string()),
                execution_time_ms: 0,
                tokens_used: 0,
                cost_usd: 0.0,
            };
        }

        if !self.state().is_executable() {
            return AgentResult {
                success: false,
                content: String::new(),
                metadata: serde_json::json!({}),
                error_message: Some(format!("agent not in executable state: {:?}", self.state())),
                execution_time_ms: 0,
                tokens_used: 0,
                cost_usd: 0.0,
            };
        }

        self.persist();

        let ctx = AgentExecutionContext {
            runtime: self.runtime.clone(),
            agent_id: self.id,
            thought_tree_id: self.thought_tree_id,
            llm_model: self.options.llm_model.clone(),
        };

        let mut last_error = String::new();
        let mut accumulated_tokens = 0u64;
        let mut accumulated_cost = 0.0f64;
        let mut outcome = AgentOutcome::failed("never attempted");

        for attempt in 0..=self.options.max_retries {
            self.retry_count.store(attempt, Ordering::Relaxed);
            let attempt_result = timeout(self.options.timeout, self.specialization.execute(&ctx, input.clone())).await;

            match attempt_result {
                Ok(out) => {
                    accumulated_tokens += out.tokens_used;
                    accumulated_cost += out.cost_usd;
                    if out.success {
                        outcome = out;
                        break;
                    }
                    last_error = out.error_message.clone().unwrap_or_default();
                    outcome = out;
                }
                Err(_) => {
                    last_error = format!("execution timeout after {}s", self.options.timeout.as_secs());
                    warn!("agent {} timed out on attempt {attempt}", self.id);
                }
            }

            if attempt < self.options.max_retries {
                let delay = Duration::from_secs_f64(2f64.powi(attempt as i32)).min(self.options.retry_backoff_cap);
                tokio::time::sleep(delay).await;
            }
        }

        self.execution_count.fetch_add(1, Ordering::Relaxed);
        if outcome.success {
            self.success_count.fetch_add(1, Ordering::Relaxed);
            let _ = self.set_state(AgentState::Completed);
        } else {
            outcome.error_message = Some(format!(
                "failed after {} attempt(s). Last error: {}",
                self.options.max_retries + 1,
                last_error
            ));
            let _ = self.set_state(AgentState::Failed);
        }
        self.persist();

        self.total_tokens_used.fetch_add(accumulated_tokens, Ordering::Relaxed);
        self.total_cost_millicents
            .fetch_add((accumulated_cost * 100_000.0) as u64, Ordering::Relaxed);

        AgentResult {
            success: outcome.success,
            content: outcome.content,
            metadata: outcome.metadata,
            error_message: outcome.error_message,
            execution_time_ms: started.elapsed().as_millis() as u64,
            tokens_used: accumulated_tokens,
            cost_usd: accumulated_cost,
        }
    }

    pub fn statistics(&self) -> AgentStatistics {
        let executions = self.execution_count.load(Ordering::Relaxed);
        let successes = self.success_count.load(Ordering::Relaxed);
        AgentStatistics {
            agent_id: self.id,
            kind: self.specialization.kind(),
            state: self.state(),
            total_executions: executions,
            total_tokens_used: self.total_tokens_used.load(Ordering::Relaxed),
            total_cost_usd: self.total_cost_millicents.load(Ordering::Relaxed) as f64 / 100_000.0,
            retry_count: self.retry_count.load(Ordering::Relaxed),
            success_rate: if executions == 0 { 0.0 } else { successes as f64 / executions as f64 },
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentStatistics {
    pub agent_id: Uuid,
    pub kind: AgentKind,
    pub state: AgentState,
    pub total_executions: u32,
    pub total_tokens_used: u64,
    pub total_cost_usd: f64,
    pub retry_count: u32,
    pub success_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysSucceeds;

    #[async_trait]
    impl AgentSpecialization for AlwaysSucceeds {
        fn kind(&self) -> AgentKind {
            AgentKind::Task
        }
        fn implementation_class(&self) -> &'static str {
            "AlwaysSucceeds"
        }
        async fn validate_input(&self, _input: &serde_json::Value) -> bool {
            true
        }
        async fn execute(&self, _ctx: &AgentExecutionContext, _input: serde_json::Value) -> AgentOutcome {
            AgentOutcome::ok("done", 10, 0.001)
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl AgentSpecialization for AlwaysFails {
        fn kind(&self) -> AgentKind {
            AgentKind::Task
        }
        fn implementation_class(&self) -> &'static str {
            "AlwaysFails"
        }
        async fn validate_input(&self, _input: &serde_json::Value) -> bool {
            true
        }
        async fn execute(&self, _ctx: &AgentExecutionContext, _input: serde_json::Value) -> AgentOutcome {
            AgentOutcome::failed("boom")
        }
    }

    fn default_options() -> AgentOptions {
        AgentOptions {
            max_retries: 2,
            retry_backoff_cap: Duration::from_millis(5),
            timeout: Duration::from_secs(5),
            llm_model: "claude-3-5-haiku-20241022".to_string(),
        }
    }

    #[tokio::test]
    async fn execute_reaches_completed_on_success() {
        let runtime = Runtime::for_testing().unwrap();
        let agent = AgentRuntime::new(runtime, Uuid::new_v4(), None, default_options(), Box::new(AlwaysSucceeds));
        assert!(agent.initialize());
        let result = agent.execute(serde_json::json!({})).await;
        assert!(result.success);
        assert_eq!(agent.state(), AgentState::Completed);
    }

    #[tokio::test]
    async fn execute_exhausts_retries_then_fails() {
        let runtime = Runtime::for_testing().unwrap();
        let agent = AgentRuntime::new(runtime, Uuid::new_v4(), None, default_options(), Box::new(AlwaysFails));
        assert!(agent.initialize());
        let result = agent.execute(serde_json::json!({})).await;
        assert!(!result.success);
        assert_eq!(agent.state(), AgentState::Failed);
    }

    #[tokio::test]
    async fn terminal_state_is_reached_once() {
        let runtime = Runtime::for_testing().unwrap();
        let agent = AgentRuntime::new(runtime, Uuid::new_v4(), None, default_options(), Box::new(AlwaysSucceeds));
        agent.initialize();
        agent.execute(serde_json::json!({})).await;
        assert_eq!(agent.state(), AgentState::Completed);
        // A second execute call should be rejected because Completed isn't executable.
        let result = agent.execute(serde_json::json!({})).await;
        assert!(!result.success);
        assert_eq!(agent.state(), AgentState::Completed);
    }

    #[test]
    fn only_the_documented_edges_are_legal() {
        assert!(AgentState::Active.legal_transition(AgentState::Waiting));
        assert!(AgentState::Waiting.legal_transition(AgentState::Coordinating));
        assert!(AgentState::Coordinating.legal_transition(AgentState::Active));
        assert!(!AgentState::Waiting.legal_transition(AgentState::Active));
        assert!(!AgentState::Spawned.legal_transition(AgentState::Coordinating));
    }
}
