// src/agentflow/motivation/engine.rs

//! The motivational tick loop: decay, trigger boosts, arbitrate among drives, spawn the winner
//! as a workflow through the top-level orchestrator, and feed its outcome back into the drive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::agentflow::config::MotivationConfig;
use crate::agentflow::orchestration::{TopLevelOrchestrator, WorkflowInput, WorkflowInputType};
use crate::agentflow::persistence::store::{MotivationalStateRecord, MotivationalTaskRecord};
use crate::agentflow::runtime::Runtime;

use super::state::{apply_feedback, apply_trigger, arbitration_score, boost, decay, pick_winner, Candidate};

/// Builds the prompt handed to the top-level orchestrator for a winning drive. Kept a pure
/// function so the template is directly testable without spinning up an engine.
pub fn prompt_for_drive(motivation_type: &str, metadata: &serde_json::Value) -> String {
    let hint = metadata.get("prompt_hint").and_then(|v| v.as_str()).unwrap_or("");
    if hint.is_empty() {
        format!("Autonomously pursue the standing drive: {motivation_type}")
    } else {
        format!("Autonomously pursue the standing drive: {motivation_type}\n{hint}")
    }
}

/// Returns `false` (engine must not spawn the guarded operation) when a safety-gated drive has
/// already hit its per-hour post cap, per the drive's own `posts_this_hour` metadata counter.
pub fn safety_gate_allows(metadata: &serde_json::Value, max_posts_per_hour: u32) -> bool {
    let posts_this_hour = metadata.get("posts_this_hour").and_then(|v| v.as_u64()).unwrap_or(0);
    posts_this_hour < max_posts_per_hour as u64
}

pub struct EngineStatus {
    pub running: bool,
    pub tick_interval_secs: f64,
    pub max_concurrent_tasks_per_drive: usize,
    pub min_arbitration_threshold: f64,
    pub safety_gate_enabled: bool,
}

/// Owns the tick loop's lifecycle. `start`/`stop` are idempotent: calling `stop` twice yields
/// one successful stop and one "not running" response, never two stops.
pub struct MotivationalEngine {
    runtime: Runtime,
    config: Mutex<MotivationConfig>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MotivationalEngine {
    pub fn new(runtime: Runtime) -> Self {
        let config = runtime.config.motivation.clone();
        MotivationalEngine { runtime, config: Mutex::new(config), running: Arc::new(AtomicBool::new(false)), handle: Mutex::new(None) }
    }

    pub async fn status(&self) -> EngineStatus {
        let config = self.config.lock().await;
        EngineStatus {
            running: self.running.load(Ordering::SeqCst),
            tick_interval_secs: config.tick_interval.as_secs_f64(),
            max_concurrent_tasks_per_drive: config.max_concurrent_tasks_per_drive,
            min_arbitration_threshold: config.min_arbitration_threshold,
            safety_gate_enabled: config.safety_gate_enabled,
        }
    }

    pub async fn update_config(&self, new_config: MotivationConfig) {
        *self.config.lock().await = new_config;
    }

    /// Starts the background tick loop. Returns `true` if it was actually started, `false` if
    /// it was already running.
    pub async fn start(self: &Arc<Self>) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                if !engine.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = engine.tick().await {
                    warn!("motivational tick failed: {e}");
                }
                let interval = engine.config.lock().await.tick_interval;
                tokio::time::sleep(interval).await;
            }
        });
        *self.handle.lock().await = Some(handle);
        info!("motivational engine started");
        true
    }

    /// Stops the tick loop. Returns `true` if it was running and is now stopped, `false` if it
    /// was already stopped (idempotent).
    pub async fn stop(&self) -> bool {
        if !self.running.swap(false, Ordering::SeqCst) {
            return false;
        }
        if let Some(handle) = self.handle.lock().await.take() {
            handle.abort();
        }
        info!("motivational engine stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Applies an external boost to a named drive, persists it, and records the reason in
    /// metadata. Safe to call whether or not the engine's tick loop is running.
    pub async fn boost_drive(&self, motivation_type: &str, amount: f64, reason: Option<&str>, extra_metadata: serde_json::Value) -> crate::agentflow::error::CoreResult<()> {
        let Some(mut record) = self.runtime.store.get_motivational_state(motivation_type)? else {
            return Err(crate::agentflow::error::CoreError::not_found(format!("unknown motivation_type: {motivation_type}")));
        };
        boost(&mut record, amount);
        let mut patch = extra_metadata;
        if let Some(obj) = patch.as_object_mut() {
            obj.insert("last_boost_reason".to_string(), serde_json::json!(reason.unwrap_or("")));
            obj.insert("last_boost_amount".to_string(), serde_json::json!(amount));
            obj.insert("last_boost_at".to_string(), serde_json::json!(Utc::now().to_rfc3339()));
        }
        self.runtime.store.patch_motivational_state_metadata(motivation_type, &patch)?;
        self.runtime.store.upsert_motivational_state(&record)?;
        Ok(())
    }

    async fn active_task_count(&self, motivation_type: &str) -> usize {
        self.runtime.store.count_active_motivational_tasks(motivation_type).unwrap_or(0) as usize
    }

    /// Runs exactly one tick: decay every active drive, apply trigger boosts, score and
    /// arbitrate, then spawn the winner (subject to the concurrency cap and safety gate).
    pub async fn tick(&self) -> crate::agentflow::error::CoreResult<()> {
        let config = self.config.lock().await.clone();
        let mut records = self.runtime.store.list_motivational_states()?;
        let now = Utc::now();

        let mut candidates = Vec::new();
        for record in records.iter_mut() {
            if !record.active {
                continue;
            }
            let dt_secs = config.tick_interval.as_secs_f64();
            decay(record, dt_secs, config.satisfaction_decay_epsilon);

            let seconds_since_triggered = record.last_triggered_at.map(|t| (now - t).num_seconds() as f64);
            let triggered = apply_trigger(record, seconds_since_triggered);
            if triggered {
                self.runtime.store.touch_motivational_timestamps(&record.motivation_type, true, false)?;
            }

            self.runtime.store.upsert_motivational_state(record)?;

            if self.active_task_count(&record.motivation_type).await >= config.max_concurrent_tasks_per_drive {
                continue;
            }
            if config.safety_gate_enabled && !safety_gate_allows(&record.metadata, config.max_posts_per_hour) {
                continue;
            }

            let score = arbitration_score(record, record.last_triggered_at, now, &config);
            candidates.push(Candidate { motivation_type: record.motivation_type.clone(), score });
        }

        let Some(winner) = pick_winner(&candidates, config.min_arbitration_threshold) else {
            return Ok(());
        };
        let winner_type = winner.motivation_type.clone();
        let Some(record) = records.into_iter().find(|r| r.motivation_type == winner_type) else {
            return Ok(());
        };

        self.spawn_drive_workflow(record).await
    }

    async fn spawn_drive_workflow(&self, record: MotivationalStateRecord) -> crate::agentflow::error::CoreResult<()> {
        let prompt = prompt_for_drive(&record.motivation_type, &record.metadata);
        let orchestrator = Arc::new(TopLevelOrchestrator::new(
            self.runtime.clone(),
            self.runtime.config.orchestration.max_concurrent_agents as u32,
            self.runtime.config.orchestration.max_depth,
        ));
        orchestrator.initialize();

        let task_id = uuid::Uuid::new_v4();
        self.runtime.store.insert_motivational_task(&MotivationalTaskRecord {
            id: task_id,
            motivation_type: record.motivation_type.clone(),
            thought_tree_id: None,
            prompt: prompt.clone(),
            priority: record.urgency,
            arbitration_score: arbitration_score(&record, record.last_triggered_at, Utc::now(), &*self.config.lock().await),
            status: "spawned".to_string(),
        })?;

        let input = WorkflowInput {
            input_type: WorkflowInputType::UserPrompt,
            content: serde_json::json!({"prompt": prompt}),
            require_council_consensus: false,
            validation_level: None,
            optimization_focus: None,
        };
        let result = orchestrator.execute_workflow(input).await;

        let gain = if result.success { 0.3 } else { 0.05 };
        let mut updated = self.runtime.store.get_motivational_state(&record.motivation_type)?.unwrap_or(record);
        apply_feedback(&mut updated, gain, result.success);
        self.runtime.store.upsert_motivational_state(&updated)?;
        self.runtime.store.touch_motivational_timestamps(&updated.motivation_type, false, result.success)?;
        self.runtime.store.complete_motivational_task(
            task_id,
            if result.success { "completed" } else { "failed" },
            if result.success { 1.0 } else { 0.0 },
            gain,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_hint_when_present() {
        let prompt = prompt_for_drive("monitor_social_network", &serde_json::json!({"prompt_hint": "check recent claims"}));
        assert!(prompt.contains("monitor_social_network"));
        assert!(prompt.contains("check recent claims"));
    }

    #[test]
    fn safety_gate_blocks_at_cap() {
        let metadata = serde_json::json!({"posts_this_hour": 4});
        assert!(!safety_gate_allows(&metadata, 4));
        assert!(safety_gate_allows(&metadata, 5));
    }

    #[tokio::test]
    async fn start_stop_is_idempotent() {
        let runtime = Runtime::for_testing().unwrap();
        let engine = Arc::new(MotivationalEngine::new(runtime));
        assert!(engine.start().await);
        assert!(!engine.start().await);
        assert!(engine.stop().await);
        assert!(!engine.stop().await);
    }

    #[tokio::test]
    async fn boosting_unknown_drive_returns_not_found() {
        let runtime = Runtime::for_testing().unwrap();
        let engine = MotivationalEngine::new(runtime);
        let result = engine.boost_drive("no_such_drive", 0.1, None, serde_json::json!({})).await;
        assert!(result.is_err());
    }
}
