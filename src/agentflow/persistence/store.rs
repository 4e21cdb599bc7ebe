// src/agentflow/persistence/store.rs

//! Durable records for thought trees, agents, orchestrators, LLM interactions, tool
//! executions, and motivational state.
//!
//! Every method here is a single logical database operation: it acquires the connection lock,
//! does its work, and releases it, matching the "sessions are never shared across tasks" rule.
//! Methods are synchronous; callers on the async side that want non-blocking persistence (the
//! LLM interaction log, in particular) wrap the call in `tokio::task::spawn_blocking`.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::agentflow::error::{CoreError, CoreResult};

use super::schema::SCHEMA_SQL;

pub struct Store {
    conn: Mutex<Connection>,
}

#[derive(Debug, Clone)]
pub struct ThoughtTreeRecord {
    pub id: Uuid,
    pub goal: String,
    pub status: String,
    pub depth: u32,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct AgentRecord {
    pub id: Uuid,
    pub thought_tree_id: Uuid,
    pub kind: String,
    pub implementation_class: String,
    pub state: String,
    pub spawning_agent_id: Option<Uuid>,
    pub config_snapshot: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct LlmInteractionRecord {
    pub id: Uuid,
    pub agent_id: Option<Uuid>,
    pub thought_tree_id: Option<Uuid>,
    pub provider: String,
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub response_text: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub latency_ms: u64,
    pub cost_usd: f64,
    pub cost_without_cache_usd: f64,
    pub success: bool,
    pub error_message: Option<String>,
    pub retry_count: u32,
}

#[derive(Debug, Clone)]
pub struct ToolExecutionRecord {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub thought_tree_id: Uuid,
    pub tool_name: String,
    pub tool_class: String,
    pub input_params: serde_json::Value,
    pub output_result: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct MotivationalStateRecord {
    pub motivation_type: String,
    pub urgency: f64,
    pub satisfaction: f64,
    pub decay_rate: f64,
    pub boost_factor: f64,
    pub trigger_condition: serde_json::Value,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub last_satisfied_at: Option<DateTime<Utc>>,
    pub success_count: u64,
    pub failure_count: u64,
    pub success_rate: f64,
    pub active: bool,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct MotivationalTaskRecord {
    pub id: Uuid,
    pub motivation_type: String,
    pub thought_tree_id: Option<Uuid>,
    pub prompt: String,
    pub priority: f64,
    pub arbitration_score: f64,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct OrchestratorRecord {
    pub id: Uuid,
    pub parent_orchestrator_id: Option<Uuid>,
    pub thought_tree_id: Uuid,
    pub kind: String,
    pub status: String,
    pub current_active_agents: u32,
    pub max_concurrent_agents: u32,
    pub global_context: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct MemoryEntryRecord {
    pub id: Uuid,
    pub thought_tree_id: Option<Uuid>,
    pub scope: String,
    pub kind: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub relevance_score: f64,
    pub access_count: u64,
}

impl Store {
    pub fn open(path: &str) -> CoreResult<Self> {
        let conn = Connection::open(path)?;
        Ok(Store { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Store { conn: Mutex::new(conn) })
    }

    pub fn migrate(&self) -> CoreResult<()> {
        let conn = self.lock();
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("sqlite connection lock poisoned")
    }

    // --- ThoughtTree -----------------------------------------------------

    pub fn insert_thought_tree(&self, record: &ThoughtTreeRecord) -> CoreResult<()> {
        let now = Utc::now().to_rfc3339();
        self.lock().execute(
            "INSERT INTO thought_trees (id, goal, status, depth, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                record.id.to_string(),
                record.goal,
                record.status,
                record.depth,
                record.metadata.to_string(),
                now
            ],
        )?;
        Ok(())
    }

    /// Creates a default thought tree for `id` if none exists yet; used by the LLM client and
    /// agent runtime when a caller supplies a thought-tree id before the owning orchestrator
    /// has persisted one.
    pub fn ensure_thought_tree_exists(&self, id: Uuid, goal: &str) -> CoreResult<()> {
        let exists: Option<i64> = self
            .lock()
            .query_row("SELECT 1 FROM thought_trees WHERE id = ?1", params![id.to_string()], |row| row.get(0))
            .optional()?;
        if exists.is_none() {
            self.insert_thought_tree(&ThoughtTreeRecord {
                id,
                goal: goal.to_string(),
                status: "in_progress".to_string(),
                depth: 1,
                metadata: serde_json::json!({}),
            })?;
        }
        Ok(())
    }

    pub fn update_thought_tree_status(&self, id: Uuid, status: &str) -> CoreResult<()> {
        let now = Utc::now().to_rfc3339();
        self.lock().execute(
            "UPDATE thought_trees SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status, now, id.to_string()],
        )?;
        Ok(())
    }

    pub fn get_thought_tree(&self, id: Uuid) -> CoreResult<Option<ThoughtTreeRecord>> {
        self.lock()
            .query_row(
                "SELECT id, goal, status, depth, metadata FROM thought_trees WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    let id_str: String = row.get(0)?;
                    let metadata_str: String = row.get(4)?;
                    Ok(ThoughtTreeRecord {
                        id: Uuid::parse_str(&id_str).unwrap_or_default(),
                        goal: row.get(1)?,
                        status: row.get(2)?,
                        depth: row.get(3)?,
                        metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
                    })
                },
            )
            .optional()
            .map_err(CoreError::from)
    }

    pub fn force_cancel_nonterminal_thought_trees(&self, reason: &str) -> CoreResult<u64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE thought_trees SET status = 'cancelled', updated_at = ?1,
             metadata = json_set(metadata, '$.cleanup_reason', ?2)
             WHERE status IN ('pending', 'in_progress')",
            params![now, reason],
        )?;
        Ok(changed as u64)
    }

    // --- Agent -------------------------------------------------------------

    pub fn insert_agent(&self, record: &AgentRecord) -> CoreResult<()> {
        let now = Utc::now().to_rfc3339();
        self.lock().execute(
            "INSERT INTO agents (id, thought_tree_id, kind, implementation_class, state,
             spawning_agent_id, config_snapshot, runtime_state_snapshot, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '{}', ?8)",
            params![
                record.id.to_string(),
                record.thought_tree_id.to_string(),
                record.kind,
                record.implementation_class,
                record.state,
                record.spawning_agent_id.map(|id| id.to_string()),
                record.config_snapshot.to_string(),
                now
            ],
        )?;
        Ok(())
    }

    pub fn update_agent_state(&self, id: Uuid, state: &str, runtime_snapshot: &serde_json::Value) -> CoreResult<()> {
        self.lock().execute(
            "UPDATE agents SET state = ?1, runtime_state_snapshot = ?2 WHERE id = ?3",
            params![state, runtime_snapshot.to_string(), id.to_string()],
        )?;
        Ok(())
    }

    pub fn complete_agent(&self, id: Uuid, state: &str, runtime_snapshot: &serde_json::Value) -> CoreResult<()> {
        let now = Utc::now().to_rfc3339();
        self.lock().execute(
            "UPDATE agents SET state = ?1, runtime_state_snapshot = ?2, completed_at = ?3 WHERE id = ?4",
            params![state, runtime_snapshot.to_string(), now, id.to_string()],
        )?;
        Ok(())
    }

    pub fn force_terminate_nonterminal_agents(&self, reason: &str) -> CoreResult<u64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE agents SET state = 'terminated', completed_at = ?1,
             runtime_state_snapshot = json_set(runtime_state_snapshot, '$.cleanup_reason', ?2)
             WHERE state NOT IN ('completed', 'failed', 'terminated')",
            params![now, reason],
        )?;
        Ok(changed as u64)
    }

    // --- LLM interaction log ------------------------------------------------

    pub fn insert_llm_interaction(&self, record: &LlmInteractionRecord) -> CoreResult<()> {
        let now = Utc::now().to_rfc3339();
        self.lock().execute(
            "INSERT INTO llm_interactions (id, agent_id, thought_tree_id, provider, model,
             system_prompt, user_prompt, response_text, request_timestamp, response_timestamp,
             input_tokens, output_tokens, cache_creation_input_tokens, cache_read_input_tokens,
             latency_ms, cost_usd, cost_without_cache_usd, success, error_message, retry_count)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19)",
            params![
                record.id.to_string(),
                record.agent_id.map(|id| id.to_string()),
                record.thought_tree_id.map(|id| id.to_string()),
                record.provider,
                record.model,
                record.system_prompt,
                record.user_prompt,
                record.response_text,
                now,
                record.input_tokens as i64,
                record.output_tokens as i64,
                record.cache_creation_input_tokens as i64,
                record.cache_read_input_tokens as i64,
                record.latency_ms as i64,
                record.cost_usd,
                record.cost_without_cache_usd,
                record.success,
                record.error_message,
                record.retry_count
            ],
        )?;
        Ok(())
    }

    pub fn total_cost_for_thought_tree(&self, id: Uuid) -> CoreResult<f64> {
        let total: f64 = self.lock().query_row(
            "SELECT COALESCE(SUM(cost_usd), 0.0) FROM llm_interactions WHERE thought_tree_id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    // --- Tool execution log --------------------------------------------------

    pub fn insert_tool_execution(&self, record: &ToolExecutionRecord) -> CoreResult<()> {
        let now = Utc::now().to_rfc3339();
        self.lock().execute(
            "INSERT INTO tool_executions (id, agent_id, thought_tree_id, tool_name, tool_class,
             input_params, output_result, stdout, stderr, duration_ms, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            params![
                record.id.to_string(),
                record.agent_id.to_string(),
                record.thought_tree_id.to_string(),
                record.tool_name,
                record.tool_class,
                record.input_params.to_string(),
                record.output_result,
                record.stdout,
                record.stderr,
                record.duration_ms as i64,
                now
            ],
        )?;
        Ok(())
    }

    // --- Motivational state --------------------------------------------------

    pub fn upsert_motivational_state(&self, record: &MotivationalStateRecord) -> CoreResult<()> {
        self.lock().execute(
            "INSERT INTO motivational_states (motivation_type, urgency, satisfaction, decay_rate,
             boost_factor, trigger_condition, last_triggered_at, last_satisfied_at,
             success_count, failure_count, success_rate, active, metadata)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)
             ON CONFLICT(motivation_type) DO UPDATE SET
               urgency = excluded.urgency, satisfaction = excluded.satisfaction,
               decay_rate = excluded.decay_rate, boost_factor = excluded.boost_factor,
               trigger_condition = excluded.trigger_condition,
               last_triggered_at = excluded.last_triggered_at, last_satisfied_at = excluded.last_satisfied_at,
               success_count = excluded.success_count,
               failure_count = excluded.failure_count, success_rate = excluded.success_rate,
               active = excluded.active, metadata = excluded.metadata",
            params![
                record.motivation_type,
                record.urgency,
                record.satisfaction,
                record.decay_rate,
                record.boost_factor,
                record.trigger_condition.to_string(),
                record.last_triggered_at.map(|t| t.to_rfc3339()),
                record.last_satisfied_at.map(|t| t.to_rfc3339()),
                record.success_count as i64,
                record.failure_count as i64,
                record.success_rate,
                record.active,
                record.metadata.to_string()
            ],
        )?;
        Ok(())
    }

    /// Stamps `last_triggered_at` and/or `last_satisfied_at` to now without touching any other
    /// field; called by the engine tick immediately after arbitration picks a winner and again
    /// when the spawned workflow reports completion.
    pub fn touch_motivational_timestamps(&self, motivation_type: &str, triggered: bool, satisfied: bool) -> CoreResult<()> {
        let now = Utc::now().to_rfc3339();
        if triggered {
            self.lock().execute(
                "UPDATE motivational_states SET last_triggered_at = ?1 WHERE motivation_type = ?2",
                params![now, motivation_type],
            )?;
        }
        if satisfied {
            self.lock().execute(
                "UPDATE motivational_states SET last_satisfied_at = ?1 WHERE motivation_type = ?2",
                params![now, motivation_type],
            )?;
        }
        Ok(())
    }

    fn row_to_motivational_state(row: &rusqlite::Row) -> rusqlite::Result<MotivationalStateRecord> {
        let trigger_str: String = row.get(5)?;
        let last_triggered_str: Option<String> = row.get(6)?;
        let last_satisfied_str: Option<String> = row.get(7)?;
        let metadata_str: String = row.get(12)?;
        Ok(MotivationalStateRecord {
            motivation_type: row.get(0)?,
            urgency: row.get(1)?,
            satisfaction: row.get(2)?,
            decay_rate: row.get(3)?,
            boost_factor: row.get(4)?,
            trigger_condition: serde_json::from_str(&trigger_str).unwrap_or_default(),
            last_triggered_at: last_triggered_str.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|t| t.with_timezone(&Utc)),
            last_satisfied_at: last_satisfied_str.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|t| t.with_timezone(&Utc)),
            success_count: row.get::<_, i64>(8)? as u64,
            failure_count: row.get::<_, i64>(9)? as u64,
            success_rate: row.get(10)?,
            active: row.get(11)?,
            metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
        })
    }

    pub fn get_motivational_state(&self, motivation_type: &str) -> CoreResult<Option<MotivationalStateRecord>> {
        self.lock()
            .query_row(
                "SELECT motivation_type, urgency, satisfaction, decay_rate, boost_factor,
                 trigger_condition, last_triggered_at, last_satisfied_at,
                 success_count, failure_count, success_rate, active, metadata
                 FROM motivational_states WHERE motivation_type = ?1",
                params![motivation_type],
                Self::row_to_motivational_state,
            )
            .optional()
            .map_err(CoreError::from)
    }

    /// Merges `patch` into a drive's metadata JSON object without disturbing its other fields.
    pub fn patch_motivational_state_metadata(&self, motivation_type: &str, patch: &serde_json::Value) -> CoreResult<()> {
        let conn = self.lock();
        let current: Option<String> = conn
            .query_row("SELECT metadata FROM motivational_states WHERE motivation_type = ?1", params![motivation_type], |row| row.get(0))
            .optional()?;
        let mut merged: serde_json::Value = current.and_then(|s| serde_json::from_str(&s).ok()).unwrap_or(serde_json::json!({}));
        if let (Some(merged_obj), Some(patch_obj)) = (merged.as_object_mut(), patch.as_object()) {
            for (k, v) in patch_obj {
                merged_obj.insert(k.clone(), v.clone());
            }
        }
        conn.execute(
            "UPDATE motivational_states SET metadata = ?1 WHERE motivation_type = ?2",
            params![merged.to_string(), motivation_type],
        )?;
        Ok(())
    }

    pub fn list_motivational_states(&self) -> CoreResult<Vec<MotivationalStateRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT motivation_type, urgency, satisfaction, decay_rate, boost_factor,
             trigger_condition, last_triggered_at, last_satisfied_at,
             success_count, failure_count, success_rate, active, metadata
             FROM motivational_states",
        )?;
        let rows = stmt.query_map([], Self::row_to_motivational_state)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(CoreError::from)
    }

    // --- Motivational task --------------------------------------------------

    pub fn insert_motivational_task(&self, record: &MotivationalTaskRecord) -> CoreResult<()> {
        let now = Utc::now().to_rfc3339();
        self.lock().execute(
            "INSERT INTO motivational_tasks (id, motivation_type, thought_tree_id, prompt, priority,
             arbitration_score, status, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                record.id.to_string(),
                record.motivation_type,
                record.thought_tree_id.map(|id| id.to_string()),
                record.prompt,
                record.priority,
                record.arbitration_score,
                record.status,
                now
            ],
        )?;
        Ok(())
    }

    pub fn count_active_motivational_tasks(&self, motivation_type: &str) -> CoreResult<u64> {
        self.lock()
            .query_row(
                "SELECT COUNT(*) FROM motivational_tasks
                 WHERE motivation_type = ?1 AND status IN ('generated', 'queued', 'spawned', 'active')",
                params![motivation_type],
                |row| row.get::<_, i64>(0).map(|v| v as u64),
            )
            .map_err(CoreError::from)
    }

    pub fn complete_motivational_task(&self, id: Uuid, status: &str, outcome_score: f64, satisfaction_gain: f64) -> CoreResult<()> {
        let now = Utc::now().to_rfc3339();
        self.lock().execute(
            "UPDATE motivational_tasks SET status = ?1, completed_at = ?2, outcome_score = ?3,
             satisfaction_gain = ?4 WHERE id = ?5",
            params![status, now, outcome_score, satisfaction_gain, id.to_string()],
        )?;
        Ok(())
    }

    pub fn force_cancel_nonterminal_motivational_tasks(&self, reason: &str) -> CoreResult<u64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE motivational_tasks SET status = 'cancelled', completed_at = ?1
             WHERE status IN ('generated', 'queued', 'spawned', 'active')",
            params![now],
        )?;
        log::info!("startup cleanup cancelled {changed} motivational task(s): {reason}");
        Ok(changed as u64)
    }

    // --- Orchestrator --------------------------------------------------

    pub fn upsert_orchestrator(&self, record: &OrchestratorRecord) -> CoreResult<()> {
        let now = Utc::now().to_rfc3339();
        self.lock().execute(
            "INSERT INTO orchestrators (id, parent_orchestrator_id, thought_tree_id, kind, status,
             current_active_agents, max_concurrent_agents, global_context, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?9)
             ON CONFLICT(id) DO UPDATE SET
               status = excluded.status, current_active_agents = excluded.current_active_agents,
               global_context = excluded.global_context, updated_at = excluded.updated_at",
            params![
                record.id.to_string(),
                record.parent_orchestrator_id.map(|id| id.to_string()),
                record.thought_tree_id.to_string(),
                record.kind,
                record.status,
                record.current_active_agents,
                record.max_concurrent_agents,
                record.global_context.to_string(),
                now
            ],
        )?;
        Ok(())
    }

    pub fn force_terminate_nonterminal_orchestrators(&self, reason: &str) -> CoreResult<u64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE orchestrators SET status = 'terminated', updated_at = ?1,
             global_context = json_set(global_context, '$.cleanup_reason', ?2)
             WHERE status NOT IN ('completed', 'failed', 'terminated')",
            params![now, reason],
        )?;
        Ok(changed as u64)
    }

    // --- Memory entries --------------------------------------------------

    pub fn insert_memory_entry(&self, record: &MemoryEntryRecord) -> CoreResult<()> {
        let now = Utc::now().to_rfc3339();
        self.lock().execute(
            "INSERT INTO memory_entries (id, thought_tree_id, scope, kind, content, metadata,
             relevance_score, access_count, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?9)",
            params![
                record.id.to_string(),
                record.thought_tree_id.map(|id| id.to_string()),
                record.scope,
                record.kind,
                record.content,
                record.metadata.to_string(),
                record.relevance_score,
                record.access_count as i64,
                now
            ],
        )?;
        Ok(())
    }

    fn row_to_memory_entry(row: &rusqlite::Row) -> rusqlite::Result<MemoryEntryRecord> {
        let id_str: String = row.get(0)?;
        let thought_tree_str: Option<String> = row.get(1)?;
        let metadata_str: String = row.get(5)?;
        Ok(MemoryEntryRecord {
            id: Uuid::parse_str(&id_str).unwrap_or_default(),
            thought_tree_id: thought_tree_str.and_then(|s| Uuid::parse_str(&s).ok()),
            scope: row.get(2)?,
            kind: row.get(3)?,
            content: row.get(4)?,
            metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
            relevance_score: row.get(6)?,
            access_count: row.get::<_, i64>(7)? as u64,
        })
    }

    pub fn get_memory_entry(&self, id: Uuid) -> CoreResult<Option<MemoryEntryRecord>> {
        self.lock()
            .query_row(
                "SELECT id, thought_tree_id, scope, kind, content, metadata, relevance_score, access_count
                 FROM memory_entries WHERE id = ?1",
                params![id.to_string()],
                Self::row_to_memory_entry,
            )
            .optional()
            .map_err(CoreError::from)
    }

    pub fn bump_memory_access_count(&self, id: Uuid) -> CoreResult<()> {
        let now = Utc::now().to_rfc3339();
        self.lock().execute(
            "UPDATE memory_entries SET access_count = access_count + 1, updated_at = ?1 WHERE id = ?2",
            params![now, id.to_string()],
        )?;
        Ok(())
    }

    pub fn update_memory_entry_content(&self, id: Uuid, content: &str, metadata: &serde_json::Value) -> CoreResult<u64> {
        let now = Utc::now().to_rfc3339();
        let changed = self.lock().execute(
            "UPDATE memory_entries SET content = ?1, metadata = ?2, updated_at = ?3 WHERE id = ?4",
            params![content, metadata.to_string(), now, id.to_string()],
        )?;
        Ok(changed as u64)
    }

    pub fn delete_memory_entry(&self, id: Uuid) -> CoreResult<u64> {
        let changed = self.lock().execute("DELETE FROM memory_entries WHERE id = ?1", params![id.to_string()])?;
        Ok(changed as u64)
    }

    /// Scope/kind-filtered substring search over memory content, newest first. Relevance is a
    /// coarse static score (1.0 on substring hit) rather than semantic similarity — a richer
    /// ranking would need embeddings, which nothing in this crate's dependency stack provides.
    pub fn search_memory_entries(
        &self,
        query_text: &str,
        scopes: Option<&[String]>,
        kinds: Option<&[String]>,
        min_relevance: f64,
        max_results: u32,
    ) -> CoreResult<Vec<MemoryEntryRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, thought_tree_id, scope, kind, content, metadata, relevance_score, access_count
             FROM memory_entries
             WHERE relevance_score >= ?1 AND (?2 = '' OR content LIKE '%' || ?2 || '%')
             ORDER BY created_at DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![min_relevance, query_text, max_results as i64], Self::row_to_memory_entry)?;
        let mut results = rows.collect::<Result<Vec<_>, _>>().map_err(CoreError::from)?;
        if let Some(scopes) = scopes {
            results.retain(|r| scopes.iter().any(|s| s == &r.scope));
        }
        if let Some(kinds) = kinds {
            results.retain(|r| kinds.iter().any(|k| k == &r.kind));
        }
        Ok(results)
    }
}
