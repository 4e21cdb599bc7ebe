// src/agentflow/persistence/schema.rs

//! Relational schema: one table per entity in the data model, keyed by UUID, with the range
//! constraints and indexes the design calls for.

pub const SCHEMA_SQL: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS thought_trees (
    id TEXT PRIMARY KEY,
    goal TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('pending','in_progress','completed','failed','cancelled')),
    depth INTEGER NOT NULL CHECK (depth >= 1),
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_thought_trees_status ON thought_trees(status);
CREATE INDEX IF NOT EXISTS idx_thought_trees_created_at ON thought_trees(created_at);

CREATE TABLE IF NOT EXISTS agents (
    id TEXT PRIMARY KEY,
    thought_tree_id TEXT NOT NULL REFERENCES thought_trees(id),
    kind TEXT NOT NULL CHECK (kind IN ('task','council','validator','memory')),
    implementation_class TEXT NOT NULL,
    state TEXT NOT NULL CHECK (state IN ('spawned','active','waiting','coordinating','completed','failed','terminated')),
    spawning_agent_id TEXT REFERENCES agents(id),
    config_snapshot TEXT NOT NULL DEFAULT '{}',
    runtime_state_snapshot TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    completed_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_agents_status ON agents(state);
CREATE INDEX IF NOT EXISTS idx_agents_created_at ON agents(created_at);
CREATE INDEX IF NOT EXISTS idx_agents_thought_tree ON agents(thought_tree_id);

CREATE TABLE IF NOT EXISTS orchestrators (
    id TEXT PRIMARY KEY,
    parent_orchestrator_id TEXT REFERENCES orchestrators(id),
    thought_tree_id TEXT NOT NULL REFERENCES thought_trees(id),
    kind TEXT NOT NULL CHECK (kind IN ('top_level','sub')),
    status TEXT NOT NULL CHECK (status IN ('initializing','active','paused','completed','failed','terminated')),
    current_active_agents INTEGER NOT NULL DEFAULT 0 CHECK (current_active_agents >= 0),
    max_concurrent_agents INTEGER NOT NULL CHECK (max_concurrent_agents >= 1),
    global_context TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_orchestrators_status ON orchestrators(status);
CREATE INDEX IF NOT EXISTS idx_orchestrators_thought_tree ON orchestrators(thought_tree_id);

CREATE TABLE IF NOT EXISTS llm_interactions (
    id TEXT PRIMARY KEY,
    agent_id TEXT REFERENCES agents(id),
    thought_tree_id TEXT REFERENCES thought_trees(id),
    provider TEXT NOT NULL,
    model TEXT NOT NULL,
    system_prompt TEXT NOT NULL DEFAULT '',
    user_prompt TEXT NOT NULL DEFAULT '',
    response_text TEXT,
    request_timestamp TEXT NOT NULL,
    response_timestamp TEXT,
    input_tokens INTEGER NOT NULL DEFAULT 0,
    output_tokens INTEGER NOT NULL DEFAULT 0,
    cache_creation_input_tokens INTEGER NOT NULL DEFAULT 0,
    cache_read_input_tokens INTEGER NOT NULL DEFAULT 0,
    latency_ms INTEGER NOT NULL DEFAULT 0,
    cost_usd REAL NOT NULL DEFAULT 0,
    cost_without_cache_usd REAL NOT NULL DEFAULT 0,
    success INTEGER NOT NULL,
    error_message TEXT,
    retry_count INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_llm_interactions_thought_tree ON llm_interactions(thought_tree_id);
CREATE INDEX IF NOT EXISTS idx_llm_interactions_created_at ON llm_interactions(request_timestamp);

CREATE TABLE IF NOT EXISTS tool_executions (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL REFERENCES agents(id),
    thought_tree_id TEXT NOT NULL REFERENCES thought_trees(id),
    tool_name TEXT NOT NULL,
    tool_class TEXT NOT NULL,
    input_params TEXT NOT NULL DEFAULT '{}',
    output_result TEXT,
    stdout TEXT,
    stderr TEXT,
    duration_ms INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tool_executions_thought_tree ON tool_executions(thought_tree_id);

CREATE TABLE IF NOT EXISTS motivational_states (
    motivation_type TEXT PRIMARY KEY,
    urgency REAL NOT NULL CHECK (urgency >= 0 AND urgency <= 1),
    satisfaction REAL NOT NULL CHECK (satisfaction >= 0 AND satisfaction <= 1),
    decay_rate REAL NOT NULL CHECK (decay_rate >= 0 AND decay_rate <= 1),
    boost_factor REAL NOT NULL DEFAULT 0,
    trigger_condition TEXT NOT NULL DEFAULT '{}',
    last_triggered_at TEXT,
    last_satisfied_at TEXT,
    success_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0,
    success_rate REAL NOT NULL DEFAULT 0 CHECK (success_rate >= 0 AND success_rate <= 1),
    active INTEGER NOT NULL DEFAULT 1,
    metadata TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_motivational_states_type ON motivational_states(motivation_type);

CREATE TABLE IF NOT EXISTS motivational_tasks (
    id TEXT PRIMARY KEY,
    motivation_type TEXT NOT NULL REFERENCES motivational_states(motivation_type),
    thought_tree_id TEXT REFERENCES thought_trees(id),
    prompt TEXT NOT NULL,
    priority REAL NOT NULL,
    arbitration_score REAL NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('generated','queued','spawned','active','completed','failed','cancelled')),
    created_at TEXT NOT NULL,
    completed_at TEXT,
    outcome_score REAL,
    satisfaction_gain REAL
);
CREATE INDEX IF NOT EXISTS idx_motivational_tasks_status ON motivational_tasks(status);
CREATE INDEX IF NOT EXISTS idx_motivational_tasks_motivation_type ON motivational_tasks(motivation_type);

CREATE TABLE IF NOT EXISTS memory_entries (
    id TEXT PRIMARY KEY,
    thought_tree_id TEXT REFERENCES thought_trees(id),
    scope TEXT NOT NULL CHECK (scope IN ('agent','session','thought_tree','global')),
    kind TEXT NOT NULL CHECK (kind IN ('context','learning','communication','decision','performance')),
    content TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    relevance_score REAL NOT NULL DEFAULT 1.0 CHECK (relevance_score >= 0 AND relevance_score <= 1),
    access_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_memory_entries_scope ON memory_entries(scope);
CREATE INDEX IF NOT EXISTS idx_memory_entries_kind ON memory_entries(kind);
CREATE INDEX IF NOT EXISTS idx_memory_entries_thought_tree ON memory_entries(thought_tree_id);
"#;
