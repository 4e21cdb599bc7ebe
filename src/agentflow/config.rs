// src/agentflow/config.rs

//! Environment-driven configuration.
//!
//! Every tunable named in the design (retry counts, depth caps, arbitration weights, ...) has a
//! default here and can be overridden through an environment variable. Nothing reads the
//! environment outside this module; every other module receives its settings already parsed.

use std::env;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// LLM client tuning: retries, backoff, circuit breaker, cache breakpoints.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_factor: f64,
    pub backoff_cap: Duration,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_cooldown: Duration,
    pub cache_min_tokens_default: usize,
    pub cache_min_tokens_small_model: usize,
    pub max_cache_breakpoints: usize,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        LlmConfig {
            api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            base_url: env::var("AGENTFLOW_LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".to_string()),
            default_model: env::var("AGENTFLOW_DEFAULT_MODEL")
                .unwrap_or_else(|_| "claude-3-5-sonnet-20241022".to_string()),
            max_retries: env_or("AGENTFLOW_LLM_MAX_RETRIES", 3),
            backoff_base: Duration::from_secs_f64(env_or("AGENTFLOW_LLM_BACKOFF_BASE_SECS", 1.0)),
            backoff_factor: env_or("AGENTFLOW_LLM_BACKOFF_FACTOR", 2.0),
            backoff_cap: Duration::from_secs(env_or("AGENTFLOW_LLM_BACKOFF_CAP_SECS", 60)),
            circuit_breaker_threshold: env_or("AGENTFLOW_CIRCUIT_BREAKER_THRESHOLD", 5),
            circuit_breaker_cooldown: Duration::from_secs(env_or(
                "AGENTFLOW_CIRCUIT_BREAKER_COOLDOWN_SECS",
                300,
            )),
            cache_min_tokens_default: env_or("AGENTFLOW_CACHE_MIN_TOKENS", 1024),
            cache_min_tokens_small_model: env_or("AGENTFLOW_CACHE_MIN_TOKENS_SMALL", 2048),
            max_cache_breakpoints: env_or("AGENTFLOW_MAX_CACHE_BREAKPOINTS", 4),
        }
    }
}

/// Agent runtime tuning: per-execution retry/timeout defaults.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_retries: u32,
    pub retry_backoff_cap: Duration,
    pub timeout: Duration,
    pub memory_lru_capacity: usize,
}

impl AgentConfig {
    pub fn from_env() -> Self {
        AgentConfig {
            max_retries: env_or("AGENTFLOW_AGENT_MAX_RETRIES", 3),
            retry_backoff_cap: Duration::from_secs(env_or("AGENTFLOW_AGENT_BACKOFF_CAP_SECS", 30)),
            timeout: Duration::from_secs(env_or("AGENTFLOW_AGENT_TIMEOUT_SECS", 300)),
            memory_lru_capacity: env_or("AGENTFLOW_MEMORY_LRU_CAPACITY", 256),
        }
    }
}

/// Orchestration tuning: concurrency quotas, recursion depth, budget caps.
#[derive(Debug, Clone)]
pub struct OrchestrationConfig {
    pub max_concurrent_agents: usize,
    pub max_depth: u32,
    pub max_subtasks_plan: usize,
    pub max_subtasks_sequential: usize,
    pub max_subtasks_parallel: usize,
    pub max_iterative_refinement_passes: usize,
    pub default_max_cost_usd: f64,
    pub default_max_wall_clock_minutes: f64,
}

impl OrchestrationConfig {
    pub fn from_env() -> Self {
        OrchestrationConfig {
            max_concurrent_agents: env_or("AGENTFLOW_MAX_CONCURRENT_AGENTS", 10),
            max_depth: env_or("AGENTFLOW_MAX_DEPTH", 4),
            max_subtasks_plan: env_or("AGENTFLOW_MAX_SUBTASKS_PLAN", 8),
            max_subtasks_sequential: env_or("AGENTFLOW_MAX_SUBTASKS_SEQUENTIAL", 5),
            max_subtasks_parallel: env_or("AGENTFLOW_MAX_SUBTASKS_PARALLEL", 6),
            max_iterative_refinement_passes: env_or("AGENTFLOW_MAX_ITERATIVE_PASSES", 3),
            default_max_cost_usd: env_or("AGENTFLOW_DEFAULT_MAX_COST_USD", 25.0),
            default_max_wall_clock_minutes: env_or("AGENTFLOW_DEFAULT_MAX_WALL_CLOCK_MINUTES", 30.0),
        }
    }
}

/// Motivational engine tuning: tick interval, arbitration weights, safety gates.
#[derive(Debug, Clone)]
pub struct MotivationConfig {
    pub tick_interval: Duration,
    pub min_arbitration_threshold: f64,
    pub max_concurrent_tasks_per_drive: usize,
    pub weight_urgency: f64,
    pub weight_dissatisfaction: f64,
    pub weight_success_rate: f64,
    pub weight_age_penalty: f64,
    pub satisfaction_decay_epsilon: f64,
    pub safety_gate_enabled: bool,
    pub max_posts_per_hour: u32,
}

impl MotivationConfig {
    pub fn from_env() -> Self {
        MotivationConfig {
            tick_interval: Duration::from_secs(env_or("AGENTFLOW_MOTIVATION_TICK_SECS", 30)),
            min_arbitration_threshold: env_or("AGENTFLOW_MIN_ARBITRATION_THRESHOLD", 0.3),
            max_concurrent_tasks_per_drive: env_or("AGENTFLOW_MAX_CONCURRENT_DRIVE_TASKS", 3),
            weight_urgency: env_or("AGENTFLOW_WEIGHT_URGENCY", 0.5),
            weight_dissatisfaction: env_or("AGENTFLOW_WEIGHT_DISSATISFACTION", 0.3),
            weight_success_rate: env_or("AGENTFLOW_WEIGHT_SUCCESS_RATE", 0.15),
            weight_age_penalty: env_or("AGENTFLOW_WEIGHT_AGE_PENALTY", 0.1),
            satisfaction_decay_epsilon: env_or("AGENTFLOW_SATISFACTION_DECAY_EPSILON", 0.01),
            safety_gate_enabled: env_or("AGENTFLOW_SAFETY_GATE_ENABLED", true),
            max_posts_per_hour: env_or("AGENTFLOW_MAX_POSTS_PER_HOUR", 4),
        }
    }
}

/// Tool registry tuning. Destructive file operations are refused unless explicitly enabled,
/// per the reference's safety posture (open question 2 in the design notes).
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    pub allow_destructive_file_ops: bool,
    pub shell_timeout: Duration,
    pub sandbox_root: Option<String>,
}

impl ToolsConfig {
    pub fn from_env() -> Self {
        ToolsConfig {
            allow_destructive_file_ops: env_or("AGENTFLOW_ALLOW_DESTRUCTIVE_FILE_OPS", false),
            shell_timeout: Duration::from_secs(env_or("AGENTFLOW_SHELL_TIMEOUT_SECS", 30)),
            sandbox_root: env::var("AGENTFLOW_SANDBOX_ROOT").ok(),
        }
    }
}

/// Aggregate configuration, built once at process startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub orchestration: OrchestrationConfig,
    pub motivation: MotivationConfig,
    pub tools: ToolsConfig,
    pub database_path: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            llm: LlmConfig::from_env(),
            agent: AgentConfig::from_env(),
            orchestration: OrchestrationConfig::from_env(),
            motivation: MotivationConfig::from_env(),
            tools: ToolsConfig::from_env(),
            database_path: env::var("AGENTFLOW_DATABASE_PATH")
                .unwrap_or_else(|_| "agentflow.sqlite3".to_string()),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_design_values() {
        env::remove_var("AGENTFLOW_LLM_MAX_RETRIES");
        let cfg = LlmConfig::from_env();
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.circuit_breaker_threshold, 5);
        assert_eq!(cfg.circuit_breaker_cooldown, Duration::from_secs(300));
    }

    #[test]
    fn env_override_is_honored() {
        env::set_var("AGENTFLOW_MAX_DEPTH", "7");
        let cfg = OrchestrationConfig::from_env();
        assert_eq!(cfg.max_depth, 7);
        env::remove_var("AGENTFLOW_MAX_DEPTH");
    }
}
