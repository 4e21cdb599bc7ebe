// src/agentflow/runtime.rs

//! The explicit home for every piece of process-global mutable state.
//!
//! The design note behind this module is blunt: no ambient globals. Cache statistics, the
//! circuit breaker, and the motivational engine singleton all live here, behind a `Runtime`
//! that every component receives by reference rather than reaching for a `static`. Process
//! lifetime concerns — startup cleanup, shutdown drain — are methods on this type.

use std::sync::Arc;

use log::{info, warn};

use crate::agentflow::config::Config;
use crate::agentflow::error::CoreResult;
use crate::agentflow::llm::cache::CacheStatistics;
use crate::agentflow::llm::client::{AnthropicProvider, CircuitBreaker, LlmProvider};
use crate::agentflow::persistence::store::Store;
use tokio::sync::Mutex;

/// Bundles every cross-cutting piece of process state behind one handle.
///
/// Cloning a `Runtime` clones the `Arc` handles, not the state; every clone observes the same
/// cache statistics, the same circuit breaker, and the same database.
#[derive(Clone)]
pub struct Runtime {
    pub config: Arc<Config>,
    pub store: Arc<Store>,
    pub cache_stats: Arc<CacheStatistics>,
    pub circuit_breaker: Arc<CircuitBreaker>,
    pub llm: Arc<dyn LlmProvider>,
    motivation_lock: Arc<Mutex<()>>,
}

impl Runtime {
    /// Builds a runtime from environment configuration, opens (and migrates) the database, and
    /// runs startup cleanup on any state left non-terminal by a prior crash.
    pub async fn bootstrap() -> CoreResult<Self> {
        let config = Arc::new(Config::from_env());
        let store = Arc::new(Store::open(&config.database_path)?);
        store.migrate()?;

        let cache_stats = Arc::new(CacheStatistics::new());
        let circuit_breaker = Arc::new(CircuitBreaker::new(
            config.llm.circuit_breaker_threshold,
            config.llm.circuit_breaker_cooldown,
        ));
        let llm = Arc::new(AnthropicProvider::new(config.llm.clone()));

        let runtime = Runtime {
            config,
            store,
            cache_stats,
            circuit_breaker,
            llm,
            motivation_lock: Arc::new(Mutex::new(())),
        };

        let cleaned = runtime.startup_cleanup().await?;
        if cleaned > 0 {
            info!("startup cleanup force-transitioned {cleaned} stale record(s)");
        }

        Ok(runtime)
    }

    /// In-memory runtime for tests: no environment reads, an in-memory database.
    pub fn for_testing() -> CoreResult<Self> {
        let config = Arc::new(Config::from_env());
        Self::for_testing_with_llm(Arc::new(AnthropicProvider::new(config.llm.clone())))
    }

    /// In-memory runtime for tests that substitutes a fake [`LlmProvider`] so the LLM call path
    /// can be exercised end to end without a network call or an API key.
    pub fn for_testing_with_llm(llm: Arc<dyn LlmProvider>) -> CoreResult<Self> {
        let config = Arc::new(Config::from_env());
        let store = Arc::new(Store::open_in_memory()?);
        store.migrate()?;
        Ok(Runtime {
            cache_stats: Arc::new(CacheStatistics::new()),
            circuit_breaker: Arc::new(CircuitBreaker::new(
                config.llm.circuit_breaker_threshold,
                config.llm.circuit_breaker_cooldown,
            )),
            llm,
            config,
            store,
            motivation_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Force-transitions every agent, thought tree, and motivational task left in a
    /// non-terminal state by a prior process into a terminal state, tagging the reason.
    ///
    /// Runs once at startup, before any new workflow is accepted. Returns the number of
    /// records touched.
    async fn startup_cleanup(&self) -> CoreResult<u64> {
        let _guard = self.motivation_lock.lock().await;
        let reason = "startup_cleanup";
        let mut total = 0u64;
        total += self.store.force_terminate_nonterminal_agents(reason)?;
        total += self.store.force_cancel_nonterminal_thought_trees(reason)?;
        total += self.store.force_cancel_nonterminal_motivational_tasks(reason)?;
        total += self.store.force_terminate_nonterminal_orchestrators(reason)?;
        if total > 0 {
            warn!("recovered {total} non-terminal record(s) from a prior run");
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_in_memory_runtime_has_zero_cleanup_on_fresh_db() {
        let runtime = Runtime::for_testing().expect("runtime should build");
        let cleaned = runtime.startup_cleanup().await.expect("cleanup should run");
        assert_eq!(cleaned, 0);
    }
}
