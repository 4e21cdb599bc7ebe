// src/agentflow/llm/mod.rs

//! The cached LLM call path: request shaping, cache-breakpoint insertion, retry with
//! exponential backoff, circuit breaking, and cost/token accounting.

pub mod cache;
pub mod client;
pub mod models;

pub use cache::{CacheStatistics, PromptCacheManager};
pub use client::{AnthropicProvider, CircuitBreaker, LlmProvider};
pub use models::{CallRequest, CallResponse, Message, Role, TextBlock, TokenUsage};

use uuid::Uuid;

use crate::agentflow::persistence::store::LlmInteractionRecord;
use crate::agentflow::runtime::Runtime;

/// Calls the provider, folds the outcome into the process-global cache statistics, and logs
/// the interaction asynchronously — logging must never block the caller and must never turn a
/// successful call into a failed one.
pub async fn call_and_log(
    runtime: &Runtime,
    request: CallRequest,
    agent_id: Option<Uuid>,
) -> crate::agentflow::error::CoreResult<CallResponse> {
    let thought_tree_id = request.thought_tree_id;
    let model = request.model.clone();
    let system_prompt = request.system.iter().map(|b| b.text.as_ref()).collect::<Vec<_>>().join("\n");
    let user_prompt = request.user.iter().map(|b| b.text.as_ref()).collect::<Vec<_>>().join("\n");

    let outcome = runtime.llm.call(request).await;

    let store = runtime.store.clone();
    let cache_stats = runtime.cache_stats.clone();

    match &outcome {
        Ok(resp) => {
            cache_stats.record(&resp.usage, resp.cost_usd, resp.cost_without_cache_usd);
            let record = LlmInteractionRecord {
                id: Uuid::new_v4(),
                agent_id,
                thought_tree_id,
                provider: "anthropic".to_string(),
                model: resp.model.clone(),
                system_prompt,
                user_prompt,
                response_text: Some(resp.text.clone()),
                input_tokens: resp.usage.input_tokens,
                output_tokens: resp.usage.output_tokens,
                cache_creation_input_tokens: resp.usage.cache_creation_input_tokens,
                cache_read_input_tokens: resp.usage.cache_read_input_tokens,
                latency_ms: resp.latency.as_millis() as u64,
                cost_usd: resp.cost_usd,
                cost_without_cache_usd: resp.cost_without_cache_usd,
                success: true,
                error_message: None,
                retry_count: resp.retry_count,
            };
            tokio::task::spawn_blocking(move || {
                if let Err(e) = store.insert_llm_interaction(&record) {
                    log::error!("failed to log llm interaction: {e}");
                }
            });
        }
        Err(e) => {
            let estimated_input = ((system_prompt.len() + user_prompt.len()) / 4) as u64;
            let record = LlmInteractionRecord {
                id: Uuid::new_v4(),
                agent_id,
                thought_tree_id,
                provider: "anthropic".to_string(),
                model,
                system_prompt,
                user_prompt,
                response_text: None,
                input_tokens: estimated_input,
                output_tokens: 0,
                cache_creation_input_tokens: 0,
                cache_read_input_tokens: 0,
                latency_ms: 0,
                cost_usd: 0.0,
                cost_without_cache_usd: 0.0,
                success: false,
                error_message: Some(e.to_string()),
                retry_count: 0,
            };
            tokio::task::spawn_blocking(move || {
                if let Err(e) = store.insert_llm_interaction(&record) {
                    log::error!("failed to log llm interaction: {e}");
                }
            });
        }
    }

    outcome
}
