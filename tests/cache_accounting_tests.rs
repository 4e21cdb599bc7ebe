// tests/cache_accounting_tests.rs

//! A second identical call against the same prompt should be reported as a cache hit, the way
//! the Anthropic API reports `cache_read_input_tokens` on a repeated prefix.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use agentflow::agentflow::agent::task::TaskAgent;
use agentflow::agentflow::agent::{AgentExecutionContext, AgentSpecialization};
use agentflow::agentflow::error::CoreResult;
use agentflow::agentflow::llm::{CallRequest, CallResponse, LlmProvider, TokenUsage};
use agentflow::Runtime;

/// Reports no cache read on the first call and a full cache hit on every subsequent call,
/// mirroring what a real provider does once a prompt prefix has been cached.
struct CacheSimulatingProvider {
    call_count: Mutex<u32>,
}

impl CacheSimulatingProvider {
    fn new() -> Self {
        CacheSimulatingProvider { call_count: Mutex::new(0) }
    }
}

#[async_trait]
impl LlmProvider for CacheSimulatingProvider {
    async fn call(&self, request: CallRequest) -> CoreResult<CallResponse> {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;
        let is_repeat = *count > 1;
        Ok(CallResponse {
            text: "a concise summary of the provided content".to_string(),
            usage: TokenUsage {
                input_tokens: if is_repeat { 10 } else { 500 },
                output_tokens: 40,
                cache_creation_input_tokens: if is_repeat { 0 } else { 500 },
                cache_read_input_tokens: if is_repeat { 500 } else { 0 },
            },
            cost_usd: 0.001,
            cost_without_cache_usd: 0.003,
            latency: Duration::from_millis(1),
            retry_count: 0,
            model: request.model,
        })
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

fn summary_input() -> serde_json::Value {
    serde_json::json!({
        "task_type": "content_summary",
        "description": "Summarize this long piece of writing",
        "content": "a repeated block of content that would sit in a cached prompt prefix",
    })
}

#[tokio::test]
async fn second_identical_call_reports_as_a_cache_hit() {
    let runtime = Runtime::for_testing_with_llm(Arc::new(CacheSimulatingProvider::new())).unwrap();
    let ctx = AgentExecutionContext {
        runtime,
        agent_id: Uuid::new_v4(),
        thought_tree_id: Uuid::new_v4(),
        llm_model: "claude-mock".to_string(),
    };
    let agent = TaskAgent::new();

    let first = agent.execute(&ctx, summary_input()).await;
    assert!(first.success);
    assert_eq!(first.metadata["cache_hit"], false);

    let second = agent.execute(&ctx, summary_input()).await;
    assert!(second.success);
    assert_eq!(second.metadata["cache_hit"], true);
}
