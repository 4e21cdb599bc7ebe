// tests/motivational_engine_tests.rs

//! A tick against a single always-triggered, high-urgency drive should clear arbitration, spawn
//! a workflow through the mock provider, and feed the outcome back into the drive's state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use agentflow::agentflow::error::CoreResult;
use agentflow::agentflow::llm::{CallRequest, CallResponse, LlmProvider, TokenUsage};
use agentflow::agentflow::motivation::MotivationalEngine;
use agentflow::agentflow::persistence::store::MotivationalStateRecord;
use agentflow::Runtime;

struct MockLlmProvider;

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn call(&self, request: CallRequest) -> CoreResult<CallResponse> {
        Ok(CallResponse {
            text: "Drive satisfied: checked in on the standing concern.".to_string(),
            usage: TokenUsage { input_tokens: 60, output_tokens: 30, cache_creation_input_tokens: 0, cache_read_input_tokens: 0 },
            cost_usd: 0.001,
            cost_without_cache_usd: 0.001,
            latency: Duration::from_millis(1),
            retry_count: 0,
            model: request.model,
        })
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

fn seed_record() -> MotivationalStateRecord {
    MotivationalStateRecord {
        motivation_type: "check_inbox".to_string(),
        urgency: 0.9,
        satisfaction: 0.1,
        decay_rate: 0.0,
        boost_factor: 0.1,
        trigger_condition: serde_json::json!({"always": true}),
        last_triggered_at: None,
        last_satisfied_at: None,
        success_count: 0,
        failure_count: 0,
        success_rate: 0.0,
        active: true,
        metadata: serde_json::json!({}),
    }
}

#[tokio::test]
async fn tick_spawns_the_winning_drive_and_applies_success_feedback() {
    let runtime = Runtime::for_testing_with_llm(Arc::new(MockLlmProvider)).unwrap();
    runtime.store.upsert_motivational_state(&seed_record()).unwrap();

    let engine = MotivationalEngine::new(runtime.clone());
    engine.tick().await.expect("tick should complete");

    let updated = runtime.store.get_motivational_state("check_inbox").unwrap().expect("drive should still exist");
    assert!(updated.success_count >= 1);
    assert!(updated.satisfaction > 0.1);
}

#[tokio::test]
async fn tick_with_no_active_drives_is_a_no_op() {
    let runtime = Runtime::for_testing_with_llm(Arc::new(MockLlmProvider)).unwrap();
    let mut dormant = seed_record();
    dormant.active = false;
    runtime.store.upsert_motivational_state(&dormant).unwrap();

    let engine = MotivationalEngine::new(runtime.clone());
    engine.tick().await.expect("tick should complete even with nothing to do");

    let unchanged = runtime.store.get_motivational_state("check_inbox").unwrap().unwrap();
    assert_eq!(unchanged.success_count, 0);
}

#[tokio::test]
async fn boost_drive_raises_urgency_and_is_persisted() {
    let runtime = Runtime::for_testing_with_llm(Arc::new(MockLlmProvider)).unwrap();
    let mut low_urgency = seed_record();
    low_urgency.urgency = 0.1;
    runtime.store.upsert_motivational_state(&low_urgency).unwrap();

    let engine = MotivationalEngine::new(runtime.clone());
    engine.boost_drive("check_inbox", 0.5, Some("manual nudge"), serde_json::json!({})).await.unwrap();

    let boosted = runtime.store.get_motivational_state("check_inbox").unwrap().unwrap();
    assert!((boosted.urgency - 0.6).abs() < 1e-9);
}
