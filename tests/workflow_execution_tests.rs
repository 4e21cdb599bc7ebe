// tests/workflow_execution_tests.rs

//! End-to-end coverage of `TopLevelOrchestrator::execute_workflow` against a fake LLM
//! provider: strategy selection flowing all the way through to a persisted result.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use agentflow::agentflow::error::CoreResult;
use agentflow::agentflow::llm::{CallRequest, CallResponse, LlmProvider, TokenUsage};
use agentflow::agentflow::orchestration::{TopLevelOrchestrator, WorkflowInput, WorkflowInputType};
use agentflow::Runtime;

/// Always answers with a fixed response; records every request it was asked to serve.
struct MockLlmProvider {
    response_text: String,
    requests: Mutex<Vec<CallRequest>>,
}

impl MockLlmProvider {
    fn new(response_text: impl Into<String>) -> Self {
        MockLlmProvider { response_text: response_text.into(), requests: Mutex::new(Vec::new()) }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn call(&self, request: CallRequest) -> CoreResult<CallResponse> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        Ok(CallResponse {
            text: self.response_text.clone(),
            usage: TokenUsage { input_tokens: 120, output_tokens: 64, cache_creation_input_tokens: 0, cache_read_input_tokens: 0 },
            cost_usd: 0.002,
            cost_without_cache_usd: 0.002,
            latency: Duration::from_millis(2),
            retry_count: 0,
            model,
        })
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

fn user_prompt_input(prompt: &str) -> WorkflowInput {
    WorkflowInput {
        input_type: WorkflowInputType::UserPrompt,
        content: serde_json::json!({"prompt": prompt}),
        require_council_consensus: false,
        validation_level: None,
        optimization_focus: None,
    }
}

#[tokio::test]
async fn simple_lookup_prompt_executes_directly_and_succeeds() {
    let mock = Arc::new(MockLlmProvider::new("Rust is a systems programming language."));
    let runtime = Runtime::for_testing_with_llm(mock.clone()).unwrap();
    let orchestrator = TopLevelOrchestrator::new(runtime, 5, 3);
    assert!(orchestrator.initialize());

    let result = orchestrator.execute_workflow(user_prompt_input("what is rust")).await;

    assert!(result.success);
    assert_eq!(result.agents_spawned, 1);
    assert_eq!(result.agents_failed, 0);
    assert_eq!(result.metadata["strategy_used"], "direct_execution");
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn long_prompt_without_council_runs_sequential_decomposition() {
    let mock = Arc::new(MockLlmProvider::new("partial step result"));
    let runtime = Runtime::for_testing_with_llm(mock).unwrap();
    let orchestrator = TopLevelOrchestrator::new(runtime, 5, 3);
    assert!(orchestrator.initialize());

    let long_prompt = "Draft a migration plan for our billing pipeline ".repeat(8);
    let result = orchestrator.execute_workflow(user_prompt_input(&long_prompt)).await;

    assert!(result.success);
    assert_eq!(result.metadata["strategy_used"], "sequential_decomposition");
    assert!(result.agents_spawned >= 1);
}

#[tokio::test]
async fn failed_llm_calls_surface_as_a_failed_workflow() {
    struct AlwaysFailsProvider;

    #[async_trait]
    impl LlmProvider for AlwaysFailsProvider {
        async fn call(&self, _request: CallRequest) -> CoreResult<CallResponse> {
            Err(agentflow::agentflow::error::CoreError::llm_integration("simulated provider outage"))
        }

        fn model_name(&self) -> &str {
            "mock-model"
        }
    }

    let runtime = Runtime::for_testing_with_llm(Arc::new(AlwaysFailsProvider)).unwrap();
    let orchestrator = TopLevelOrchestrator::new(runtime, 5, 3);
    assert!(orchestrator.initialize());

    let result = orchestrator.execute_workflow(user_prompt_input("what is rust")).await;
    assert!(!result.success);
}
