// tests/council_workflow_tests.rs

//! Coverage for the council-driven strategy: a workflow flagged `require_council_consensus`
//! with elevated risk routes through `CouncilAgent` before the parallel execution fan-out.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use agentflow::agentflow::error::CoreResult;
use agentflow::agentflow::llm::{CallRequest, CallResponse, LlmProvider, TokenUsage};
use agentflow::agentflow::orchestration::{TopLevelOrchestrator, WorkflowInput, WorkflowInputType};
use agentflow::Runtime;

struct MockLlmProvider {
    requests: Mutex<Vec<CallRequest>>,
}

impl MockLlmProvider {
    fn new() -> Self {
        MockLlmProvider { requests: Mutex::new(Vec::new()) }
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
            text: "Overall assessment PASS, a reasonable path forward with no objections.".to_string(),
            usage: TokenUsage { input_tokens: 200, output_tokens: 80, cache_creation_input_tokens: 0, cache_read_input_tokens: 0 },
            cost_usd: 0.004,
            cost_without_cache_usd: 0.004,
            latency: Duration::from_millis(3),
            retry_count: 0,
            model,
        })
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

#[tokio::test]
async fn structured_task_with_required_consensus_and_high_risk_uses_council_strategy() {
    let mock = Arc::new(MockLlmProvider::new());
    let runtime = Runtime::for_testing_with_llm(mock.clone()).unwrap();
    let orchestrator = TopLevelOrchestrator::new(runtime, 10, 3);
    assert!(orchestrator.initialize());

    let input = WorkflowInput {
        input_type: WorkflowInputType::StructuredTask,
        content: serde_json::json!({"prompt": "Decide whether to roll back the production deploy"}),
        require_council_consensus: true,
        validation_level: Some("critical".to_string()),
        optimization_focus: None,
    };

    let result = orchestrator.execute_workflow(input).await;

    assert!(result.success);
    assert_eq!(result.metadata["strategy_used"], "council_driven");
    // One council agent (3-role default composition -> 6 internal calls) plus a 6-way
    // parallel fan-out of task agents (1 call each) that always follows the council phase.
    assert_eq!(mock.request_count(), 12);
    assert_eq!(result.agents_spawned, 7);
}
