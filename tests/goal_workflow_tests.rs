// tests/goal_workflow_tests.rs

//! Goal workflows always route through recursive decomposition, and high-complexity inputs
//! surface a resource-estimate warning ahead of execution.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use agentflow::agentflow::error::CoreResult;
use agentflow::agentflow::llm::{CallRequest, CallResponse, LlmProvider, TokenUsage};
use agentflow::agentflow::orchestration::{TopLevelOrchestrator, WorkflowInput, WorkflowInputType};
use agentflow::Runtime;

struct MockLlmProvider;

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn call(&self, request: CallRequest) -> CoreResult<CallResponse> {
        Ok(CallResponse {
            text: "Completed the requested subtask without incident.".to_string(),
            usage: TokenUsage { input_tokens: 90, output_tokens: 45, cache_creation_input_tokens: 0, cache_read_input_tokens: 0 },
            cost_usd: 0.0015,
            cost_without_cache_usd: 0.0015,
            latency: Duration::from_millis(1),
            retry_count: 0,
            model: request.model,
        })
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

#[tokio::test]
async fn goal_workflow_always_routes_through_recursive_decomposition() {
    let runtime = Runtime::for_testing_with_llm(Arc::new(MockLlmProvider)).unwrap();
    let orchestrator = TopLevelOrchestrator::new(runtime, 10, 4);
    assert!(orchestrator.initialize());

    let input = WorkflowInput {
        input_type: WorkflowInputType::GoalWorkflow,
        content: serde_json::json!({
            "title": "Launch the quarterly roadmap review",
            "prompt": "Coordinate every team to land the quarterly roadmap review on schedule",
        }),
        require_council_consensus: false,
        validation_level: None,
        optimization_focus: None,
    };

    let result = orchestrator.execute_workflow(input).await;

    assert!(result.success);
    assert_eq!(result.metadata["strategy_used"], "recursive_decomposition");
    assert!(result.agents_spawned >= 1);
}

#[tokio::test]
async fn high_complexity_structured_task_estimates_more_agents_and_cost_than_a_simple_one() {
    async fn run(runtime: Runtime, input: WorkflowInput) -> agentflow::agentflow::orchestration::OrchestratorResult {
        let orchestrator = TopLevelOrchestrator::new(runtime, 10, 4);
        assert!(orchestrator.initialize());
        orchestrator.execute_workflow(input).await
    }

    let simple = run(
        Runtime::for_testing_with_llm(Arc::new(MockLlmProvider)).unwrap(),
        WorkflowInput {
            input_type: WorkflowInputType::UserPrompt,
            content: serde_json::json!({"prompt": "what is rust"}),
            require_council_consensus: false,
            validation_level: None,
            optimization_focus: None,
        },
    )
    .await;

    let demanding = run(
        Runtime::for_testing_with_llm(Arc::new(MockLlmProvider)).unwrap(),
        WorkflowInput {
            input_type: WorkflowInputType::StructuredTask,
            content: serde_json::json!({
                "prompt": "Draft, review, and publish a cross-team incident retrospective covering every affected service and escalation path for this quarter",
                "deliverables": ["retro_doc", "timeline", "action_items", "exec_summary"],
            }),
            require_council_consensus: false,
            validation_level: Some("critical".to_string()),
            optimization_focus: None,
        },
    )
    .await;

    let simple_agents = simple.metadata["resource_estimate"]["estimated_agents"].as_u64().unwrap();
    let demanding_agents = demanding.metadata["resource_estimate"]["estimated_agents"].as_u64().unwrap();
    let simple_cost = simple.metadata["resource_estimate"]["estimated_cost_usd"].as_f64().unwrap();
    let demanding_cost = demanding.metadata["resource_estimate"]["estimated_cost_usd"].as_f64().unwrap();

    assert!(demanding_agents > simple_agents);
    assert!(demanding_cost > simple_cost);
    assert_eq!(demanding.metadata["complexity"]["overall"], "critical");
}
