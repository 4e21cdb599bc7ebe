// tests/tool_invocation_tests.rs

//! Tool invocation never touches the LLM: a `TaskAgent` running a `shell_command` should
//! execute, log, and return without spending a single token.

use uuid::Uuid;

use agentflow::agentflow::agent::task::TaskAgent;
use agentflow::agentflow::agent::{AgentExecutionContext, AgentSpecialization};
use agentflow::Runtime;

#[tokio::test]
async fn shell_echo_tool_invocation_succeeds_with_zero_token_cost() {
    let runtime = Runtime::for_testing().unwrap();
    let ctx = AgentExecutionContext {
        runtime,
        agent_id: Uuid::new_v4(),
        thought_tree_id: Uuid::new_v4(),
        llm_model: "claude-mock".to_string(),
    };
    let agent = TaskAgent::new();

    let input = serde_json::json!({
        "task_type": "tool_invocation",
        "tool_name": "shell_command",
        "tool_params": {"command": "echo hi"},
    });
    assert!(agent.validate_input(&input).await);

    let outcome = agent.execute(&ctx, input).await;

    assert!(outcome.success, "tool invocation failed: {:?}", outcome.error_message);
    assert!(outcome.content.contains("hi"));
    assert_eq!(outcome.tokens_used, 0);
    assert_eq!(outcome.cost_usd, 0.0);
}

#[tokio::test]
async fn unknown_tool_name_fails_cleanly() {
    let runtime = Runtime::for_testing().unwrap();
    let ctx = AgentExecutionContext {
        runtime,
        agent_id: Uuid::new_v4(),
        thought_tree_id: Uuid::new_v4(),
        llm_model: "claude-mock".to_string(),
    };
    let agent = TaskAgent::new();

    let input = serde_json::json!({
        "task_type": "tool_invocation",
        "tool_name": "not_a_real_tool",
    });
    let outcome = agent.execute(&ctx, input).await;
    assert!(!outcome.success);
}
