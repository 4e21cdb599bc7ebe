// src/agentflow/agent/council.rs

//! Council agent: multi-perspective collaborative decision-making over a fixed set of roles.
//!
//! Four phases: gather independent per-role perspectives concurrently against a large shared
//! context (cached on the provider side), collaborative analysis consolidating them, consensus
//! synthesis, and a final structured recommendation. Tokens and cost accumulate across every
//! phase into the result returned for the whole session.

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::Value;

use crate::agentflow::llm::{call_and_log, CallRequest};

use super::{AgentExecutionContext, AgentKind, AgentOutcome, AgentSpecialization};

/// Roles available in a council session. The default composition is engineer, strategist,
/// dissenter; analyst and facilitator are available when the caller asks for them explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouncilRole {
    Engineer,
    Strategist,
    Dissenter,
    Analyst,
    Facilitator,
}

impl CouncilRole {
    fn as_str(&self) -> &'static str {
        match self {
            CouncilRole::Engineer => "engineer",
            CouncilRole::Strategist => "strategist",
            CouncilRole::Dissenter => "dissenter",
            CouncilRole::Analyst => "analyst",
            CouncilRole::Facilitator => "facilitator",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "engineer" => Some(CouncilRole::Engineer),
            "strategist" => Some(CouncilRole::Strategist),
            "dissenter" => Some(CouncilRole::Dissenter),
            "analyst" => Some(CouncilRole::Analyst),
            "facilitator" => Some(CouncilRole::Facilitator),
            _ => None,
        }
    }

    fn perspective_prompt(&self) -> &'static str {
        match self {
            CouncilRole::Engineer => {
                "You are the engineering representative in this council. Focus on technical \
                 feasibility, implementation complexity, reliability, scalability, security, and \
                 maintenance cost. Give realistic effort estimates and name the likely technical \
                 bottlenecks."
            }
            CouncilRole::Strategist => {
                "You are the strategic representative in this council. Focus on business \
                 alignment, resource allocation, stakeholder impact, and long-term sustainability. \
                 Evaluate value against the stated objectives and name strategic risks and \
                 opportunities."
            }
            CouncilRole::Dissenter => {
                "You are the dissenting voice in this council. Your job is critical evaluation: \
                 question the assumptions behind the proposal, surface failure modes and hidden \
                 costs, and argue for alternatives the other perspectives may be overlooking."
            }
            CouncilRole::Analyst => {
                "You are the analytical representative in this council. Focus on data-driven \
                 assessment: quantify what can be quantified, name the success metrics, and give \
                 an evidence-based recommendation with stated confidence."
            }
            CouncilRole::Facilitator => {
                "You are the facilitation representative in this council. Focus on turning the \
                 other perspectives into an actionable plan: find common ground, surface \
                 conflicts that need resolving, and sketch an implementation timeline."
            }
        }
    }
}

fn default_composition() -> Vec<CouncilRole> {
    vec![CouncilRole::Engineer, CouncilRole::Strategist, CouncilRole::Dissenter]
}

fn composition_from_input(input: &Value) -> Vec<CouncilRole> {
    match input.get("council_composition").and_then(|v| v.as_array()) {
        Some(arr) => {
            let roles: Vec<CouncilRole> =
                arr.iter().filter_map(|v| v.as_str()).filter_map(CouncilRole::from_str).collect();
            if roles.len() >= 2 {
                roles
            } else {
                default_composition()
            }
        }
        None => default_composition(),
    }
}

fn shared_context(input: &Value) -> String {
    let field = |key: &str, default: &str| input.get(key).and_then(|v| v.as_str()).unwrap_or(default).to_string();
    format!(
        "You are participating in a council decision-making session with multiple expert \
         perspectives.\n\nDECISION CONTEXT:\n{}\n\nDECISION QUESTION:\n{}\n\nADDITIONAL \
         INFORMATION:\n{}\n\nCONSTRAINTS AND REQUIREMENTS:\n{}\n\nSUCCESS CRITERIA:\n{}",
        field("decision_context", ""),
        field("decision_question", ""),
        field("additional_info", "None provided"),
        field("constraints", "None specified"),
        field("success_criteria", "To be determined by council"),
    )
}

fn perspective_user_prompt(role: CouncilRole) -> String {
    format!(
        "Based on your role and expertise, provide your analysis and recommendation for this \
         decision.\n\n{}\n\nAddress: (1) key considerations from your area of expertise, (2) risks \
         and opportunities you identify, (3) your recommendation with rationale, (4) critical \
         success factors, (5) potential challenges or concerns.",
        role.perspective_prompt()
    )
}

struct PhaseResult {
    success: bool,
    content: String,
    tokens_used: u64,
    cost_usd: f64,
}

async fn call_phase(
    ctx: &AgentExecutionContext,
    system: impl Into<std::sync::Arc<str>>,
    user: impl Into<std::sync::Arc<str>>,
    max_tokens: u32,
    temperature: f32,
) -> PhaseResult {
    let mut request = CallRequest::new(system, user, ctx.llm_model.clone());
    request.max_output_tokens = max_tokens;
    request.temperature = temperature;
    request.thought_tree_id = Some(ctx.thought_tree_id);
    request.agent_id = Some(ctx.agent_id);

    match call_and_log(&ctx.runtime, request, Some(ctx.agent_id)).await {
        Ok(response) => {
            PhaseResult { success: true, content: response.text, tokens_used: response.usage.total_tokens(), cost_usd: response.cost_usd }
        }
        Err(e) => {
            log::warn!("council phase call failed: {e}");
            PhaseResult { success: false, content: String::new(), tokens_used: 0, cost_usd: 0.0 }
        }
    }
}

pub struct CouncilAgent;

impl CouncilAgent {
    pub fn new() -> Self {
        CouncilAgent
    }

    async fn gather_perspectives(
        &self,
        ctx: &AgentExecutionContext,
        input: &Value,
        composition: &[CouncilRole],
    ) -> Vec<(CouncilRole, PhaseResult)> {
        let context = shared_context(input);
        let max_tokens = input.get("max_tokens_per_member").and_then(|v| v.as_u64()).map(|v| v as u32).unwrap_or(2048);
        let temperature = input.get("temperature").and_then(|v| v.as_f64()).map(|v| v as f32).unwrap_or(0.6);

        let futures = composition.iter().map(|role| {
            let context = context.clone();
            let user = perspective_user_prompt(*role);
            async move { (*role, call_phase(ctx, context, user, max_tokens, temperature).await) }
        });

        join_all(futures).await
    }
}

impl Default for CouncilAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentSpecialization for CouncilAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Council
    }

    fn implementation_class(&self) -> &'static str {
        "CouncilAgent"
    }

    async fn validate_input(&self, input: &Value) -> bool {
        let context = input.get("decision_context").and_then(|v| v.as_str()).unwrap_or("");
        if context.trim().len() < 20 {
            return false;
        }
        let question = input.get("decision_question").and_then(|v| v.as_str()).unwrap_or("");
        question.trim().len() >= 10
    }

    async fn execute(&self, ctx: &AgentExecutionContext, input: Value) -> AgentOutcome {
        let composition = composition_from_input(&input);
        let decision_question = input.get("decision_question").and_then(|v| v.as_str()).unwrap_or("").to_string();

        // Phase 1: independent perspectives, gathered concurrently.
        let perspectives = self.gather_perspectives(ctx, &input, &composition).await;
        let successful: Vec<&(CouncilRole, PhaseResult)> = perspectives.iter().filter(|(_, p)| p.success).collect();
        if successful.is_empty() {
            return AgentOutcome::failed("failed to gather any council perspectives");
        }

        let mut perspectives_summary = String::new();
        for (role, perspective) in &perspectives {
            if perspective.success {
                perspectives_summary.push_str(&format!("\n=== {} PERSPECTIVE ===\n{}\n", role.as_str().to_uppercase(), perspective.content));
            }
        }

        // Phase 2: collaborative analysis.
        let analysis = call_phase(
            ctx,
            "You are facilitating a council decision-making session. You have received \
             individual perspectives from multiple experts and must conduct a collaborative \
             analysis: identify agreement and disagreement, synthesize the most important \
             considerations, name gaps, and assess the overall risk and opportunity profile.",
            format!(
                "DECISION QUESTION:\n{decision_question}\n\nINDIVIDUAL PERSPECTIVES:\n{perspectives_summary}\n\nSynthesize insights across these perspectives rather than summarizing each one in turn."
            ),
            input.get("max_tokens_analysis").and_then(|v| v.as_u64()).map(|v| v as u32).unwrap_or(3072),
            0.5,
        )
        .await;
        if !analysis.success {
            return AgentOutcome::failed("collaborative analysis phase failed");
        }

        // Phase 3: consensus building.
        let consensus = call_phase(
            ctx,
            "You are facilitating the consensus-building phase of a council decision. Based on \
             individual expert perspectives and the collaborative analysis, identify consensus \
             positions and propose compromises where experts disagree.",
            format!(
                "DECISION QUESTION:\n{decision_question}\n\nCOLLABORATIVE ANALYSIS:\n{}\n\nProvide: consensus recommendations, compromise approaches for disagreements, risk mitigation addressing multiple concerns, an implementation approach, success metrics, and next steps.",
                analysis.content
            ),
            input.get("max_tokens_consensus").and_then(|v| v.as_u64()).map(|v| v as u32).unwrap_or(2048),
            0.4,
        )
        .await;
        if !consensus.success {
            return AgentOutcome::failed("consensus-building phase failed");
        }

        // Phase 4: final recommendation.
        let final_decision = call_phase(
            ctx,
            "You are completing a council decision-making process. Synthesize the expert input, \
             collaborative analysis, and consensus building into a final, actionable \
             recommendation.",
            format!(
                "DECISION QUESTION:\n{decision_question}\n\nCOLLABORATIVE ANALYSIS:\n{}\n\nCONSENSUS BUILDING:\n{}\n\nProvide a final recommendation with these sections: RECOMMENDATION (with rationale and consensus level), RISKS (primary risks and mitigations), ROADMAP (implementation steps, milestones, resources), and MONITORING (success metrics and review points).",
                analysis.content, consensus.content
            ),
            input.get("max_tokens_final").and_then(|v| v.as_u64()).map(|v| v as u32).unwrap_or(4096),
            0.3,
        )
        .await;
        if !final_decision.success {
            return AgentOutcome::failed("final recommendation phase failed");
        }

        let total_tokens: u64 = successful.iter().map(|(_, p)| p.tokens_used).sum::<u64>()
            + analysis.tokens_used
            + consensus.tokens_used
            + final_decision.tokens_used;
        let total_cost: f64 = successful.iter().map(|(_, p)| p.cost_usd).sum::<f64>()
            + analysis.cost_usd
            + consensus.cost_usd
            + final_decision.cost_usd;

        AgentOutcome::ok(final_decision.content, total_tokens, total_cost).with_metadata(serde_json::json!({
            "council_composition": composition.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
            "perspectives_gathered": successful.len(),
            "session_phases_completed": 4,
            "total_council_members": composition.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_short_decision_context() {
        let agent = CouncilAgent::new();
        let input = serde_json::json!({
            "decision_context": "too short",
            "decision_question": "Should we do this thing?",
        });
        assert!(!agent.validate_input(&input).await);
    }

    #[tokio::test]
    async fn rejects_short_decision_question() {
        let agent = CouncilAgent::new();
        let input = serde_json::json!({
            "decision_context": "A sufficiently long decision context describing the situation.",
            "decision_question": "why?",
        });
        assert!(!agent.validate_input(&input).await);
    }

    #[tokio::test]
    async fn accepts_well_formed_input() {
        let agent = CouncilAgent::new();
        let input = serde_json::json!({
            "decision_context": "A sufficiently long decision context describing the situation.",
            "decision_question": "Should we migrate to the new storage engine?",
        });
        assert!(agent.validate_input(&input).await);
    }

    #[test]
    fn default_composition_has_three_roles() {
        assert_eq!(default_composition().len(), 3);
    }

    #[test]
    fn under_two_roles_falls_back_to_default() {
        let input = serde_json::json!({"council_composition": ["engineer"]});
        let composition = composition_from_input(&input);
        assert_eq!(composition.len(), 3);
    }

    #[test]
    fn explicit_composition_is_honored() {
        let input = serde_json::json!({"council_composition": ["analyst", "facilitator"]});
        let composition = composition_from_input(&input);
        assert_eq!(composition, vec![CouncilRole::Analyst, CouncilRole::Facilitator]);
    }
}
