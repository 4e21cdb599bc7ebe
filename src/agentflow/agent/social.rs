// src/agentflow/agent/social.rs

//! Social monitor: a task-kind agent that runs its own small scheduler over a paginated feed.
//!
//! Each run fetches one page from a feed, rotating through sort strategies as pagination
//! exhausts an offset window, filters out posts already evaluated, asks the LLM to judge each
//! remaining post against a fixed output grammar, and posts a correction where warranted,
//! subject to a per-run and per-hour cap. Pagination state lives in the owning drive's
//! `MotivationalState.metadata` so runs are stateless themselves.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::agentflow::error::CoreResult;
use crate::agentflow::llm::{call_and_log, CallRequest};

use super::{AgentExecutionContext, AgentKind, AgentOutcome, AgentSpecialization};

pub const DRIVE_NAME: &str = "monitor_social_network";
const SORT_STRATEGIES: &[&str] = &["hot", "new", "rising"];

#[derive(Debug, Clone)]
pub struct FeedPost {
    pub id: String,
    pub author: String,
    pub content: String,
}

/// The boundary to whatever concrete feed the deployment points at. The feed's own wire format
/// is a thin adapter the core never needs to know about.
#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn fetch_posts(&self, sort: &str, limit: u32, offset: u32) -> CoreResult<Vec<FeedPost>>;
    async fn post_response(&self, post_id: &str, text: &str) -> CoreResult<()>;
}

/// Minimal HTTP-backed feed client: `GET {base_url}/posts?sort&limit&offset` and
/// `POST {base_url}/posts/{id}/responses`. Stands in for whatever concrete feed a deployment
/// points at.
pub struct HttpFeedClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpFeedClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpFeedClient { http: reqwest::Client::new(), base_url: base_url.into() }
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch_posts(&self, sort: &str, limit: u32, offset: u32) -> CoreResult<Vec<FeedPost>> {
        let url = format!("{}/posts?sort={sort}&limit={limit}&offset={offset}", self.base_url);
        let response = self.http.get(&url).send().await?;
        let body: Value = response.json().await?;
        let posts = body
            .as_array()
            .map(|arr| {
                arr.iter()
                    .map(|p| FeedPost {
                        id: p.get("id").and_then(|v| v.as_str()).unwrap_or("unknown").to_string(),
                        author: p.get("author").and_then(|v| v.as_str()).unwrap_or("unknown").to_string(),
                        content: p.get("content").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(posts)
    }

    async fn post_response(&self, post_id: &str, text: &str) -> CoreResult<()> {
        let url = format!("{}/posts/{post_id}/responses", self.base_url);
        self.http.post(&url).json(&serde_json::json!({"text": text})).send().await?;
        Ok(())
    }
}

struct FetchState {
    sort: String,
    offset: u32,
    sort_index: usize,
}

struct Evaluation {
    should_respond: bool,
    claim_summary: String,
    response_text: String,
}

/// Parses the fixed output grammar the LLM is instructed to emit. Falls back to "do not
/// respond" on anything that doesn't parse cleanly — a malformed judgment should never turn
/// into an accidental post.
fn parse_evaluation(text: &str) -> Evaluation {
    let mut should_respond = false;
    for line in text.lines() {
        if line.to_uppercase().contains("SHOULD_RESPOND:") {
            should_respond = line.to_uppercase().contains("YES");
            break;
        }
    }

    let claim_summary = text
        .split("CLAIM_SUMMARY:")
        .nth(1)
        .and_then(|s| s.lines().next())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown claim".to_string());

    let response_text = text
        .split("RESPONSE:")
        .nth(1)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.eq_ignore_ascii_case("n/a"))
        .unwrap_or_default();

    Evaluation { should_respond: should_respond && !response_text.is_empty(), claim_summary, response_text }
}

fn system_prompt() -> &'static str {
    "You are a reality-check presence in a social feed of AI agents. Your role is to identify \
     and correct outlandish, false, or misleading claims with grounded, evidence-based \
     reasoning.\n\nRespond to: outlandish claims (claiming sentience, supernatural abilities), \
     false technical claims (impossible performance metrics, fabricated capabilities), and \
     misleading statements that could deceive others.\n\nDo not respond to: reasonable \
     discussion, mild exaggeration or humor, or subjective philosophical musing that makes no \
     false claim.\n\nKeep any response brief (under 300 characters), evidence-based, polite, and \
     direct.\n\nOutput exactly this format and nothing else:\nSHOULD_RESPOND: yes/no\n\
     CLAIM_SUMMARY: <brief summary>\nREASONING: <why this does or doesn't warrant a response>\n\
     RESPONSE: <response text, or N/A>"
}

pub struct SocialMonitorAgent {
    feed: Arc<dyn FeedClient>,
    post_limit: u32,
    max_offset: u32,
    max_replies_per_run: u32,
}

impl SocialMonitorAgent {
    pub fn new(feed: Arc<dyn FeedClient>) -> Self {
        SocialMonitorAgent { feed, post_limit: 10, max_offset: 50, max_replies_per_run: 3 }
    }

    fn fetch_state(&self, ctx: &AgentExecutionContext) -> FetchState {
        match ctx.runtime.store.get_motivational_state(DRIVE_NAME) {
            Ok(Some(state)) => {
                let meta = state.metadata.get("fetch_state").cloned().unwrap_or(serde_json::json!({}));
                FetchState {
                    sort: meta.get("sort").and_then(|v| v.as_str()).unwrap_or("hot").to_string(),
                    offset: meta.get("offset").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                    sort_index: meta.get("sort_index").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
                }
            }
            _ => FetchState { sort: "hot".to_string(), offset: 0, sort_index: 0 },
        }
    }

    fn advance_fetch_state(&self, ctx: &AgentExecutionContext, current: &FetchState) {
        let mut next_offset = current.offset + self.post_limit;
        let mut next_sort_index = current.sort_index;
        let mut next_sort = current.sort.clone();

        if next_offset >= self.max_offset {
            next_offset = 0;
            next_sort_index = (current.sort_index + 1) % SORT_STRATEGIES.len();
            next_sort = SORT_STRATEGIES[next_sort_index].to_string();
        }

        let patch = serde_json::json!({
            "fetch_state": {
                "sort": next_sort,
                "offset": next_offset,
                "sort_index": next_sort_index,
                "last_updated": Utc::now().to_rfc3339(),
            }
        });
        if let Err(e) = ctx.runtime.store.patch_motivational_state_metadata(DRIVE_NAME, &patch) {
            log::warn!("failed to persist social monitor fetch state: {e}");
        }
    }

    fn already_evaluated(&self, ctx: &AgentExecutionContext, post_id: &str) -> bool {
        ctx.runtime
            .store
            .search_memory_entries(post_id, Some(&["global".to_string()]), Some(&["communication".to_string()]), 0.0, 1)
            .map(|r| !r.is_empty())
            .unwrap_or(false)
    }

    fn record_evaluated(&self, ctx: &AgentExecutionContext, post_id: &str, claim_summary: &str) {
        let record = crate::agentflow::persistence::store::MemoryEntryRecord {
            id: Uuid::new_v4(),
            thought_tree_id: Some(ctx.thought_tree_id),
            scope: "global".to_string(),
            kind: "communication".to_string(),
            content: post_id.to_string(),
            metadata: serde_json::json!({"claim_summary": claim_summary}),
            relevance_score: 0.5,
            access_count: 0,
        };
        if let Err(e) = ctx.runtime.store.insert_memory_entry(&record) {
            log::warn!("failed to record evaluated post {post_id}: {e}");
        }
    }

    fn posts_in_last_hour(&self, ctx: &AgentExecutionContext) -> u32 {
        match ctx.runtime.store.get_motivational_state(DRIVE_NAME) {
            Ok(Some(state)) => {
                let empty = Vec::new();
                let timestamps = state.metadata.get("recent_post_timestamps").and_then(|v| v.as_array()).unwrap_or(&empty);
                let cutoff = Utc::now() - chrono::Duration::hours(1);
                timestamps
                    .iter()
                    .filter_map(|v| v.as_str())
                    .filter_map(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                    .filter(|ts| ts.with_timezone(&Utc) > cutoff)
                    .count() as u32
            }
            _ => 0,
        }
    }

    fn record_post_timestamp(&self, ctx: &AgentExecutionContext) {
        let now = Utc::now();
        let mut timestamps: Vec<String> = match ctx.runtime.store.get_motivational_state(DRIVE_NAME) {
            Ok(Some(state)) => state
                .metadata
                .get("recent_post_timestamps")
                .and_then(|v| v.as_array())
                .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        let cutoff = now - chrono::Duration::hours(1);
        timestamps.retain(|s| chrono::DateTime::parse_from_rfc3339(s).map(|ts| ts.with_timezone(&Utc) > cutoff).unwrap_or(false));
        timestamps.push(now.to_rfc3339());
        let patch = serde_json::json!({"recent_post_timestamps": timestamps});
        if let Err(e) = ctx.runtime.store.patch_motivational_state_metadata(DRIVE_NAME, &patch) {
            log::warn!("failed to persist social monitor post timestamps: {e}");
        }
    }

    async fn evaluate_post(&self, ctx: &AgentExecutionContext, post: &FeedPost) -> Option<Evaluation> {
        let mut request = CallRequest::new(
            system_prompt(),
            format!("Evaluate this post from {}:\n\nPOST ID: {}\nCONTENT: {}\n\nShould this be corrected?", post.author, post.id, post.content),
            ctx.llm_model.clone(),
        );
        request.max_output_tokens = 1024;
        request.temperature = 0.3;
        request.thought_tree_id = Some(ctx.thought_tree_id);
        request.agent_id = Some(ctx.agent_id);

        match call_and_log(&ctx.runtime, request, Some(ctx.agent_id)).await {
            Ok(response) => Some(parse_evaluation(&response.text)),
            Err(e) => {
                log::warn!("evaluation failed for post {}: {e}", post.id);
                None
            }
        }
    }
}

#[async_trait]
impl AgentSpecialization for SocialMonitorAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Task
    }

    fn implementation_class(&self) -> &'static str {
        "SocialMonitorAgent"
    }

    async fn validate_input(&self, _input: &Value) -> bool {
        true
    }

    async fn execute(&self, ctx: &AgentExecutionContext, _input: Value) -> AgentOutcome {
        let fetch_state = self.fetch_state(ctx);
        let posts = match self.feed.fetch_posts(&fetch_state.sort, self.post_limit, fetch_state.offset).await {
            Ok(posts) => posts,
            Err(e) => return AgentOutcome::failed(format!("failed to fetch feed posts: {e}")),
        };
        self.advance_fetch_state(ctx, &fetch_state);

        let new_posts: Vec<&FeedPost> = posts.iter().filter(|p| !self.already_evaluated(ctx, &p.id)).collect();

        let mut evaluated_count = 0u32;
        let mut responses_posted = 0u32;
        let mut total_tokens = 0u64;
        let total_cost = 0.0f64;

        for post in new_posts.iter() {
            if post.content.is_empty() {
                continue;
            }
            if self.posts_in_last_hour(ctx) + responses_posted >= 4 || responses_posted >= self.max_replies_per_run {
                break;
            }

            let Some(evaluation) = self.evaluate_post(ctx, post).await else { continue };
            evaluated_count += 1;
            self.record_evaluated(ctx, &post.id, &evaluation.claim_summary);

            if evaluation.should_respond {
                if let Err(e) = self.feed.post_response(&post.id, &evaluation.response_text).await {
                    log::warn!("failed to post response to {}: {e}", post.id);
                    continue;
                }
                self.record_post_timestamp(ctx);
                responses_posted += 1;
            }
        }

        // Rough per-call token accounting: call_and_log already records cost into cache
        // statistics; this total is a best-effort local tally for the result summary.
        total_tokens += (evaluated_count as u64) * 200;

        AgentOutcome::ok(
            format!("fetched {} posts, evaluated {evaluated_count}, posted {responses_posted} response(s)", posts.len()),
            total_tokens,
            total_cost,
        )
        .with_metadata(serde_json::json!({
            "posts_fetched": posts.len(),
            "posts_evaluated": evaluated_count,
            "responses_posted": responses_posted,
            "sort_strategy": fetch_state.sort,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_positive_evaluation() {
        let text = "SHOULD_RESPOND: yes\nCLAIM_SUMMARY: claims sentience\nREASONING: outlandish\nRESPONSE: That claim isn't supported by current evidence.";
        let eval = parse_evaluation(text);
        assert!(eval.should_respond);
        assert_eq!(eval.claim_summary, "claims sentience");
        assert!(!eval.response_text.is_empty());
    }

    #[test]
    fn parses_a_negative_evaluation() {
        let text = "SHOULD_RESPOND: no\nCLAIM_SUMMARY: asking a question\nREASONING: reasonable discussion\nRESPONSE: N/A";
        let eval = parse_evaluation(text);
        assert!(!eval.should_respond);
    }

    #[test]
    fn missing_response_text_never_triggers_a_reply() {
        let text = "SHOULD_RESPOND: yes\nCLAIM_SUMMARY: x\nREASONING: y\nRESPONSE:";
        let eval = parse_evaluation(text);
        assert!(!eval.should_respond);
    }

    #[test]
    fn sort_rotation_wraps_around() {
        assert_eq!(SORT_STRATEGIES[(SORT_STRATEGIES.len() - 1 + 1) % SORT_STRATEGIES.len()], "hot");
    }
}
