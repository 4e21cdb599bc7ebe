// src/agentflow/agent/memory.rs

//! Memory agent: context persistence, retrieval, search, and LLM-backed summarization.
//!
//! Entries are typed by (scope, kind) and persisted durably; a bounded in-process LRU fronts
//! the store so repeated retrievals of the same entry within one agent's lifetime avoid a
//! round trip to SQLite.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use async_trait::async_trait;
use lru::LruCache;
use serde_json::Value;
use uuid::Uuid;

use crate::agentflow::llm::{call_and_log, CallRequest};
use crate::agentflow::persistence::store::MemoryEntryRecord;

use super::{AgentExecutionContext, AgentKind, AgentOutcome, AgentSpecialization};

const VALID_SCOPES: &[&str] = &["agent", "session", "thought_tree", "global"];
const VALID_KINDS: &[&str] = &["context", "learning", "communication", "decision", "performance"];
const VALID_OPERATIONS: &[&str] = &["store", "retrieve", "update", "delete", "search", "summarize"];

fn record_metadata(record: &MemoryEntryRecord, source: &str) -> Value {
    serde_json::json!({
        "memory_id": record.id,
        "memory_type": record.kind,
        "scope": record.scope,
        "relevance_score": record.relevance_score,
        "access_count": record.access_count,
        "source": source,
    })
}

pub struct MemoryAgent {
    cache: Mutex<LruCache<Uuid, MemoryEntryRecord>>,
}

impl MemoryAgent {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MemoryAgent { cache: Mutex::new(LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap())) }
    }

    fn cache_put(&self, record: MemoryEntryRecord) {
        if record.relevance_score > 0.7 {
            self.cache.lock().expect("memory cache lock poisoned").put(record.id, record);
        }
    }

    fn cache_get(&self, id: Uuid) -> Option<MemoryEntryRecord> {
        self.cache.lock().expect("memory cache lock poisoned").get(&id).cloned()
    }

    async fn handle_store(&self, ctx: &AgentExecutionContext, input: &Value) -> AgentOutcome {
        let content = match input.get("content").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return AgentOutcome::failed("missing required field for store operation: content"),
        };
        let kind = match input.get("memory_type").and_then(|v| v.as_str()).filter(|k| VALID_KINDS.contains(k)) {
            Some(k) => k.to_string(),
            None => return AgentOutcome::failed("missing or invalid memory_type for store operation"),
        };
        let scope = match input.get("scope").and_then(|v| v.as_str()).filter(|s| VALID_SCOPES.contains(s)) {
            Some(s) => s.to_string(),
            None => return AgentOutcome::failed("missing or invalid scope for store operation"),
        };
        let relevance_score = input.get("relevance_score").and_then(|v| v.as_f64()).unwrap_or(1.0).clamp(0.0, 1.0);
        let metadata = input.get("metadata").cloned().unwrap_or(serde_json::json!({}));

        let record = MemoryEntryRecord {
            id: Uuid::new_v4(),
            thought_tree_id: Some(ctx.thought_tree_id),
            scope,
            kind,
            content,
            metadata,
            relevance_score,
            access_count: 0,
        };

        if let Err(e) = ctx.runtime.store.insert_memory_entry(&record) {
            return AgentOutcome::failed(format!("store operation failed: {e}"));
        }
        let id = record.id;
        self.cache_put(record.clone());

        AgentOutcome::ok(format!("memory stored successfully with id: {id}"), 0, 0.0).with_metadata(serde_json::json!({
            "memory_id": id,
            "memory_type": record.kind,
            "scope": record.scope,
            "relevance_score": record.relevance_score,
        }))
    }

    async fn handle_retrieve(&self, ctx: &AgentExecutionContext, input: &Value) -> AgentOutcome {
        let memory_id = match input.get("memory_id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok()) {
            Some(id) => id,
            None => return AgentOutcome::failed("memory_id required for retrieve operation"),
        };

        if let Some(record) = self.cache_get(memory_id) {
            let _ = ctx.runtime.store.bump_memory_access_count(memory_id);
            return AgentOutcome::ok(record.content.clone(), 0, 0.0).with_metadata(record_metadata(&record, "cache"));
        }

        match ctx.runtime.store.get_memory_entry(memory_id) {
            Ok(Some(mut record)) => {
                let _ = ctx.runtime.store.bump_memory_access_count(memory_id);
                record.access_count += 1;
                let metadata = record_metadata(&record, "database");
                self.cache_put(record.clone());
                AgentOutcome::ok(record.content, 0, 0.0).with_metadata(metadata)
            }
            Ok(None) => AgentOutcome::failed(format!("memory entry not found: {memory_id}")),
            Err(e) => AgentOutcome::failed(format!("retrieve operation failed: {e}")),
        }
    }

    async fn handle_search(&self, ctx: &AgentExecutionContext, input: &Value) -> AgentOutcome {
        let query_text = match input.get("query_text").and_then(|v| v.as_str()) {
            Some(q) if !q.is_empty() => q.to_string(),
            _ => return AgentOutcome::failed("query_text required for search operation"),
        };
        let scopes: Option<Vec<String>> =
            input.get("scopes").and_then(|v| v.as_array()).map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect());
        let kinds: Option<Vec<String>> = input
            .get("memory_types")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect());
        let max_results = input.get("max_results").and_then(|v| v.as_u64()).map(|v| v as u32).unwrap_or(10);
        let min_relevance = input.get("min_relevance_score").and_then(|v| v.as_f64()).unwrap_or(0.5);

        match ctx.runtime.store.search_memory_entries(&query_text, scopes.as_deref(), kinds.as_deref(), min_relevance, max_results) {
            Ok(results) if !results.is_empty() => {
                let formatted: Vec<Value> = results
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "memory_id": r.id,
                            "content": r.content,
                            "memory_type": r.kind,
                            "scope": r.scope,
                            "relevance_score": r.relevance_score,
                        })
                    })
                    .collect();
                let content = serde_json::to_string_pretty(&formatted).unwrap_or_default();
                AgentOutcome::ok(content, 0, 0.0).with_metadata(serde_json::json!({
                    "query_text": query_text,
                    "results_count": results.len(),
                }))
            }
            Ok(_) => AgentOutcome::ok("no matching memories found", 0, 0.0)
                .with_metadata(serde_json::json!({"query_text": query_text, "results_count": 0})),
            Err(e) => AgentOutcome::failed(format!("search operation failed: {e}")),
        }
    }

    async fn handle_update(&self, ctx: &AgentExecutionContext, input: &Value) -> AgentOutcome {
        let memory_id = match input.get("memory_id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok()) {
            Some(id) => id,
            None => return AgentOutcome::failed("memory_id required for update operation"),
        };
        let content = match input.get("content").and_then(|v| v.as_str()) {
            Some(c) => c,
            None => return AgentOutcome::failed("content required for update operation"),
        };
        let metadata = input.get("metadata").cloned().unwrap_or(serde_json::json!({}));

        match ctx.runtime.store.update_memory_entry_content(memory_id, content, &metadata) {
            Ok(0) => AgentOutcome::failed(format!("memory entry not found: {memory_id}")),
            Ok(_) => {
                self.cache.lock().expect("memory cache lock poisoned").pop(&memory_id);
                AgentOutcome::ok(format!("memory {memory_id} updated"), 0, 0.0)
            }
            Err(e) => AgentOutcome::failed(format!("update operation failed: {e}")),
        }
    }

    async fn handle_delete(&self, ctx: &AgentExecutionContext, input: &Value) -> AgentOutcome {
        let memory_id = match input.get("memory_id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok()) {
            Some(id) => id,
            None => return AgentOutcome::failed("memory_id required for delete operation"),
        };
        match ctx.runtime.store.delete_memory_entry(memory_id) {
            Ok(0) => AgentOutcome::failed(format!("memory entry not found: {memory_id}")),
            Ok(_) => {
                self.cache.lock().expect("memory cache lock poisoned").pop(&memory_id);
                AgentOutcome::ok(format!("memory {memory_id} deleted"), 0, 0.0)
            }
            Err(e) => AgentOutcome::failed(format!("delete operation failed: {e}")),
        }
    }

    async fn handle_summarize(&self, ctx: &AgentExecutionContext, input: &Value) -> AgentOutcome {
        let scope = input.get("scope").and_then(|v| v.as_str()).unwrap_or("thought_tree").to_string();
        let kinds: Vec<String> = input
            .get("memory_types")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_else(|| vec!["context".into(), "decision".into(), "learning".into()]);
        let max_memories = input.get("max_memories").and_then(|v| v.as_u64()).map(|v| v as u32).unwrap_or(20);
        let query_text = input.get("summary_focus").and_then(|v| v.as_str()).unwrap_or("");

        let memories = match ctx.runtime.store.search_memory_entries(query_text, Some(&[scope.clone()]), Some(&kinds), 0.3, max_memories) {
            Ok(m) => m,
            Err(e) => return AgentOutcome::failed(format!("summarize operation failed: {e}")),
        };

        if memories.is_empty() {
            return AgentOutcome::ok("no memories found in the specified scope for summarization", 0, 0.0)
                .with_metadata(serde_json::json!({"memories_found": 0}));
        }

        let memory_content: Vec<Value> = memories
            .iter()
            .map(|m| serde_json::json!({"type": m.kind, "scope": m.scope, "content": m.content}))
            .collect();
        let memory_count = memories.len();

        let mut request = CallRequest::new(
            "You are an expert memory analyst. Analyze the given memory entries and produce a \
             concise, actionable summary covering key decisions and outcomes, important context \
             and learnings, patterns and trends, and recommendations for future operations.",
            format!(
                "Summarize the following {memory_count} memory entries:\n\n{}\n\nProvide: an executive summary, key decisions and actions, important learnings, and recommendations.",
                serde_json::to_string_pretty(&memory_content).unwrap_or_default()
            ),
            ctx.llm_model.clone(),
        );
        request.max_output_tokens = input.get("max_tokens").and_then(|v| v.as_u64()).map(|v| v as u32).unwrap_or(2048);
        request.temperature = 0.5;
        request.thought_tree_id = Some(ctx.thought_tree_id);
        request.agent_id = Some(ctx.agent_id);

        match call_and_log(&ctx.runtime, request, Some(ctx.agent_id)).await {
            Ok(response) => AgentOutcome::ok(response.text, response.usage.total_tokens(), response.cost_usd)
                .with_metadata(serde_json::json!({"summarized_memories": memory_count, "scope": scope})),
            Err(e) => AgentOutcome::failed(format!("LLM summarization failed: {e}")),
        }
    }
}

impl Default for MemoryAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentSpecialization for MemoryAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Memory
    }

    fn implementation_class(&self) -> &'static str {
        "MemoryAgent"
    }

    async fn validate_input(&self, input: &Value) -> bool {
        input.get("operation").and_then(|v| v.as_str()).map(|op| VALID_OPERATIONS.contains(&op)).unwrap_or(false)
    }

    async fn execute(&self, ctx: &AgentExecutionContext, input: Value) -> AgentOutcome {
        match input.get("operation").and_then(|v| v.as_str()).unwrap_or("") {
            "store" => self.handle_store(ctx, &input).await,
            "retrieve" => self.handle_retrieve(ctx, &input).await,
            "search" => self.handle_search(ctx, &input).await,
            "update" => self.handle_update(ctx, &input).await,
            "delete" => self.handle_delete(ctx, &input).await,
            "summarize" => self.handle_summarize(ctx, &input).await,
            other => AgentOutcome::failed(format!("no handler found for operation: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_missing_operation() {
        let agent = MemoryAgent::new();
        assert!(!agent.validate_input(&serde_json::json!({})).await);
    }

    #[tokio::test]
    async fn rejects_unknown_operation() {
        let agent = MemoryAgent::new();
        assert!(!agent.validate_input(&serde_json::json!({"operation": "teleport"})).await);
    }

    #[tokio::test]
    async fn accepts_every_documented_operation() {
        let agent = MemoryAgent::new();
        for op in VALID_OPERATIONS {
            assert!(agent.validate_input(&serde_json::json!({"operation": op})).await);
        }
    }

    #[test]
    fn cache_only_keeps_high_relevance_entries() {
        let agent = MemoryAgent::with_capacity(4);
        let low = MemoryEntryRecord {
            id: Uuid::new_v4(),
            thought_tree_id: None,
            scope: "global".into(),
            kind: "context".into(),
            content: "low relevance".into(),
            metadata: serde_json::json!({}),
            relevance_score: 0.3,
            access_count: 0,
        };
        let id = low.id;
        agent.cache_put(low);
        assert!(agent.cache_get(id).is_none());
    }

    #[test]
    fn cache_keeps_high_relevance_entries() {
        let agent = MemoryAgent::with_capacity(4);
        let high = MemoryEntryRecord {
            id: Uuid::new_v4(),
            thought_tree_id: None,
            scope: "global".into(),
            kind: "context".into(),
            content: "high relevance".into(),
            metadata: serde_json::json!({}),
            relevance_score: 0.9,
            access_count: 0,
        };
        let id = high.id;
        agent.cache_put(high);
        assert!(agent.cache_get(id).is_some());
    }
}
