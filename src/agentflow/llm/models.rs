// src/agentflow/llm/models.rs

//! Wire-adjacent types shared by the cache manager and the provider client.
//!
//! These mirror the provider-facing contract: system and user messages are ordered lists of
//! text blocks, each optionally annotated with an ephemeral `cache_control` marker.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The role a message plays in a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One segment of a system or user message.
///
/// `cache_control` is set exactly when [`crate::agentflow::llm::cache::PromptCacheManager`]
/// decided this segment was worth a cache breakpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(rename = "type", default = "text_block_type", skip_deserializing)]
    pub block_type: &'static str,
    pub text: Arc<str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

fn text_block_type() -> &'static str {
    "text"
}

impl TextBlock {
    pub fn plain(text: impl Into<Arc<str>>) -> Self {
        TextBlock {
            block_type: "text",
            text: text.into(),
            cache_control: None,
        }
    }

    pub fn cached(text: impl Into<Arc<str>>) -> Self {
        TextBlock {
            block_type: "text",
            text: text.into(),
            cache_control: Some(CacheControl::ephemeral()),
        }
    }

    pub fn is_cached(&self) -> bool {
        self.cache_control.is_some()
    }

    pub fn estimated_tokens(&self) -> usize {
        self.text.len() / 4
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheControl {
    #[serde(rename = "type", default = "cache_control_kind", skip_deserializing)]
    pub kind: &'static str,
}

fn cache_control_kind() -> &'static str {
    "ephemeral"
}

impl CacheControl {
    pub fn ephemeral() -> Self {
        CacheControl { kind: "ephemeral" }
    }
}

/// A single message directed at the model, built from one or more text blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub blocks: Vec<TextBlock>,
}

impl Message {
    pub fn system(text: impl Into<Arc<str>>) -> Self {
        Message {
            role: Role::System,
            blocks: vec![TextBlock::plain(text)],
        }
    }

    pub fn user(text: impl Into<Arc<str>>) -> Self {
        Message {
            role: Role::User,
            blocks: vec![TextBlock::plain(text)],
        }
    }

    pub fn assistant(text: impl Into<Arc<str>>) -> Self {
        Message {
            role: Role::Assistant,
            blocks: vec![TextBlock::plain(text)],
        }
    }

    pub fn text(&self) -> String {
        self.blocks.iter().map(|b| b.text.as_ref()).collect::<Vec<_>>().join("\n")
    }
}

/// Usage fields exactly as reported by the provider; the core consumes only these four.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
}

impl TokenUsage {
    pub fn is_cache_hit(&self) -> bool {
        self.cache_read_input_tokens > 0
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A fully-shaped request, ready to be sent to a [`super::client::LlmProvider`].
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub system: Vec<TextBlock>,
    pub user: Vec<TextBlock>,
    pub model: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub thought_tree_id: Option<uuid::Uuid>,
    pub agent_id: Option<uuid::Uuid>,
    pub use_cache: bool,
    /// Set when the shared context is from a council session, which is always cacheable
    /// regardless of estimated size.
    pub always_cache_system: bool,
}

impl CallRequest {
    pub fn new(system: impl Into<Arc<str>>, user: impl Into<Arc<str>>, model: impl Into<String>) -> Self {
        CallRequest {
            system: vec![TextBlock::plain(system)],
            user: vec![TextBlock::plain(user)],
            model: model.into(),
            max_output_tokens: 4096,
            temperature: 0.7,
            thought_tree_id: None,
            agent_id: None,
            use_cache: true,
            always_cache_system: false,
        }
    }

    /// 16-hex-character fingerprint over (system ‖ user ‖ model), a local bookkeeping hint only.
    pub fn cache_key(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        for block in &self.system {
            hasher.update(block.text.as_bytes());
        }
        hasher.update(b"|");
        for block in &self.user {
            hasher.update(block.text.as_bytes());
        }
        hasher.update(b"|");
        hasher.update(self.model.as_bytes());
        let digest = hasher.finalize();
        digest[..8].iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Failure kinds the LLM client surfaces to callers. Distinct from [`crate::agentflow::error::ErrorKind`]
/// so that retry decisions can be made on the specific failure shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmFailureKind {
    RateLimited,
    Connection,
    ProviderError,
    Timeout,
    CircuitOpen,
    AccountingError,
}

impl LlmFailureKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmFailureKind::RateLimited | LlmFailureKind::Connection | LlmFailureKind::Timeout)
    }
}

/// The result of a completed (successful) call.
#[derive(Debug, Clone)]
pub struct CallResponse {
    pub text: String,
    pub usage: TokenUsage,
    pub cost_usd: f64,
    pub cost_without_cache_usd: f64,
    pub latency: std::time::Duration,
    pub retry_count: u32,
    pub model: String,
}
