// src/agentflow/llm/cache.rs

//! Decides what to mark cacheable and records real server-reported cache hits.
//!
//! The manager never decides whether a request *was* a cache hit — only the provider's
//! response usage fields can say that (see [`TokenUsage::is_cache_hit`]). This module decides
//! what to *mark* cacheable before the request goes out, and keeps the running statistics the
//! rest of the system reads to quantify savings.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::models::{CallRequest, TextBlock, TokenUsage};

/// Process-global, thread-safe counters. Every field is a plain counter so updates are
/// commutative and require no cross-field locking; dollar totals use a mutex because `f64`
/// has no atomic form.
#[derive(Debug)]
pub struct CacheStatistics {
    total_requests: AtomicU64,
    cache_creation_requests: AtomicU64,
    cache_hit_requests: AtomicU64,
    total_input_tokens: AtomicU64,
    cached_tokens: AtomicU64,
    cache_read_tokens: AtomicU64,
    dollars: Mutex<DollarTotals>,
}

#[derive(Debug, Default, Clone, Copy)]
struct DollarTotals {
    total_cost: f64,
    cost_without_cache: f64,
    cost_saved: f64,
}

/// Point-in-time snapshot suitable for an API response or a log line.
#[derive(Debug, Clone)]
pub struct CacheStatisticsSnapshot {
    pub total_requests: u64,
    pub cache_creation_requests: u64,
    pub cache_hit_requests: u64,
    pub cache_hit_rate: f64,
    pub total_input_tokens: u64,
    pub cached_tokens: u64,
    pub cache_read_tokens: u64,
    pub token_savings_rate: f64,
    pub total_cost_usd: f64,
    pub cost_without_cache_usd: f64,
    pub cost_saved_usd: f64,
    pub cost_savings_rate: f64,
}

impl CacheStatistics {
    pub fn new() -> Self {
        CacheStatistics {
            total_requests: AtomicU64::new(0),
            cache_creation_requests: AtomicU64::new(0),
            cache_hit_requests: AtomicU64::new(0),
            total_input_tokens: AtomicU64::new(0),
            cached_tokens: AtomicU64::new(0),
            cache_read_tokens: AtomicU64::new(0),
            dollars: Mutex::new(DollarTotals::default()),
        }
    }

    /// Folds in the outcome of one completed call.
    pub fn record(&self, usage: &TokenUsage, cost_usd: f64, cost_without_cache_usd: f64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_input_tokens.fetch_add(usage.input_tokens, Ordering::Relaxed);

        if usage.is_cache_hit() {
            self.cache_hit_requests.fetch_add(1, Ordering::Relaxed);
            self.cache_read_tokens
                .fetch_add(usage.cache_read_input_tokens, Ordering::Relaxed);
        } else {
            self.cache_creation_requests.fetch_add(1, Ordering::Relaxed);
            self.cached_tokens
                .fetch_add(usage.cache_creation_input_tokens, Ordering::Relaxed);
        }

        let mut dollars = self.dollars.lock().expect("cache dollar totals lock poisoned");
        dollars.total_cost += cost_usd;
        dollars.cost_without_cache += cost_without_cache_usd;
        dollars.cost_saved += cost_without_cache_usd - cost_usd;
    }

    pub fn snapshot(&self) -> CacheStatisticsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_input_tokens = self.total_input_tokens.load(Ordering::Relaxed);
        let cache_hit_requests = self.cache_hit_requests.load(Ordering::Relaxed);
        let cached_tokens = self.cached_tokens.load(Ordering::Relaxed);
        let dollars = *self.dollars.lock().expect("cache dollar totals lock poisoned");

        CacheStatisticsSnapshot {
            total_requests,
            cache_creation_requests: self.cache_creation_requests.load(Ordering::Relaxed),
            cache_hit_requests,
            cache_hit_rate: ratio(cache_hit_requests, total_requests),
            total_input_tokens,
            cached_tokens,
            cache_read_tokens: self.cache_read_tokens.load(Ordering::Relaxed),
            token_savings_rate: ratio(cached_tokens, total_input_tokens),
            total_cost_usd: dollars.total_cost,
            cost_without_cache_usd: dollars.cost_without_cache,
            cost_saved_usd: dollars.cost_saved,
            cost_savings_rate: if dollars.cost_without_cache == 0.0 {
                0.0
            } else {
                dollars.cost_saved / dollars.cost_without_cache
            },
        }
    }
}

impl Default for CacheStatistics {
    fn default() -> Self {
        Self::new()
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Decides which text blocks in a request get a cache breakpoint.
pub struct PromptCacheManager {
    min_cacheable_tokens: usize,
    small_model_min_tokens: usize,
    max_breakpoints: usize,
}

impl PromptCacheManager {
    pub fn new(min_cacheable_tokens: usize, small_model_min_tokens: usize, max_breakpoints: usize) -> Self {
        PromptCacheManager {
            min_cacheable_tokens,
            small_model_min_tokens,
            max_breakpoints,
        }
    }

    fn threshold_for(&self, model: &str) -> usize {
        if model.to_lowercase().contains("haiku") {
            self.small_model_min_tokens
        } else {
            self.min_cacheable_tokens
        }
    }

    fn should_cache(&self, text: &str, model: &str) -> bool {
        (text.len() / 4) >= self.threshold_for(model)
    }

    /// Mutates `request` in place, annotating blocks with `cache_control` up to the configured
    /// breakpoint cap. Council sessions (`always_cache_system`) always cache their system
    /// blocks regardless of size.
    pub fn apply(&self, request: &mut CallRequest) {
        if !request.use_cache {
            return;
        }
        let mut breakpoints_used = 0usize;
        let model = request.model.clone();

        for block in request.system.iter_mut() {
            if breakpoints_used >= self.max_breakpoints {
                break;
            }
            if request.always_cache_system || self.should_cache(&block.text, &model) {
                mark_cached(block);
                breakpoints_used += 1;
            }
        }

        for block in request.user.iter_mut() {
            if breakpoints_used >= self.max_breakpoints {
                break;
            }
            if self.should_cache(&block.text, &model) {
                mark_cached(block);
                breakpoints_used += 1;
            }
        }
    }
}

fn mark_cached(block: &mut TextBlock) {
    block.cache_control = Some(super::models::CacheControl::ephemeral());
}

impl Default for PromptCacheManager {
    fn default() -> Self {
        PromptCacheManager::new(1024, 2048, 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_text(approx_tokens: usize) -> String {
        "x".repeat(approx_tokens * 4)
    }

    #[test]
    fn small_content_is_not_marked_cacheable() {
        let manager = PromptCacheManager::default();
        let mut req = CallRequest::new("short system", "short user", "claude-3-5-sonnet-20241022");
        manager.apply(&mut req);
        assert!(!req.system[0].is_cached());
        assert!(!req.user[0].is_cached());
    }

    #[test]
    fn large_system_prompt_crosses_default_threshold() {
        let manager = PromptCacheManager::default();
        let mut req = CallRequest::new(long_text(1200), "short user", "claude-3-5-sonnet-20241022");
        manager.apply(&mut req);
        assert!(req.system[0].is_cached());
        assert!(!req.user[0].is_cached());
    }

    #[test]
    fn haiku_model_needs_higher_threshold() {
        let manager = PromptCacheManager::default();
        let mut req = CallRequest::new(long_text(1500), "short user", "claude-3-5-haiku-20241022");
        manager.apply(&mut req);
        assert!(!req.system[0].is_cached(), "1500 tokens is under haiku's 2048 floor");
    }

    #[test]
    fn council_context_is_always_cached_regardless_of_size() {
        let manager = PromptCacheManager::default();
        let mut req = CallRequest::new("tiny shared context", "user query", "claude-3-5-sonnet-20241022");
        req.always_cache_system = true;
        manager.apply(&mut req);
        assert!(req.system[0].is_cached());
    }

    #[test]
    fn breakpoints_are_capped() {
        let manager = PromptCacheManager::new(10, 20, 1);
        let mut req = CallRequest::new(long_text(50), long_text(50), "claude-3-5-sonnet-20241022");
        manager.apply(&mut req);
        let cached_count = req.system.iter().chain(req.user.iter()).filter(|b| b.is_cached()).count();
        assert_eq!(cached_count, 1);
    }

    #[test]
    fn statistics_classify_hit_vs_creation() {
        let stats = CacheStatistics::new();
        let hit = TokenUsage {
            input_tokens: 100,
            output_tokens: 20,
            cache_creation_input_tokens: 0,
            cache_read_input_tokens: 80,
        };
        let miss = TokenUsage {
            input_tokens: 100,
            output_tokens: 20,
            cache_creation_input_tokens: 90,
            cache_read_input_tokens: 0,
        };
        stats.record(&hit, 0.01, 0.05);
        stats.record(&miss, 0.05, 0.05);
        let snap = stats.snapshot();
        assert_eq!(snap.total_requests, 2);
        assert_eq!(snap.cache_hit_requests, 1);
        assert_eq!(snap.cache_creation_requests, 1);
        assert!(snap.cost_saved_usd > 0.0);
    }
}
