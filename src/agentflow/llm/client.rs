// src/agentflow/llm/client.rs

//! The provider-facing call path: request shaping, retry with exponential backoff, circuit
//! breaking, and cost accounting. [`AnthropicProvider`] is the concrete implementation behind
//! the [`LlmProvider`] trait; tests substitute a fake to avoid real network calls.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{error, warn};
use serde_json::json;
use tokio::time::sleep;

use crate::agentflow::config::LlmConfig;
use crate::agentflow::error::{CoreError, CoreResult};

use super::cache::PromptCacheManager;
use super::models::{CallRequest, CallResponse, LlmFailureKind, TokenUsage};

/// Per-million-token input/output rates, indexed by model name prefix match.
fn rate_for_model(model: &str) -> (f64, f64) {
    let m = model.to_lowercase();
    if m.contains("opus") {
        (15.0, 75.0)
    } else if m.contains("haiku") {
        (0.80, 4.0)
    } else {
        // sonnet and default
        (3.0, 15.0)
    }
}

fn calculate_cost(model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    let (input_rate, output_rate) = rate_for_model(model);
    (input_tokens as f64 / 1_000_000.0) * input_rate + (output_tokens as f64 / 1_000_000.0) * output_rate
}

/// Process-global circuit breaker. Opens after a run of consecutive failures, fails fast while
/// open, and resets itself once the cooldown window has elapsed.
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    failures: AtomicU32,
    open: AtomicBool,
    last_failure: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        CircuitBreaker {
            threshold,
            cooldown,
            failures: AtomicU32::new(0),
            open: AtomicBool::new(false),
            last_failure: Mutex::new(None),
        }
    }

    /// Returns true if the breaker is currently open. Resets itself (closing the breaker) if
    /// the cooldown has elapsed since the last failure.
    pub fn is_open(&self) -> bool {
        if !self.open.load(Ordering::SeqCst) {
            return false;
        }
        let mut last_failure = self.last_failure.lock().expect("circuit breaker lock poisoned");
        if let Some(at) = *last_failure {
            if at.elapsed() > self.cooldown {
                self.open.store(false, Ordering::SeqCst);
                self.failures.store(0, Ordering::SeqCst);
                *last_failure = None;
                warn!("circuit breaker reset after cooldown");
                return false;
            }
        }
        true
    }

    pub fn record_success(&self) {
        self.failures.store(0, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_failure.lock().expect("circuit breaker lock poisoned") = Some(Instant::now());
        if failures >= self.threshold {
            self.open.store(true, Ordering::SeqCst);
            error!("circuit breaker opened after {failures} consecutive failures");
        }
    }
}

/// Provider-agnostic call surface. An `AnthropicProvider` is the only implementation shipped,
/// but tests and future providers plug in behind this trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn call(&self, request: CallRequest) -> CoreResult<CallResponse>;
    fn model_name(&self) -> &str;
}

/// Claude-compatible provider: builds the wire request, runs cache-breakpoint insertion,
/// retries with exponential backoff, and enforces the process-global circuit breaker.
pub struct AnthropicProvider {
    http: reqwest::Client,
    config: LlmConfig,
    cache: PromptCacheManager,
    circuit_breaker: CircuitBreaker,
}

impl AnthropicProvider {
    pub fn new(config: LlmConfig) -> Self {
        let cache = PromptCacheManager::new(
            config.cache_min_tokens_default,
            config.cache_min_tokens_small_model,
            config.max_cache_breakpoints,
        );
        let circuit_breaker = CircuitBreaker::new(config.circuit_breaker_threshold, config.circuit_breaker_cooldown);
        AnthropicProvider {
            http: reqwest::Client::new(),
            config,
            cache,
            circuit_breaker,
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let scaled = self.config.backoff_base.as_secs_f64() * self.config.backoff_factor.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.config.backoff_cap.as_secs_f64()))
    }

    fn estimate_tokens(text: &str) -> u64 {
        (text.len() / 4) as u64
    }

    async fn send_once(&self, request: &CallRequest) -> Result<(String, TokenUsage), LlmFailureKind> {
        let system_json: Vec<_> = request
            .system
            .iter()
            .map(|b| {
                let mut value = json!({"type": "text", "text": b.text.as_ref()});
                if b.is_cached() {
                    value["cache_control"] = json!({"type": "ephemeral"});
                }
                value
            })
            .collect();

        let user_text = request.user.iter().map(|b| b.text.as_ref()).collect::<Vec<_>>().join("\n");
        let body = json!({
            "model": request.model,
            "max_tokens": request.max_output_tokens,
            "temperature": request.temperature,
            "system": system_json,
            "messages": [{"role": "user", "content": user_text}],
        });

        let response = self
            .http
            .post(&self.config.base_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("anthropic-beta", "prompt-caching-2024-07-31")
            .json(&body)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { LlmFailureKind::Timeout } else { LlmFailureKind::Connection })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmFailureKind::RateLimited);
        }
        if status.is_server_error() {
            return Err(LlmFailureKind::Connection);
        }
        if !status.is_success() {
            return Err(LlmFailureKind::ProviderError);
        }

        let payload: serde_json::Value = response.json().await.map_err(|_| LlmFailureKind::ProviderError)?;
        let text = payload["content"][0]["text"].as_str().unwrap_or_default().to_string();
        let usage = TokenUsage {
            input_tokens: payload["usage"]["input_tokens"].as_u64().unwrap_or(0),
            output_tokens: payload["usage"]["output_tokens"].as_u64().unwrap_or(0),
            cache_creation_input_tokens: payload["usage"]["cache_creation_input_tokens"].as_u64().unwrap_or(0),
            cache_read_input_tokens: payload["usage"]["cache_read_input_tokens"].as_u64().unwrap_or(0),
        };
        Ok((text, usage))
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn call(&self, mut request: CallRequest) -> CoreResult<CallResponse> {
        if self.circuit_breaker.is_open() {
            return Err(CoreError::llm_integration("circuit breaker is open"));
        }

        self.cache.apply(&mut request);
        let started = Instant::now();
        let mut retry_count = 0u32;
        let mut last_failure = LlmFailureKind::ProviderError;

        loop {
            match self.send_once(&request).await {
                Ok((text, usage)) => {
                    self.circuit_breaker.record_success();
                    let cost_usd = calculate_cost(&request.model, usage.input_tokens, usage.output_tokens);
                    let cost_without_cache_usd = if usage.cache_read_input_tokens > 0 {
                        let normal_cost = calculate_cost(&request.model, usage.cache_read_input_tokens, 0);
                        cost_usd + normal_cost - normal_cost * 0.1
                    } else {
                        cost_usd
                    };
                    return Ok(CallResponse {
                        text,
                        usage,
                        cost_usd,
                        cost_without_cache_usd,
                        latency: started.elapsed(),
                        retry_count,
                        model: request.model.clone(),
                    });
                }
                Err(kind) => {
                    last_failure = kind;
                    if !kind.is_retryable() || retry_count >= self.config.max_retries {
                        break;
                    }
                    let delay = self.backoff_delay(retry_count);
                    warn!("llm call failed ({kind:?}), retrying in {delay:?} (attempt {retry_count})");
                    sleep(delay).await;
                    retry_count += 1;
                }
            }
        }

        self.circuit_breaker.record_failure();
        let estimated_input = Self::estimate_tokens(&request.system.iter().map(|b| b.text.as_ref()).collect::<String>())
            + Self::estimate_tokens(&request.user.iter().map(|b| b.text.as_ref()).collect::<String>());
        let _ = estimated_input; // still filled in for failed-call bookkeeping at the caller layer
        Err(CoreError::llm_integration(format!("llm call failed after {retry_count} retries: {last_failure:?}")))
    }

    fn model_name(&self) -> &str {
        &self.config.default_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_breaker_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(300));
        assert!(!breaker.is_open());
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
        breaker.record_failure();
        assert!(breaker.is_open());
    }

    #[test]
    fn circuit_breaker_closes_after_cooldown() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        breaker.record_failure();
        assert!(breaker.is_open());
        std::thread::sleep(Duration::from_millis(20));
        assert!(!breaker.is_open());
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(300));
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert!(!breaker.is_open());
    }

    #[test]
    fn cost_calculation_scales_with_model_tier() {
        let sonnet = calculate_cost("claude-3-5-sonnet-20241022", 1_000_000, 0);
        let opus = calculate_cost("claude-3-opus-20240229", 1_000_000, 0);
        assert!(opus > sonnet);
    }
}
