// src/agentflow/tools/http_tool.rs

//! A generic outbound HTTP request tool, restricted to a small verb set and a response size
//! cap. Grounded on the same `reqwest`-based request/response shape the social feed client uses
//! for its own outbound calls, generalized to an arbitrary URL rather than one fixed endpoint.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{Tool, ToolOutcome};

const MAX_RESPONSE_BYTES: usize = 1_000_000;

fn allowed_methods() -> HashSet<&'static str> {
    ["GET", "POST", "PUT", "DELETE", "PATCH"].into_iter().collect()
}

pub struct HttpTool {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTool {
    pub fn new(timeout: Duration) -> Self {
        HttpTool { client: reqwest::Client::new(), timeout }
    }
}

#[async_trait]
impl Tool for HttpTool {
    fn name(&self) -> &str {
        "http_request"
    }

    fn tool_class(&self) -> &'static str {
        "HttpRequestTool"
    }

    fn validate(&self, params: &Value) -> Result<(), String> {
        let url = params.get("url").and_then(Value::as_str).ok_or("missing required parameter: url")?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err("url must be http(s)".to_string());
        }
        Ok(())
    }

    fn check_safety(&self, params: &Value) -> Result<(), String> {
        let method = params.get("method").and_then(Value::as_str).unwrap_or("GET").to_uppercase();
        if !allowed_methods().contains(method.as_str()) {
            return Err(format!("method '{method}' is not permitted"));
        }
        let url = params.get("url").and_then(Value::as_str).unwrap_or("");
        if url.contains("169.254.169.254") || url.contains("localhost") || url.contains("127.0.0.1") {
            return Err("requests to local/metadata endpoints are blocked".to_string());
        }
        Ok(())
    }

    async fn run(&self, params: &Value) -> ToolOutcome {
        let url = params.get("url").and_then(Value::as_str).unwrap_or("");
        let method = params.get("method").and_then(Value::as_str).unwrap_or("GET").to_uppercase();
        let body = params.get("body").and_then(Value::as_str).map(str::to_string);

        let mut request = self.client.request(method.parse().unwrap_or(reqwest::Method::GET), url).timeout(self.timeout);
        if let Some(b) = body {
            request = request.body(b);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return ToolOutcome::failure(format!("request failed: {e}")),
        };
        let status = response.status();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => return ToolOutcome::failure(format!("failed to read response body: {e}")),
        };
        let truncated = text.len() > MAX_RESPONSE_BYTES;
        let output = if truncated { text.chars().take(MAX_RESPONSE_BYTES).collect() } else { text };

        ToolOutcome {
            success: status.is_success(),
            error_message: if status.is_success() { None } else { Some(format!("HTTP {status}")) },
            output,
            metadata: serde_json::json!({"status_code": status.as_u16(), "truncated": truncated}),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> HttpTool {
        HttpTool::new(Duration::from_secs(5))
    }

    #[test]
    fn non_http_url_fails_validation() {
        assert!(tool().validate(&serde_json::json!({"url": "file:///etc/passwd"})).is_err());
    }

    #[test]
    fn local_metadata_endpoint_is_blocked() {
        let err = tool().check_safety(&serde_json::json!({"url": "http://169.254.169.254/latest/meta-data", "method": "GET"}));
        assert!(err.is_err());
    }

    #[test]
    fn trace_method_is_rejected() {
        let err = tool().check_safety(&serde_json::json!({"url": "https://example.com", "method": "TRACE"}));
        assert!(err.is_err());
    }

    #[test]
    fn get_to_a_public_host_passes_safety_check() {
        assert!(tool().check_safety(&serde_json::json!({"url": "https://example.com", "method": "GET"})).is_ok());
    }
}
