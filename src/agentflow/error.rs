// src/agentflow/error.rs

//! Error taxonomy shared by every module in the crate.
//!
//! Every fallible path returns a [`CoreError`] tagged with a stable [`ErrorKind`]. The kind
//! drives both the `error_code` exposed to callers and any decision about whether a failure is
//! retryable further up the call stack.

use std::fmt;

/// Stable classification for a [`CoreError`].
///
/// Each variant maps to exactly one `error_code`. Do not reorder or repurpose variants once
/// assigned; callers may match on `ErrorKind` to decide retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    WorkflowExecution,
    MotivationalEngine,
    ToolExecution,
    LlmIntegration,
    Database,
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code, suitable for logging or external APIs.
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::WorkflowExecution => "WORKFLOW_EXECUTION_ERROR",
            ErrorKind::MotivationalEngine => "MOTIVATIONAL_ENGINE_ERROR",
            ErrorKind::ToolExecution => "TOOL_EXECUTION_ERROR",
            ErrorKind::LlmIntegration => "LLM_INTEGRATION_ERROR",
            ErrorKind::Database => "DATABASE_ERROR",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error_code())
    }
}

/// The crate's single error type.
///
/// `CoreError` carries a kind, a human-readable message, and an optional lower-level cause.
/// Construct one with [`CoreError::new`] or one of the `ErrorKind`-named helpers
/// (e.g. [`CoreError::validation`]).
#[derive(Debug)]
pub struct CoreError {
    kind: ErrorKind,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        CoreError {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        CoreError {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn workflow_execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::WorkflowExecution, message)
    }

    pub fn motivational_engine(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MotivationalEngine, message)
    }

    pub fn tool_execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ToolExecution, message)
    }

    pub fn llm_integration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LlmIntegration, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn error_code(&self) -> &'static str {
        self.kind.error_code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether a caller may reasonably retry the operation that produced this error.
    ///
    /// Validation and not-found are never retryable; database and internal errors are left to
    /// the caller's own judgment (`false` here, conservative default).
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::LlmIntegration | ErrorKind::ToolExecution)
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.error_code(), self.message)
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::with_source(ErrorKind::Database, e.to_string(), e)
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        CoreError::with_source(ErrorKind::LlmIntegration, e.to_string(), e)
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::with_source(ErrorKind::Internal, e.to_string(), e)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_is_stable_per_kind() {
        assert_eq!(ErrorKind::Validation.error_code(), "VALIDATION_ERROR");
        assert_eq!(ErrorKind::Database.error_code(), "DATABASE_ERROR");
    }

    #[test]
    fn retryable_only_for_llm_and_tool_errors() {
        assert!(CoreError::llm_integration("timeout").is_retryable());
        assert!(CoreError::tool_execution("shell failed").is_retryable());
        assert!(!CoreError::validation("bad input").is_retryable());
        assert!(!CoreError::not_found("missing agent").is_retryable());
    }

    #[test]
    fn display_includes_code_and_message() {
        let e = CoreError::workflow_execution("plan failed");
        assert_eq!(e.to_string(), "[WORKFLOW_EXECUTION_ERROR] plan failed");
    }
}
