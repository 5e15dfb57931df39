//! Execution result value object

use super::record::ToolCallRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of an execution failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Rejected before execution; nothing ran
    SecurityViolation,
    /// Wall-clock deadline expired
    Timeout,
    /// Tool-call cap or memory cap exceeded
    ResourceLimitExceeded,
    /// Retries exhausted, or the call was invalid
    ToolExecutionError,
    /// Breaker open; the worker was never invoked
    CircuitOpen,
    /// Uncaught script error or compile failure
    ScriptError,
    /// Cancelled by the caller
    Cancelled,
    /// Runtime failure unrelated to the script
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SecurityViolation => "SecurityViolation",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::ResourceLimitExceeded => "ResourceLimitExceeded",
            ErrorKind::ToolExecutionError => "ToolExecutionError",
            ErrorKind::CircuitOpen => "CircuitOpen",
            ErrorKind::ScriptError => "ScriptError",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ExecutionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Outcome of one script run. Always complete, even on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub error: Option<ExecutionError>,
    /// Seconds
    pub execution_time: f64,
    pub captured_output: String,
    pub return_value: Value,
    /// Ordered by `call_index`
    pub tool_calls: Vec<ToolCallRecord>,
    pub execution_id: String,
}

impl ExecutionResult {
    /// Result for a script that never ran
    pub fn rejected(
        execution_id: impl Into<String>,
        error: ExecutionError,
        execution_time: f64,
    ) -> Self {
        Self {
            error: Some(error),
            execution_time,
            captured_output: String::new(),
            return_value: Value::Null,
            tool_calls: Vec::new(),
            execution_id: execution_id.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn completed_calls(&self) -> impl Iterator<Item = &ToolCallRecord> {
        self.tool_calls.iter().filter(|r| r.succeeded())
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_serializes_pascal_case() {
        assert_eq!(
            serde_json::to_value(ErrorKind::ResourceLimitExceeded).unwrap(),
            "ResourceLimitExceeded"
        );
    }

    #[test]
    fn test_rejected_result_has_no_calls() {
        let result = ExecutionResult::rejected(
            "exec-1",
            ExecutionError::new(ErrorKind::SecurityViolation, "use of 'os' is not allowed"),
            0.001,
        );
        assert!(!result.is_success());
        assert_eq!(result.error_kind(), Some(ErrorKind::SecurityViolation));
        assert!(result.tool_calls.is_empty());

        let json = result.to_json();
        assert_eq!(json["error"]["kind"], "SecurityViolation");
        assert_eq!(json["return_value"], Value::Null);
        assert_eq!(json["execution_id"], "exec-1");
    }
}
