//! Per-call audit records

use crate::catalog::entities::ToolKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tool call as seen by the execution tracker.
///
/// Issued with `completed_at`, `duration` and `result_size` unset, then
/// finalized exactly once. Timestamps are seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub domain: String,
    pub kind: ToolKind,
    /// Redacted copy of the parameters
    pub parameters: Value,
    /// Issue order within the execution, starting at 0
    pub call_index: u64,
    pub started_at: f64,
    pub completed_at: Option<f64>,
    /// Seconds
    pub duration: Option<f64>,
    pub error: Option<String>,
    /// Byte length of the result's JSON serialization
    pub result_size: Option<usize>,
}

/// How a recorded call ended
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Success { result_size: usize },
    Failure { error: String },
}

impl ToolCallRecord {
    pub fn issued(
        domain: impl Into<String>,
        tool: impl Into<String>,
        kind: ToolKind,
        parameters: Value,
        call_index: u64,
        started_at: f64,
    ) -> Self {
        Self {
            tool: tool.into(),
            domain: domain.into(),
            kind,
            parameters,
            call_index,
            started_at,
            completed_at: None,
            duration: None,
            error: None,
            result_size: None,
        }
    }

    pub fn finish(mut self, completed_at: f64, duration: f64, outcome: CallOutcome) -> Self {
        self.completed_at = Some(completed_at);
        self.duration = Some(duration);
        match outcome {
            CallOutcome::Success { result_size } => self.result_size = Some(result_size),
            CallOutcome::Failure { error } => self.error = Some(error),
        }
        self
    }

    pub fn is_finished(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn succeeded(&self) -> bool {
        self.is_finished() && self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_finish_success() {
        let record = ToolCallRecord::issued(
            "weather",
            "get_weather",
            ToolKind::RemoteWorker,
            json!({"location": "NYC"}),
            0,
            100.0,
        );
        assert!(!record.is_finished());

        let record = record.finish(100.5, 0.5, CallOutcome::Success { result_size: 12 });
        assert!(record.succeeded());
        assert_eq!(record.result_size, Some(12));
        assert_eq!(record.duration, Some(0.5));
    }

    #[test]
    fn test_serialized_shape() {
        let record = ToolCallRecord::issued("d", "t", ToolKind::LocalFunction, json!({}), 3, 1.0)
            .finish(
                2.0,
                1.0,
                CallOutcome::Failure {
                    error: "boom".to_string(),
                },
            );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["tool"], "t");
        assert_eq!(value["kind"], "local-function");
        assert_eq!(value["call_index"], 3);
        assert_eq!(value["error"], "boom");
        assert_eq!(value["result_size"], Value::Null);
    }
}
