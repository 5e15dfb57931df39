//! Tool bridge port: how a running script reaches the router.
//!
//! The script runtime calls [`ToolBridge::call`] for every stub invocation.
//! The execution tracker implements it, so every call is counted, recorded
//! and routed.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use toolscript_domain::ErrorKind;

/// Failure of a single tool call, as seen by the script.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolCallError {
    #[error("unknown tool '{domain}.{tool}'")]
    UnknownTool { domain: String, tool: String },

    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("no worker is bound to '{tool}'")]
    NoWorker { tool: String },

    #[error("circuit open for '{tool}' (retry after {:.1}s)", .retry_after.as_secs_f64())]
    CircuitOpen { tool: String, retry_after: Duration },

    #[error("'{tool}' failed after {attempts} attempt(s): {cause}")]
    Execution {
        tool: String,
        attempts: u32,
        cause: String,
    },

    #[error("tool call cancelled")]
    Cancelled,

    #[error("tool call limit of {limit} exceeded")]
    ResourceLimitExceeded { limit: usize },
}

impl ToolCallError {
    /// Kind reported when this error ends an execution
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            ToolCallError::UnknownTool { .. }
            | ToolCallError::InvalidArguments { .. }
            | ToolCallError::NoWorker { .. }
            | ToolCallError::Execution { .. } => ErrorKind::ToolExecutionError,
            ToolCallError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            ToolCallError::Cancelled => ErrorKind::Cancelled,
            ToolCallError::ResourceLimitExceeded { .. } => ErrorKind::ResourceLimitExceeded,
        }
    }

    /// Whether this error ends the execution rather than just the call
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            ToolCallError::Cancelled | ToolCallError::ResourceLimitExceeded { .. }
        )
    }
}

#[async_trait]
pub trait ToolBridge: Send + Sync {
    /// Route one call. The result is returned unchanged.
    async fn call(
        &self,
        domain: &str,
        tool: &str,
        params: Value,
        idempotency_key: Option<String>,
    ) -> Result<Value, ToolCallError>;
}
