//! Script runtime port: interface for the embedded interpreter.
//!
//! This port keeps the application layer independent of mlua. The
//! infrastructure layer provides the Lua implementation; tests use simple
//! closures.

use super::tool_bridge::{ToolBridge, ToolCallError};
use crate::config::SandboxLimits;
use crate::sandbox::{ExecutionGuard, OutputSink};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use toolscript_domain::StubModule;

/// Everything a runtime needs for one run.
pub struct ScriptRun {
    pub execution_id: String,
    pub script: String,
    /// Stub modules the script imported; nothing else is requirable
    pub modules: Vec<StubModule>,
    pub bridge: Arc<dyn ToolBridge>,
    pub guard: ExecutionGuard,
    pub output: OutputSink,
    pub limits: SandboxLimits,
}

/// Why a run did not produce a return value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptFailure {
    /// Stopped through the guard; the guard holds the reason
    Aborted,
    /// A tool error the script did not catch
    Tool(ToolCallError),
    /// The interpreter hit its memory cap
    MemoryLimit(String),
    /// Compile error or uncaught script error
    Script(String),
    /// Interpreter or host failure
    Internal(String),
}

impl std::fmt::Display for ScriptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptFailure::Aborted => write!(f, "aborted"),
            ScriptFailure::Tool(e) => write!(f, "{}", e),
            ScriptFailure::MemoryLimit(m) => write!(f, "memory limit exceeded: {}", m),
            ScriptFailure::Script(m) => write!(f, "{}", m),
            ScriptFailure::Internal(m) => write!(f, "internal error: {}", m),
        }
    }
}

impl std::error::Error for ScriptFailure {}

/// Port for the script runtime.
///
/// `run` resolves to the script's return value (`null` when it returns
/// nothing). Implementations must stop promptly once `run.guard` is aborted
/// and must never let the script observe host state beyond `run`.
#[async_trait]
pub trait ScriptRuntime: Send + Sync {
    async fn run(&self, run: ScriptRun) -> Result<Value, ScriptFailure>;
}
