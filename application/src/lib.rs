//! Application layer for toolscript
//!
//! This crate contains use cases, port definitions, shared resilience state
//! and application configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod resilience;
pub mod sandbox;
pub mod use_cases;

// Re-export commonly used types
pub use config::{EngineConfig, IdempotencyConfig, RouterConfig, SandboxLimits};
pub use ports::{
    execution_events::{
        CompositeEvents, ExecutionEvent, ExecutionEventSink, NoExecutionEvents, event_types,
    },
    script_runtime::{ScriptFailure, ScriptRun, ScriptRuntime},
    tool_bridge::{ToolBridge, ToolCallError},
    tool_worker::{ToolWorker, WorkerError, WorkerRegistry},
};
pub use resilience::{CircuitBreakerRegistry, IdempotencyCache};
pub use sandbox::{AbortReason, ExecutionGuard, OutputSink, TRUNCATION_MARKER};
pub use use_cases::execute_script::ScriptExecutor;
pub use use_cases::route_tool_call::ToolRouter;
pub use use_cases::stub_cache::StubCache;
pub use use_cases::toolset::Toolset;
pub use use_cases::track_calls::ExecutionTracker;
