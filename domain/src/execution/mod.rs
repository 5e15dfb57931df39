//! Execution results, call records and the per-execution state machine.

pub mod record;
pub mod redaction;
pub mod result;
pub mod state;

pub use record::{CallOutcome, ToolCallRecord};
pub use redaction::RedactionPolicy;
pub use result::{ErrorKind, ExecutionError, ExecutionResult};
pub use state::ExecutionState;
