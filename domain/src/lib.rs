//! Domain layer for toolscript
//!
//! This crate contains the core types and algorithms of the engine. It has
//! no dependencies on async runtimes, interpreters, or I/O.
//!
//! # Core Concepts
//!
//! ## Catalog
//!
//! Tools are described by a [`ToolCatalog`] of [`ToolDefinition`]s grouped by
//! domain. Each tool has a [`ToolKind`] that decides how it is dispatched.
//!
//! ## Scripts
//!
//! - **Validation**: [`ScriptValidator`] tokenizes a script and rejects
//!   dangerous constructs before anything runs
//! - **Stubs**: [`StubGenerator`] turns the catalog into one importable module
//!   per domain (progressive disclosure)
//!
//! ## Resilience
//!
//! Pure state machines for the circuit breaker, retry policy and idempotency
//! keys. Shared, locked registries live in the application layer.
//!
//! ## Execution
//!
//! [`ExecutionResult`], [`ToolCallRecord`] and the [`ExecutionState`] machine.

pub mod catalog;
pub mod core;
pub mod execution;
pub mod resilience;
pub mod script;

// Re-export commonly used types
pub use catalog::{
    ArgumentValidator, DefaultArgumentValidator, ParamType, ToolCatalog, ToolDefinition, ToolKind,
    ToolParameter,
};
pub use core::error::DomainError;
pub use execution::{
    CallOutcome, ErrorKind, ExecutionError, ExecutionResult, ExecutionState, RedactionPolicy,
    ToolCallRecord,
};
pub use resilience::{
    Admission, BreakerPolicy, BreakerStatus, BreakerTransition, CircuitBreakerState,
    IdempotencyEntry, IdempotencyKey, RetryPolicy,
};
pub use script::{
    IDEMPOTENCY_ARG, MODULE_PREFIX, ScriptValidator, SecurityViolation, StubBundle,
    StubGenerator, StubModule, ValidatedScript,
};
