//! Application-level configuration.
//!
//! - [`SandboxLimits`]: per-execution resource limits
//! - [`RouterConfig`]: retry, breaker, idempotency and per-call timeout policy
//! - [`EngineConfig`]: container handed to the executor

pub mod engine_config;

pub use engine_config::{EngineConfig, IdempotencyConfig, RouterConfig, SandboxLimits};
