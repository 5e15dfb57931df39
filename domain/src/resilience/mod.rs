//! Resilience primitives: circuit breaker, retry policy, idempotency keys.
//!
//! These are pure state machines and value objects; the shared, locked
//! registries that hold them live in the application layer.

pub mod circuit_breaker;
pub mod idempotency;
pub mod retry;

pub use circuit_breaker::{
    Admission, BreakerPolicy, BreakerStatus, BreakerTransition, CircuitBreakerState,
};
pub use idempotency::{IdempotencyEntry, IdempotencyKey};
pub use retry::RetryPolicy;
