//! Shared resilience state: per-tool circuit breakers and the idempotency
//! cache. Owned by a router and injected, never global.

pub mod breaker_registry;
pub mod idempotency_cache;
pub mod shards;

pub use breaker_registry::{BreakerPermit, CircuitBreakerRegistry};
pub use idempotency_cache::{IdempotencyCache, KeyClaim};
pub use shards::PerToolShards;
