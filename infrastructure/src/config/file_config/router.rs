//! Router policy from TOML (`[router]` section and its subtables)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use toolscript_application::{IdempotencyConfig, RouterConfig};
use toolscript_domain::{BreakerPolicy, RetryPolicy};

/// `[router.retry]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for FileRetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            jitter: policy.jitter,
        }
    }
}

/// `[router.breaker]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
}

impl Default for FileBreakerConfig {
    fn default() -> Self {
        let policy = BreakerPolicy::default();
        Self {
            failure_threshold: policy.failure_threshold,
            cooldown_ms: policy.cooldown.as_millis() as u64,
        }
    }
}

/// `[router.idempotency]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileIdempotencyConfig {
    pub ttl_ms: u64,
    pub capacity_per_tool: usize,
    pub derive_keys: bool,
}

impl Default for FileIdempotencyConfig {
    fn default() -> Self {
        let config = IdempotencyConfig::default();
        Self {
            ttl_ms: config.ttl.as_millis() as u64,
            capacity_per_tool: config.capacity_per_tool,
            derive_keys: config.derive_keys,
        }
    }
}

/// `[router]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRouterConfig {
    pub per_call_timeout_ms: u64,
    pub retry: FileRetryConfig,
    pub breaker: FileBreakerConfig,
    pub idempotency: FileIdempotencyConfig,
}

impl Default for FileRouterConfig {
    fn default() -> Self {
        Self {
            per_call_timeout_ms: RouterConfig::default().per_call_timeout.as_millis() as u64,
            retry: FileRetryConfig::default(),
            breaker: FileBreakerConfig::default(),
            idempotency: FileIdempotencyConfig::default(),
        }
    }
}

impl FileRouterConfig {
    pub fn to_router_config(&self) -> RouterConfig {
        RouterConfig {
            per_call_timeout: Duration::from_millis(self.per_call_timeout_ms),
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
                max_delay: Duration::from_millis(self.retry.max_delay_ms),
                jitter: self.retry.jitter,
            },
            breaker: BreakerPolicy {
                failure_threshold: self.breaker.failure_threshold,
                cooldown: Duration::from_millis(self.breaker.cooldown_ms),
            },
            idempotency: IdempotencyConfig {
                ttl: Duration::from_millis(self.idempotency.ttl_ms),
                capacity_per_tool: self.idempotency.capacity_per_tool,
                derive_keys: self.idempotency.derive_keys,
            },
        }
    }
}
