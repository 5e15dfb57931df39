//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file:
//! durations are integers in milliseconds, sizes in bytes. They convert
//! into the application's [`EngineConfig`].

mod output;
mod router;
mod sandbox;

pub use output::{FileOutputConfig, FileOutputFormat};
pub use router::{FileBreakerConfig, FileIdempotencyConfig, FileRetryConfig, FileRouterConfig};
pub use sandbox::FileSandboxConfig;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use toolscript_application::EngineConfig;
use toolscript_domain::RedactionPolicy;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error("{field} cannot be 0")]
    ZeroValue { field: &'static str },

    #[error("router.retry.base_delay_ms ({base}) exceeds router.retry.max_delay_ms ({max})")]
    InvalidRetryDelays { base: u64, max: u64 },

    #[error("redaction key cannot be empty")]
    EmptyRedactionKey,
}

/// `[redaction]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRedactionConfig {
    /// Parameter keys whose values are replaced in call records
    pub keys: Vec<String>,
}

impl Default for FileRedactionConfig {
    fn default() -> Self {
        Self {
            keys: RedactionPolicy::default().keys,
        }
    }
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Per-execution limits
    pub sandbox: FileSandboxConfig,
    /// Retry, breaker, idempotency and per-call timeout
    pub router: FileRouterConfig,
    /// Call-record redaction
    pub redaction: FileRedactionConfig,
    /// CLI output settings
    pub output: FileOutputConfig,
}

impl FileConfig {
    /// Reject values that would make the engine unusable.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let zero_checks: [(&'static str, bool); 7] = [
            (
                "sandbox.wall_clock_timeout_ms",
                self.sandbox.wall_clock_timeout_ms == 0,
            ),
            ("sandbox.max_tool_calls", self.sandbox.max_tool_calls == 0),
            ("sandbox.max_fanout", self.sandbox.max_fanout == 0),
            (
                "sandbox.instruction_check_interval",
                self.sandbox.instruction_check_interval == 0,
            ),
            (
                "router.per_call_timeout_ms",
                self.router.per_call_timeout_ms == 0,
            ),
            (
                "router.retry.max_attempts",
                self.router.retry.max_attempts == 0,
            ),
            (
                "router.breaker.failure_threshold",
                self.router.breaker.failure_threshold == 0,
            ),
        ];
        if let Some((field, _)) = zero_checks.iter().find(|(_, is_zero)| *is_zero) {
            return Err(ConfigValidationError::ZeroValue { field });
        }

        let retry = &self.router.retry;
        if retry.base_delay_ms > retry.max_delay_ms {
            return Err(ConfigValidationError::InvalidRetryDelays {
                base: retry.base_delay_ms,
                max: retry.max_delay_ms,
            });
        }

        if self.redaction.keys.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigValidationError::EmptyRedactionKey);
        }
        Ok(())
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_sandbox(self.sandbox.to_limits())
            .with_router(self.router.to_router_config())
            .with_redaction(RedactionPolicy::new(self.redaction.keys.iter().cloned()))
    }
}
