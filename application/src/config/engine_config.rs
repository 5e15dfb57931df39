//! Engine configuration: resource limits and router policy.
//!
//! [`EngineConfig`] groups everything an executor needs: the per-execution
//! [`SandboxLimits`], the long-lived [`RouterConfig`] and the
//! [`RedactionPolicy`] applied to recorded parameters. Every value has a
//! default; file and environment loading lives in the infrastructure layer.

use std::path::PathBuf;
use std::time::Duration;
use toolscript_domain::{BreakerPolicy, RedactionPolicy, RetryPolicy};

/// Limits applied to one script execution.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxLimits {
    /// Wall-clock deadline for the whole script
    pub wall_clock_timeout: Duration,
    /// Maximum tool calls one execution may issue
    pub max_tool_calls: usize,
    /// Upper bound on `parallel` width
    pub max_fanout: usize,
    /// Interpreter memory cap
    pub max_memory_bytes: usize,
    /// Captured output cap; overflow is dropped with a marker
    pub max_output_bytes: usize,
    /// Scripts larger than this are rejected before validation
    pub max_script_bytes: usize,
    /// Longest single `sleep`
    pub max_sleep: Duration,
    /// VM instructions between deadline checks
    pub instruction_check_interval: u32,
    /// Time the runtime gets to unwind after an abort
    pub cancel_grace: Duration,
    /// Directory backing `scratch.*`; absent means no scratch API
    pub scratch_dir: Option<PathBuf>,
    /// Bytes one execution may write through `scratch.write`
    pub max_scratch_bytes: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            wall_clock_timeout: Duration::from_secs(30),
            max_tool_calls: 64,
            max_fanout: 8,
            max_memory_bytes: 64 * 1024 * 1024,
            max_output_bytes: 1024 * 1024,
            max_script_bytes: 64 * 1024,
            max_sleep: Duration::from_secs(5),
            instruction_check_interval: 1000,
            cancel_grace: Duration::from_millis(100),
            scratch_dir: None,
            max_scratch_bytes: 16 * 1024 * 1024,
        }
    }
}

impl SandboxLimits {
    // ==================== Builder Methods ====================

    pub fn with_wall_clock_timeout(mut self, timeout: Duration) -> Self {
        self.wall_clock_timeout = timeout;
        self
    }

    pub fn with_max_tool_calls(mut self, max: usize) -> Self {
        self.max_tool_calls = max;
        self
    }

    pub fn with_max_fanout(mut self, max: usize) -> Self {
        self.max_fanout = max;
        self
    }

    pub fn with_max_memory_bytes(mut self, max: usize) -> Self {
        self.max_memory_bytes = max;
        self
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    pub fn with_max_sleep(mut self, max: Duration) -> Self {
        self.max_sleep = max;
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn with_max_scratch_bytes(mut self, max: usize) -> Self {
        self.max_scratch_bytes = max;
        self
    }
}

/// Idempotency cache settings.
///
/// Entries expire `ttl` after being stored; each tool additionally keeps at
/// most `capacity_per_tool` entries, evicting the oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdempotencyConfig {
    pub ttl: Duration,
    pub capacity_per_tool: usize,
    /// Derive a key from tool name + parameters when none is given
    pub derive_keys: bool,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            capacity_per_tool: 256,
            derive_keys: true,
        }
    }
}

/// Router policy, shared by every execution that uses the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// Timeout for a single worker attempt, independent of the sandbox deadline
    pub per_call_timeout: Duration,
    pub retry: RetryPolicy,
    pub breaker: BreakerPolicy,
    pub idempotency: IdempotencyConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            per_call_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            breaker: BreakerPolicy::default(),
            idempotency: IdempotencyConfig::default(),
        }
    }
}

impl RouterConfig {
    pub fn with_per_call_timeout(mut self, timeout: Duration) -> Self {
        self.per_call_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_breaker(mut self, breaker: BreakerPolicy) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_idempotency(mut self, idempotency: IdempotencyConfig) -> Self {
        self.idempotency = idempotency;
        self
    }
}

/// Everything an executor is configured with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub sandbox: SandboxLimits,
    pub router: RouterConfig,
    pub redaction: RedactionPolicy,
}

impl EngineConfig {
    pub fn with_sandbox(mut self, sandbox: SandboxLimits) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_router(mut self, router: RouterConfig) -> Self {
        self.router = router;
        self
    }

    pub fn with_redaction(mut self, redaction: RedactionPolicy) -> Self {
        self.redaction = redaction;
        self
    }
}
