//! Execution guard: the single abort switch for one execution.
//!
//! Holds the cancellation token every pending call selects on, the
//! wall-clock deadline, and the first abort reason. The runtime polls it
//! from its instruction hook and from every host function; the tracker trips
//! it when the call cap is exceeded; the executor trips it on deadline.

use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use toolscript_domain::ErrorKind;

/// Why an execution was stopped from outside the script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Wall-clock deadline expired
    Timeout,
    /// Tool-call cap exceeded
    ResourceLimit { limit: usize },
    /// The caller cancelled
    Cancelled,
}

impl AbortReason {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            AbortReason::Timeout => ErrorKind::Timeout,
            AbortReason::ResourceLimit { .. } => ErrorKind::ResourceLimitExceeded,
            AbortReason::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn message(&self, timeout: Duration) -> String {
        match self {
            AbortReason::Timeout => format!(
                "execution exceeded its deadline of {:.3}s",
                timeout.as_secs_f64()
            ),
            AbortReason::ResourceLimit { limit } => {
                format!("execution exceeded the limit of {} tool calls", limit)
            }
            AbortReason::Cancelled => "execution was cancelled".to_string(),
        }
    }
}

struct GuardInner {
    token: CancellationToken,
    reason: OnceLock<AbortReason>,
    deadline: Instant,
}

#[derive(Clone)]
pub struct ExecutionGuard {
    inner: Arc<GuardInner>,
}

impl ExecutionGuard {
    /// Guard with its own token, or a child of `parent` so the caller can
    /// cancel the execution.
    pub fn new(deadline: Instant, parent: Option<&CancellationToken>) -> Self {
        let token = parent.map_or_else(CancellationToken::new, CancellationToken::child_token);
        Self {
            inner: Arc::new(GuardInner {
                token,
                reason: OnceLock::new(),
                deadline,
            }),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    pub fn deadline(&self) -> Instant {
        self.inner.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.inner.deadline.saturating_duration_since(Instant::now())
    }

    /// Stop the execution. The first reason wins; returns whether this call
    /// set it.
    pub fn abort(&self, reason: AbortReason) -> bool {
        let first = self.inner.reason.set(reason).is_ok();
        self.inner.token.cancel();
        first
    }

    /// Abort reason, if any. A cancelled parent token counts as `Cancelled`.
    pub fn reason(&self) -> Option<AbortReason> {
        if let Some(reason) = self.inner.reason.get() {
            return Some(*reason);
        }
        self.inner
            .token
            .is_cancelled()
            .then_some(AbortReason::Cancelled)
    }

    /// Fails once the execution was aborted or its deadline passed.
    /// Passing the deadline aborts with `Timeout`.
    pub fn check(&self) -> Result<(), AbortReason> {
        if let Some(reason) = self.reason() {
            return Err(reason);
        }
        if Instant::now() >= self.inner.deadline {
            self.abort(AbortReason::Timeout);
            return Err(self.reason().unwrap_or(AbortReason::Timeout));
        }
        Ok(())
    }

    pub fn is_aborted(&self) -> bool {
        self.check().is_err()
    }
}

impl std::fmt::Debug for ExecutionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionGuard")
            .field("reason", &self.reason())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}
