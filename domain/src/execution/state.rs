//! Per-execution state machine.
//!
//! ```text
//! Pending ──> Validating ──> Rejected
//!                       └──> Running ──> Completed
//!                                   ├──> Failed
//!                                   ├──> TimedOut
//!                                   ├──> ResourceExceeded
//!                                   ├──> Cancelled
//!                                   └──> InternalError
//! ```
//!
//! `Failed` covers scripts that end on an uncaught tool or script error;
//! `Cancelled` covers caller-requested cancellation.

use super::result::ErrorKind;
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionState {
    Pending,
    Validating,
    Rejected,
    Running,
    Completed,
    Failed,
    TimedOut,
    ResourceExceeded,
    Cancelled,
    InternalError,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::Rejected => "rejected",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed-out",
            Self::ResourceExceeded => "resource-exceeded",
            Self::Cancelled => "cancelled",
            Self::InternalError => "internal-error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Validating | Self::Running)
    }

    /// Whether `self -> to` is a legal step
    pub fn can_transition_to(&self, to: ExecutionState) -> bool {
        match self {
            Self::Pending => to == Self::Validating,
            Self::Validating => matches!(to, Self::Rejected | Self::Running),
            Self::Running => to.is_terminal() && to != Self::Rejected,
            _ => false,
        }
    }

    pub fn transition(self, to: ExecutionState) -> Result<ExecutionState, DomainError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(DomainError::InvalidTransition {
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    /// Terminal state a finished run lands in, given its error kind
    pub fn terminal_for(error: Option<ErrorKind>) -> ExecutionState {
        match error {
            None => Self::Completed,
            Some(ErrorKind::SecurityViolation) => Self::Rejected,
            Some(ErrorKind::Timeout) => Self::TimedOut,
            Some(ErrorKind::ResourceLimitExceeded) => Self::ResourceExceeded,
            Some(ErrorKind::Cancelled) => Self::Cancelled,
            Some(ErrorKind::InternalError) => Self::InternalError,
            Some(
                ErrorKind::ToolExecutionError | ErrorKind::CircuitOpen | ErrorKind::ScriptError,
            ) => Self::Failed,
        }
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
