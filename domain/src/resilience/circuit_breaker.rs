//! Per-tool circuit breaker state machine.
//!
//! Pure and clock-injected: every method that depends on time takes `now`,
//! so the transitions can be tested without sleeping. Locking lives in the
//! application layer.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakerStatus {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerStatus::Closed => "closed",
            BreakerStatus::Open => "open",
            BreakerStatus::HalfOpen => "half-open",
        }
    }
}

impl std::fmt::Display for BreakerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Thresholds that drive the breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerPolicy {
    /// Consecutive failures in `closed` that trip the breaker
    pub failure_threshold: u32,
    /// Time spent `open` before a trial call is allowed
    pub cooldown: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Outcome of asking the breaker whether a call may proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Breaker closed; proceed normally
    Allowed,
    /// The single half-open probe; its outcome decides the next state
    Trial,
    /// Fail fast without invoking the worker
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::Rejected { .. })
    }
}

/// A status change, reported so callers can log and emit events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerTransition {
    pub from: BreakerStatus,
    pub to: BreakerStatus,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerState {
    status: BreakerStatus,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerState {
    pub fn new() -> Self {
        Self {
            status: BreakerStatus::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }

    pub fn status(&self) -> BreakerStatus {
        self.status
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn opened_at(&self) -> Option<Instant> {
        self.opened_at
    }

    pub fn trial_in_flight(&self) -> bool {
        self.trial_in_flight
    }

    /// Decide whether a call may proceed.
    ///
    /// Must run in the same critical section as the state it reads: an
    /// `open` breaker whose cooldown elapsed hands out exactly one `Trial`.
    pub fn admit(
        &mut self,
        policy: &BreakerPolicy,
        now: Instant,
    ) -> (Admission, Option<BreakerTransition>) {
        match self.status {
            BreakerStatus::Closed => (Admission::Allowed, None),
            BreakerStatus::Open => {
                let opened_at = self.opened_at.unwrap_or(now);
                let elapsed = now.saturating_duration_since(opened_at);
                if elapsed >= policy.cooldown {
                    self.trial_in_flight = true;
                    let transition = self.move_to(BreakerStatus::HalfOpen);
                    (Admission::Trial, transition)
                } else {
                    (
                        Admission::Rejected {
                            retry_after: policy.cooldown - elapsed,
                        },
                        None,
                    )
                }
            }
            BreakerStatus::HalfOpen => {
                if self.trial_in_flight {
                    (
                        Admission::Rejected {
                            retry_after: Duration::ZERO,
                        },
                        None,
                    )
                } else {
                    self.trial_in_flight = true;
                    (Admission::Trial, None)
                }
            }
        }
    }

    /// Record a successful call. `trial` is true for the half-open probe.
    pub fn record_success(&mut self, trial: bool) -> Option<BreakerTransition> {
        match self.status {
            BreakerStatus::Closed => {
                self.consecutive_failures = 0;
                None
            }
            BreakerStatus::HalfOpen if trial => {
                self.trial_in_flight = false;
                self.consecutive_failures = 0;
                self.opened_at = None;
                self.move_to(BreakerStatus::Closed)
            }
            // Late results from calls admitted before the breaker tripped
            // do not decide its state.
            _ => None,
        }
    }

    /// Record a failed call. `trial` is true for the half-open probe.
    pub fn record_failure(
        &mut self,
        policy: &BreakerPolicy,
        trial: bool,
        now: Instant,
    ) -> Option<BreakerTransition> {
        match self.status {
            BreakerStatus::Closed => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures >= policy.failure_threshold {
                    self.opened_at = Some(now);
                    self.move_to(BreakerStatus::Open)
                } else {
                    None
                }
            }
            BreakerStatus::HalfOpen if trial => {
                self.trial_in_flight = false;
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.opened_at = Some(now);
                self.move_to(BreakerStatus::Open)
            }
            _ => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                None
            }
        }
    }

    /// Give back the half-open slot of a trial that ended without an outcome
    /// (cancelled or dropped).
    pub fn release_trial(&mut self) {
        if self.status == BreakerStatus::HalfOpen {
            self.trial_in_flight = false;
        }
    }

    fn move_to(&mut self, to: BreakerStatus) -> Option<BreakerTransition> {
        let from = self.status;
        self.status = to;
        (from != to).then_some(BreakerTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BreakerPolicy {
        BreakerPolicy {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        }
    }

    fn tripped(now: Instant) -> CircuitBreakerState {
        let mut state = CircuitBreakerState::new();
        for _ in 0..3 {
            state.record_failure(&policy(), false, now);
        }
        state
    }

    #[test]
    fn test_closed_allows_and_counts_failures() {
        let now = Instant::now();
        let mut state = CircuitBreakerState::new();
        assert_eq!(state.admit(&policy(), now).0, Admission::Allowed);

        assert!(state.record_failure(&policy(), false, now).is_none());
        assert!(state.record_failure(&policy(), false, now).is_none());
        assert_eq!(state.consecutive_failures(), 2);

        let transition = state.record_failure(&policy(), false, now).unwrap();
        assert_eq!(transition.from, BreakerStatus::Closed);
        assert_eq!(transition.to, BreakerStatus::Open);
        assert_eq!(state.opened_at(), Some(now));
    }

    #[test]
    fn test_success_in_closed_resets_counter() {
        let now = Instant::now();
        let mut state = CircuitBreakerState::new();
        state.record_failure(&policy(), false, now);
        state.record_failure(&policy(), false, now);
        state.record_success(false);
        assert_eq!(state.consecutive_failures(), 0);
        assert!(state.record_failure(&policy(), false, now).is_none());
    }

    #[test]
    fn test_open_rejects_within_cooldown() {
        let now = Instant::now();
        let mut state = tripped(now);
        let (admission, transition) = state.admit(&policy(), now + Duration::from_secs(10));
        assert_eq!(
            admission,
            Admission::Rejected {
                retry_after: Duration::from_secs(20)
            }
        );
        assert!(transition.is_none());
        assert_eq!(state.status(), BreakerStatus::Open);
    }

    #[test]
    fn test_cooldown_allows_exactly_one_trial() {
        let now = Instant::now();
        let mut state = tripped(now);
        let later = now + Duration::from_secs(30);

        let (first, transition) = state.admit(&policy(), later);
        assert_eq!(first, Admission::Trial);
        assert_eq!(transition.unwrap().to, BreakerStatus::HalfOpen);

        let (second, _) = state.admit(&policy(), later);
        assert!(!second.is_admitted());
    }

    #[test]
    fn test_trial_success_closes() {
        let now = Instant::now();
        let mut state = tripped(now);
        state.admit(&policy(), now + Duration::from_secs(31));
        let transition = state.record_success(true).unwrap();
        assert_eq!(transition.to, BreakerStatus::Closed);
        assert_eq!(state.consecutive_failures(), 0);
        assert!(state.opened_at().is_none());
    }

    #[test]
    fn test_trial_failure_reopens_immediately() {
        let now = Instant::now();
        let mut state = tripped(now);
        let later = now + Duration::from_secs(31);
        state.admit(&policy(), later);
        let transition = state.record_failure(&policy(), true, later).unwrap();
        assert_eq!(transition.from, BreakerStatus::HalfOpen);
        assert_eq!(transition.to, BreakerStatus::Open);
        assert_eq!(state.opened_at(), Some(later));

        // A fresh cooldown starts from the reopen instant
        let (admission, _) = state.admit(&policy(), later + Duration::from_secs(1));
        assert!(!admission.is_admitted());
    }

    #[test]
    fn test_released_trial_can_be_retaken() {
        let now = Instant::now();
        let mut state = tripped(now);
        let later = now + Duration::from_secs(31);
        state.admit(&policy(), later);
        state.release_trial();
        assert_eq!(state.status(), BreakerStatus::HalfOpen);
        assert_eq!(state.admit(&policy(), later).0, Admission::Trial);
    }

    #[test]
    fn test_late_success_does_not_close_half_open() {
        let now = Instant::now();
        let mut state = tripped(now);
        state.admit(&policy(), now + Duration::from_secs(31));
        assert!(state.record_success(false).is_none());
        assert_eq!(state.status(), BreakerStatus::HalfOpen);
    }
}
