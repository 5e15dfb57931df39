//! Circuit breakers for every tool, behind per-tool locks.

use super::shards::{PerToolShards, lock};
use crate::ports::execution_events::{ExecutionEvent, ExecutionEventSink, event_types};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use toolscript_domain::{Admission, BreakerPolicy, BreakerStatus, BreakerTransition, CircuitBreakerState};

pub struct CircuitBreakerRegistry {
    policy: BreakerPolicy,
    shards: PerToolShards<CircuitBreakerState>,
    events: Arc<dyn ExecutionEventSink>,
}

impl CircuitBreakerRegistry {
    pub fn new(policy: BreakerPolicy, events: Arc<dyn ExecutionEventSink>) -> Self {
        Self {
            policy,
            shards: PerToolShards::new(),
            events,
        }
    }

    pub fn policy(&self) -> &BreakerPolicy {
        &self.policy
    }

    /// Ask to call `tool`. Admission and the state it reads happen under the
    /// tool's lock, so concurrent callers cannot both slip past a trip.
    pub fn admit(&self, tool: &str) -> Result<BreakerPermit, Duration> {
        let shard = self.shards.shard(tool);
        let (admission, transition) = {
            let mut state = lock(&shard);
            state.admit(&self.policy, now())
        };
        if let Some(transition) = transition {
            self.report(tool, transition);
        }
        match admission {
            Admission::Allowed | Admission::Trial => Ok(BreakerPermit {
                tool: tool.to_string(),
                shard,
                trial: admission == Admission::Trial,
                policy: self.policy,
                events: self.events.clone(),
                settled: false,
            }),
            Admission::Rejected { retry_after } => {
                debug!("Circuit for {} is open, rejecting call", tool);
                Err(retry_after)
            }
        }
    }

    pub fn status(&self, tool: &str) -> BreakerStatus {
        self.shards
            .get(tool)
            .map(|shard| lock(&shard).status())
            .unwrap_or(BreakerStatus::Closed)
    }

    pub fn consecutive_failures(&self, tool: &str) -> u32 {
        self.shards
            .get(tool)
            .map(|shard| lock(&shard).consecutive_failures())
            .unwrap_or(0)
    }

    /// `(tool, status, consecutive_failures)` for every tool seen so far
    pub fn snapshot(&self) -> Vec<(String, BreakerStatus, u32)> {
        self.shards
            .tools()
            .into_iter()
            .filter_map(|tool| {
                let shard = self.shards.get(&tool)?;
                let state = lock(&shard);
                Some((tool, state.status(), state.consecutive_failures()))
            })
            .collect()
    }

    fn report(&self, tool: &str, transition: BreakerTransition) {
        report_transition(self.events.as_ref(), tool, transition);
    }
}

fn report_transition(events: &dyn ExecutionEventSink, tool: &str, transition: BreakerTransition) {
    match transition.to {
        BreakerStatus::Open => warn!(
            "Circuit for {} opened ({} -> {})",
            tool, transition.from, transition.to
        ),
        BreakerStatus::Closed => info!("Circuit for {} closed", tool),
        BreakerStatus::HalfOpen => debug!("Circuit for {} half-open, allowing a trial call", tool),
    }
    events.emit(ExecutionEvent::new(
        event_types::CIRCUIT_TRANSITION,
        json!({
            "tool": tool,
            "from": transition.from.as_str(),
            "to": transition.to.as_str(),
        }),
    ));
}

/// Permission to make one attempt.
///
/// Settle it with [`success`](Self::success) or [`failure`](Self::failure).
/// Dropping an unsettled trial permit hands the half-open slot back.
pub struct BreakerPermit {
    tool: String,
    shard: Arc<Mutex<CircuitBreakerState>>,
    trial: bool,
    policy: BreakerPolicy,
    events: Arc<dyn ExecutionEventSink>,
    settled: bool,
}

impl BreakerPermit {
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn success(mut self) {
        self.settled = true;
        let transition = lock(&self.shard).record_success(self.trial);
        if let Some(transition) = transition {
            report_transition(self.events.as_ref(), &self.tool, transition);
        }
    }

    pub fn failure(mut self) {
        self.settled = true;
        let transition = lock(&self.shard).record_failure(&self.policy, self.trial, now());
        if let Some(transition) = transition {
            report_transition(self.events.as_ref(), &self.tool, transition);
        }
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            debug!("Trial call for {} abandoned, releasing half-open slot", self.tool);
            lock(&self.shard).release_trial();
        }
    }
}

/// Tokio's clock, so paused-time tests drive cooldowns
fn now() -> std::time::Instant {
    Instant::now().into_std()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::execution_events::NoExecutionEvents;

    fn registry(threshold: u32) -> CircuitBreakerRegistry {
        CircuitBreakerRegistry::new(
            BreakerPolicy {
                failure_threshold: threshold,
                cooldown: Duration::from_secs(30),
            },
            Arc::new(NoExecutionEvents),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_trips_after_threshold_and_recovers() {
        let breakers = registry(2);
        breakers.admit("t").unwrap().failure();
        assert_eq!(breakers.status("t"), BreakerStatus::Closed);
        breakers.admit("t").unwrap().failure();
        assert_eq!(breakers.status("t"), BreakerStatus::Open);

        let retry_after = breakers.admit("t").err().unwrap();
        assert_eq!(retry_after, Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(30)).await;
        let trial = breakers.admit("t").unwrap();
        assert!(trial.is_trial());
        assert!(breakers.admit("t").is_err());
        trial.success();
        assert_eq!(breakers.status("t"), BreakerStatus::Closed);
        assert_eq!(breakers.consecutive_failures("t"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_trial_releases_slot() {
        let breakers = registry(1);
        breakers.admit("t").unwrap().failure();
        tokio::time::advance(Duration::from_secs(31)).await;

        let trial = breakers.admit("t").unwrap();
        drop(trial);
        assert_eq!(breakers.status("t"), BreakerStatus::HalfOpen);
        assert!(breakers.admit("t").unwrap().is_trial());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tools_are_independent() {
        let breakers = registry(1);
        breakers.admit("a").unwrap().failure();
        assert_eq!(breakers.status("a"), BreakerStatus::Open);
        assert!(breakers.admit("b").is_ok());
        assert_eq!(
            breakers.snapshot(),
            vec![
                ("a".to_string(), BreakerStatus::Open, 1),
                ("b".to_string(), BreakerStatus::Closed, 0),
            ]
        );
    }
}
