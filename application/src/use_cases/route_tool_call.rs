//! Tool-call router: the resilience core.
//!
//! `local-function` tools are invoked directly under the per-call timeout.
//! `remote-worker` and `delegated-agent` tools go through the idempotency
//! cache, the circuit breaker and the retry loop:
//!
//! ```text
//! key? ──hit──> cached result
//!   │miss
//!   v
//! admit ──open──> CircuitOpen
//!   │
//!   v
//! attempt ──ok──> store + return
//!   │retryable failure / timeout
//!   v
//! backoff ──> admit (next attempt) ... ──> ToolExecutionError
//! ```

use crate::config::RouterConfig;
use crate::ports::execution_events::{ExecutionEvent, ExecutionEventSink, event_types};
use crate::ports::tool_bridge::ToolCallError;
use crate::ports::tool_worker::{ToolWorker, WorkerError};
use crate::resilience::{CircuitBreakerRegistry, IdempotencyCache};
use crate::use_cases::toolset::Toolset;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use toolscript_domain::{
    ArgumentValidator, DefaultArgumentValidator, IdempotencyKey, ToolDefinition, ToolKind,
};

/// How one attempt ended
enum AttemptOutcome {
    Success(Value),
    Failed { cause: String, retryable: bool },
}

pub struct ToolRouter {
    config: RouterConfig,
    breakers: CircuitBreakerRegistry,
    cache: IdempotencyCache,
    validator: DefaultArgumentValidator,
    events: Arc<dyn ExecutionEventSink>,
}

impl ToolRouter {
    pub fn new(config: RouterConfig, events: Arc<dyn ExecutionEventSink>) -> Self {
        Self {
            breakers: CircuitBreakerRegistry::new(config.breaker, events.clone()),
            cache: IdempotencyCache::new(config.idempotency),
            validator: DefaultArgumentValidator,
            config,
            events,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub fn cache(&self) -> &IdempotencyCache {
        &self.cache
    }

    /// Route one call.
    ///
    /// Every await point selects on `cancel`; a cancelled call returns
    /// [`ToolCallError::Cancelled`] and never populates the cache.
    pub async fn call(
        &self,
        toolset: &Toolset,
        domain: &str,
        tool: &str,
        params: Value,
        idempotency_key: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Value, ToolCallError> {
        let definition =
            toolset
                .catalog
                .get(domain, tool)
                .ok_or_else(|| ToolCallError::UnknownTool {
                    domain: domain.to_string(),
                    tool: tool.to_string(),
                })?;
        let qualified = definition.qualified_name();

        let Some(arguments) = params.as_object() else {
            return Err(ToolCallError::InvalidArguments {
                tool: qualified,
                reason: "parameters must be a table of named values".to_string(),
            });
        };
        self.validator
            .validate(definition, arguments)
            .map_err(|reason| ToolCallError::InvalidArguments {
                tool: qualified.clone(),
                reason,
            })?;

        let worker = toolset
            .workers
            .get(&qualified)
            .ok_or_else(|| ToolCallError::NoWorker {
                tool: qualified.clone(),
            })?;

        match definition.kind {
            ToolKind::LocalFunction => {
                self.call_local(definition, &qualified, worker.as_ref(), &params, cancel)
                    .await
            }
            ToolKind::RemoteWorker | ToolKind::DelegatedAgent => {
                self.call_resilient(
                    definition,
                    &qualified,
                    worker.as_ref(),
                    &params,
                    idempotency_key,
                    cancel,
                )
                .await
            }
        }
    }

    async fn call_local(
        &self,
        definition: &ToolDefinition,
        qualified: &str,
        worker: &dyn ToolWorker,
        params: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ToolCallError> {
        match self.attempt(definition, worker, params, cancel).await? {
            AttemptOutcome::Success(value) => Ok(value),
            AttemptOutcome::Failed { cause, .. } => Err(ToolCallError::Execution {
                tool: qualified.to_string(),
                attempts: 1,
                cause,
            }),
        }
    }

    async fn call_resilient(
        &self,
        definition: &ToolDefinition,
        qualified: &str,
        worker: &dyn ToolWorker,
        params: &Value,
        explicit_key: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Value, ToolCallError> {
        let key = self.resolve_key(qualified, params, explicit_key)?;

        let _claim = match &key {
            Some(key) => {
                if let Some(hit) = self.cached(qualified, key) {
                    return Ok(hit);
                }
                let claim = tokio::select! {
                    _ = cancel.cancelled() => return Err(ToolCallError::Cancelled),
                    claim = self.cache.claim(qualified, key) => claim,
                };
                // A concurrent call with the same key may have finished first
                if let Some(hit) = self.cached(qualified, key) {
                    return Ok(hit);
                }
                Some(claim)
            }
            None => None,
        };

        let retry = self.config.retry;
        let max_attempts = retry.max_attempts.max(1);
        let mut last_cause = String::new();

        for attempt in 1..=max_attempts {
            let permit = self.breakers.admit(qualified).map_err(|retry_after| {
                ToolCallError::CircuitOpen {
                    tool: qualified.to_string(),
                    retry_after,
                }
            })?;

            // An early return here drops the permit, releasing a trial slot
            match self.attempt(definition, worker, params, cancel).await? {
                AttemptOutcome::Success(value) => {
                    permit.success();
                    if let Some(key) = key {
                        self.cache.put(qualified, key, value.clone());
                    }
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", qualified, attempt);
                    }
                    return Ok(value);
                }
                AttemptOutcome::Failed {
                    cause,
                    retryable: false,
                } => {
                    // The worker answered; the breaker treats it as healthy
                    permit.success();
                    return Err(ToolCallError::Execution {
                        tool: qualified.to_string(),
                        attempts: attempt,
                        cause,
                    });
                }
                AttemptOutcome::Failed {
                    cause,
                    retryable: true,
                } => {
                    permit.failure();
                    last_cause = cause;
                }
            }

            if attempt < max_attempts {
                let delay = retry.delay_for(attempt, rand::random::<f64>());
                debug!(
                    "{} attempt {}/{} failed ({}), retrying in {:?}",
                    qualified, attempt, max_attempts, last_cause, delay
                );
                self.events.emit(ExecutionEvent::new(
                    event_types::RETRY_SCHEDULED,
                    json!({
                        "tool": qualified,
                        "attempt": attempt,
                        "delay_ms": delay.as_millis() as u64,
                        "cause": last_cause,
                    }),
                ));
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ToolCallError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        warn!(
            "{} failed after {} attempts: {}",
            qualified, max_attempts, last_cause
        );
        Err(ToolCallError::Execution {
            tool: qualified.to_string(),
            attempts: max_attempts,
            cause: last_cause,
        })
    }

    /// One worker invocation under the per-call timeout
    async fn attempt(
        &self,
        definition: &ToolDefinition,
        worker: &dyn ToolWorker,
        params: &Value,
        cancel: &CancellationToken,
    ) -> Result<AttemptOutcome, ToolCallError> {
        let timeout = self.config.per_call_timeout;
        let invoked = tokio::select! {
            _ = cancel.cancelled() => return Err(ToolCallError::Cancelled),
            invoked = tokio::time::timeout(timeout, worker.invoke(definition, params)) => invoked,
        };
        Ok(match invoked {
            Ok(Ok(value)) => AttemptOutcome::Success(value),
            Ok(Err(WorkerError { message, retryable })) => AttemptOutcome::Failed {
                cause: message,
                retryable,
            },
            Err(_) => AttemptOutcome::Failed {
                cause: format!("timed out after {}ms", timeout.as_millis()),
                retryable: true,
            },
        })
    }

    fn resolve_key(
        &self,
        qualified: &str,
        params: &Value,
        explicit: Option<&str>,
    ) -> Result<Option<IdempotencyKey>, ToolCallError> {
        match explicit {
            Some(key) => IdempotencyKey::explicit(key).map(Some).map_err(|e| {
                ToolCallError::InvalidArguments {
                    tool: qualified.to_string(),
                    reason: e.to_string(),
                }
            }),
            None if self.config.idempotency.derive_keys => {
                Ok(Some(IdempotencyKey::derive(qualified, params)))
            }
            None => Ok(None),
        }
    }

    fn cached(&self, qualified: &str, key: &IdempotencyKey) -> Option<Value> {
        let hit = self.cache.get(qualified, key)?;
        debug!("Idempotency cache hit for {}", qualified);
        self.events.emit(ExecutionEvent::new(
            event_types::CACHE_HIT,
            json!({
                "tool": qualified,
                "derived_key": key.is_derived(),
            }),
        ));
        Some(hit)
    }
}
