//! Execution tracker: counts, records and routes every call a script makes.
//!
//! Implements [`ToolBridge`], so the runtime never reaches the router
//! directly. The tracker is purely observational: results and errors pass
//! through unchanged.

use crate::ports::execution_events::{ExecutionEvent, ExecutionEventSink, event_types};
use crate::ports::tool_bridge::{ToolBridge, ToolCallError};
use crate::sandbox::{AbortReason, ExecutionGuard};
use crate::use_cases::route_tool_call::ToolRouter;
use crate::use_cases::toolset::Toolset;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tracing::{debug, warn};
use toolscript_domain::{CallOutcome, RedactionPolicy, ToolCallRecord};

pub struct ExecutionTracker {
    execution_id: String,
    router: Arc<ToolRouter>,
    toolset: Arc<Toolset>,
    guard: ExecutionGuard,
    redaction: RedactionPolicy,
    max_tool_calls: usize,
    issued: AtomicU64,
    log: Arc<Mutex<Vec<ToolCallRecord>>>,
    events: Arc<dyn ExecutionEventSink>,
}

impl ExecutionTracker {
    pub fn new(
        execution_id: impl Into<String>,
        router: Arc<ToolRouter>,
        toolset: Arc<Toolset>,
        guard: ExecutionGuard,
        redaction: RedactionPolicy,
        max_tool_calls: usize,
        events: Arc<dyn ExecutionEventSink>,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            router,
            toolset,
            guard,
            redaction,
            max_tool_calls,
            issued: AtomicU64::new(0),
            log: Arc::new(Mutex::new(Vec::new())),
            events,
        }
    }

    /// Calls issued so far, including ones still in flight
    pub fn issued(&self) -> u64 {
        self.issued
            .load(Ordering::SeqCst)
            .min(self.max_tool_calls as u64)
    }

    /// Finished records, ordered by `call_index`
    pub fn snapshot(&self) -> Vec<ToolCallRecord> {
        let mut records = self.log.lock().unwrap_or_else(|e| e.into_inner()).clone();
        records.sort_by_key(|r| r.call_index);
        records
    }
}

#[async_trait]
impl ToolBridge for ExecutionTracker {
    async fn call(
        &self,
        domain: &str,
        tool: &str,
        params: Value,
        idempotency_key: Option<String>,
    ) -> Result<Value, ToolCallError> {
        if self.guard.check().is_err() {
            return Err(ToolCallError::Cancelled);
        }

        let Some(kind) = self.toolset.catalog.get(domain, tool).map(|t| t.kind) else {
            return Err(ToolCallError::UnknownTool {
                domain: domain.to_string(),
                tool: tool.to_string(),
            });
        };

        let call_index = self.issued.fetch_add(1, Ordering::SeqCst);
        if call_index >= self.max_tool_calls as u64 {
            let limit = self.max_tool_calls;
            if self.guard.abort(AbortReason::ResourceLimit { limit }) {
                warn!(
                    "Execution {} exceeded the limit of {} tool calls",
                    self.execution_id, limit
                );
            }
            return Err(ToolCallError::ResourceLimitExceeded { limit });
        }

        let record = ToolCallRecord::issued(
            domain,
            tool,
            kind,
            self.redaction.redact(&params),
            call_index,
            unix_seconds(),
        );
        debug!("Call #{} {}.{} issued", call_index, domain, tool);
        self.events.emit(ExecutionEvent::new(
            event_types::TOOL_CALL_STARTED,
            json!({
                "execution_id": self.execution_id,
                "call_index": call_index,
                "tool": tool,
                "domain": domain,
                "kind": kind.as_str(),
            }),
        ));

        let mut pending = PendingCall {
            record: Some(record),
            started: Instant::now(),
            log: self.log.clone(),
            events: self.events.clone(),
            execution_id: self.execution_id.clone(),
        };

        let result = self
            .router
            .call(
                &self.toolset,
                domain,
                tool,
                params,
                idempotency_key.as_deref(),
                self.guard.token(),
            )
            .await;

        let outcome = match &result {
            Ok(value) => CallOutcome::Success {
                result_size: serde_json::to_string(value).map(|s| s.len()).unwrap_or(0),
            },
            Err(e) => CallOutcome::Failure {
                error: e.to_string(),
            },
        };
        pending.finish(outcome);
        result
    }
}

/// Finalizes its record exactly once; a dropped call is recorded as cancelled
struct PendingCall {
    record: Option<ToolCallRecord>,
    started: Instant,
    log: Arc<Mutex<Vec<ToolCallRecord>>>,
    events: Arc<dyn ExecutionEventSink>,
    execution_id: String,
}

impl PendingCall {
    fn finish(&mut self, outcome: CallOutcome) {
        let Some(record) = self.record.take() else {
            return;
        };
        let record = record.finish(
            unix_seconds(),
            self.started.elapsed().as_secs_f64(),
            outcome,
        );
        self.events.emit(ExecutionEvent::new(
            event_types::TOOL_CALL_FINISHED,
            json!({
                "execution_id": self.execution_id,
                "call_index": record.call_index,
                "tool": record.tool,
                "duration": record.duration,
                "error": record.error,
                "result_size": record.result_size,
            }),
        ));
        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.finish(CallOutcome::Failure {
            error: "cancelled".to_string(),
        });
    }
}

fn unix_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
