//! Port for structured execution events.
//!
//! Defines the [`ExecutionEventSink`] trait for recording what an execution
//! did (state transitions, tool calls, cache hits, retries, breaker
//! transitions) as machine-readable events.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostics, while this port feeds audit logs and live
//! progress displays.

use serde_json::Value;
use std::sync::Arc;

/// Event type identifiers
pub mod event_types {
    pub const EXECUTION_STARTED: &str = "execution_started";
    pub const EXECUTION_STATE: &str = "execution_state";
    pub const VALIDATION_REJECTED: &str = "validation_rejected";
    pub const TOOL_CALL_STARTED: &str = "tool_call_started";
    pub const TOOL_CALL_FINISHED: &str = "tool_call_finished";
    pub const CACHE_HIT: &str = "cache_hit";
    pub const RETRY_SCHEDULED: &str = "retry_scheduled";
    pub const CIRCUIT_TRANSITION: &str = "circuit_transition";
    pub const EXECUTION_FINISHED: &str = "execution_finished";
}

/// A structured execution event.
#[derive(Debug, Clone)]
pub struct ExecutionEvent {
    /// Event type identifier (see [`event_types`]).
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl ExecutionEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for receiving execution events.
///
/// `emit` is synchronous and infallible so sinks never disturb the
/// execution; failures inside a sink are its own business.
pub trait ExecutionEventSink: Send + Sync {
    fn emit(&self, event: ExecutionEvent);
}

/// No-op implementation for tests and when events are disabled.
pub struct NoExecutionEvents;

impl ExecutionEventSink for NoExecutionEvents {
    fn emit(&self, _event: ExecutionEvent) {}
}

/// Forwards every event to several sinks, in order.
#[derive(Default)]
pub struct CompositeEvents {
    sinks: Vec<Arc<dyn ExecutionEventSink>>,
}

impl CompositeEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn ExecutionEventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ExecutionEventSink for CompositeEvents {
    fn emit(&self, event: ExecutionEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<&'static str>>);

    impl ExecutionEventSink for Recording {
        fn emit(&self, event: ExecutionEvent) {
            self.0.lock().unwrap().push(event.event_type);
        }
    }

    #[test]
    fn test_composite_forwards_to_all_sinks() {
        let a = Arc::new(Recording::default());
        let b = Arc::new(Recording::default());
        let composite = CompositeEvents::new()
            .with_sink(a.clone())
            .with_sink(b.clone())
            .with_sink(Arc::new(NoExecutionEvents));
        assert_eq!(composite.len(), 3);

        composite.emit(ExecutionEvent::new(
            event_types::CACHE_HIT,
            json!({"tool": "weather.get_weather"}),
        ));

        assert_eq!(*a.0.lock().unwrap(), vec!["cache_hit"]);
        assert_eq!(*b.0.lock().unwrap(), vec!["cache_hit"]);
    }
}
