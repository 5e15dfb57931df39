//! Logging infrastructure: structured execution event logs.
//!
//! Provides [`JsonlEventLogger`], a JSONL file writer that implements
//! the [`ExecutionEventSink`](toolscript_application::ExecutionEventSink) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlEventLogger;
