//! Per-execution context shared by the executor, the tracker and the runtime.
//!
//! - [`ExecutionGuard`]: deadline, cancellation token and abort reason
//! - [`OutputSink`]: captured `print` output

pub mod guard;
pub mod output;

pub use guard::{AbortReason, ExecutionGuard};
pub use output::{OutputSink, TRUNCATION_MARKER};
