//! Port definitions (interfaces for external adapters)
//!
//! Ports define the boundaries between the application and the outside world.
//! Infrastructure adapters implement these ports.

pub mod execution_events;
pub mod script_runtime;
pub mod tool_bridge;
pub mod tool_worker;
