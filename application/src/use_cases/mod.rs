//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod execute_script;
pub mod route_tool_call;
pub mod stub_cache;
pub mod toolset;
pub mod track_calls;
