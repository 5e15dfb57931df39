//! Lua scripting runtime
//!
//! Provides the `LuaRuntime` that implements `ScriptRuntime` from the
//! application layer, backed by mlua (Lua 5.4).
//!
//! # Modules
//!
//! - `sandbox`: restricted VM: library set, memory cap, abort hook
//! - `convert`: Lua value / JSON conversion
//! - `stdlib_api`: `print`, `json`, `sleep`
//! - `fanout_api`: `parallel(tasks, width)`
//! - `scratch_api`: `scratch.*` confined file access
//! - `tools_api`: `require("tools.<domain>")` and the host `route` function
//! - `lua_runtime`: runtime struct tying everything together

mod convert;
mod fanout_api;
mod lua_runtime;
mod sandbox;
mod scratch_api;
mod stdlib_api;
mod tools_api;

pub use lua_runtime::LuaRuntime;
pub use sandbox::REMOVED_GLOBALS;
pub use scratch_api::ScratchDir;
