//! Utility globals: `print`, `json`, `sleep`.

use mlua::prelude::*;
use std::time::Duration;
use toolscript_application::{ExecutionGuard, OutputSink};

use super::convert::{display, to_json, to_lua};
use super::sandbox::Aborted;

/// Register `print`, writing tab-joined arguments to the output sink.
pub fn register_print(lua: &Lua, output: OutputSink) -> LuaResult<()> {
    let print = lua.create_function(move |lua, args: LuaMultiValue| {
        let line = args
            .into_iter()
            .map(|value| display(lua, value))
            .collect::<Vec<_>>()
            .join("\t");
        output.write_line(&line);
        Ok(())
    })?;
    lua.globals().set("print", print)
}

/// Register the `json` table: `encode`, `decode` and the `null` sentinel.
pub fn register_json_api(lua: &Lua) -> LuaResult<()> {
    let json = lua.create_table()?;

    json.set(
        "encode",
        lua.create_function(|lua, value: LuaValue| {
            let value = to_json(lua, value)?;
            serde_json::to_string(&value)
                .map_err(|e| LuaError::external(format!("json.encode: {}", e)))
        })?,
    )?;

    json.set(
        "decode",
        lua.create_function(|lua, text: LuaString| {
            let value: serde_json::Value = serde_json::from_slice(&text.as_bytes())
                .map_err(|e| LuaError::external(format!("json.decode: {}", e)))?;
            to_lua(lua, &value)
        })?,
    )?;

    json.set("null", lua.null())?;
    lua.globals().set("json", json)
}

/// Register `sleep(seconds)`. Sleeps are capped at `max_sleep` and end
/// early, with an error, when the execution is aborted.
pub fn register_sleep(lua: &Lua, guard: ExecutionGuard, max_sleep: Duration) -> LuaResult<()> {
    let sleep = lua.create_async_function(move |_, seconds: f64| {
        let guard = guard.clone();
        async move {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(LuaError::external(format!(
                    "sleep: expected a non-negative number of seconds, got {}",
                    seconds
                )));
            }
            let duration = Duration::try_from_secs_f64(seconds)
                .unwrap_or(Duration::MAX)
                .min(max_sleep);
            tokio::select! {
                _ = tokio::time::sleep(duration) => Ok(()),
                _ = guard.token().cancelled() => Err(LuaError::external(Aborted)),
            }
        }
    })?;
    lua.globals().set("sleep", sleep)
}
