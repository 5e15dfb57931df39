//! `require("tools.<domain>")`: loads generated stub modules.
//!
//! Each stub chunk receives the host `route` function as its argument;
//! `route` forwards the call to the [`ToolBridge`] and converts the result.
//! Modules are loaded lazily and cached for the rest of the execution.

use mlua::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use toolscript_application::ToolBridge;
use toolscript_domain::StubModule;

use super::convert::{to_json, to_lua};

const ROUTE_KEY: &str = "toolscript.route";
const LOADED_KEY: &str = "toolscript.loaded";

/// Register `require`, resolving only the given stub modules.
pub fn register_tools_api(
    lua: &Lua,
    modules: Vec<StubModule>,
    bridge: Arc<dyn ToolBridge>,
) -> LuaResult<()> {
    let route = lua.create_async_function(
        move |lua, (domain, tool, params, key): (String, String, LuaValue, Option<String>)| {
            let bridge = bridge.clone();
            async move {
                let params = to_json(&lua, params)?;
                let result = bridge
                    .call(&domain, &tool, params, key)
                    .await
                    .map_err(LuaError::external)?;
                to_lua(&lua, &result)
            }
        },
    )?;
    lua.set_named_registry_value(ROUTE_KEY, route)?;
    lua.set_named_registry_value(LOADED_KEY, lua.create_table()?)?;

    let sources: HashMap<String, String> = modules
        .into_iter()
        .map(|module| (module.module_name, module.source))
        .collect();

    let require = lua.create_function(move |lua, name: String| {
        let loaded: LuaTable = lua.named_registry_value(LOADED_KEY)?;
        if let Some(module) = loaded.get::<Option<LuaTable>>(name.as_str())? {
            return Ok(module);
        }

        let source = sources
            .get(&name)
            .ok_or_else(|| LuaError::external(format!("module '{}' not found", name)))?;
        let route: LuaFunction = lua.named_registry_value(ROUTE_KEY)?;
        let module: LuaTable = lua
            .load(source.as_str())
            .set_name(format!("={}", name))
            .call(route)?;

        loaded.set(name.as_str(), &module)?;
        Ok(module)
    })?;
    lua.globals().set("require", require)
}
