//! Lua sandbox: a fresh, locked-down VM per execution.
//!
//! Scripts are untrusted. Only `table`, `string`, `math` and `utf8` are
//! loaded on top of a reduced base library, the allocator is capped, and an
//! instruction hook stops the VM once the execution guard fires.
//!
//! The VM keeps a single hooked thread: a hook that fires on any other
//! coroutine removes itself. Every coroutine that runs script code is
//! therefore armed with [`AbortHook::install`] right before it is resumed.

use std::future::Future;

use mlua::prelude::*;
use mlua::{HookTriggers, StdLib, VmState};
use toolscript_application::{ExecutionGuard, SandboxLimits};

/// Base-library globals removed from every VM
pub const REMOVED_GLOBALS: &[&str] = &[
    "load",
    "loadfile",
    "dofile",
    "collectgarbage",
    "getmetatable",
    "setmetatable",
    "rawget",
    "rawset",
    "rawequal",
    "rawlen",
];

/// Raised inside the VM when the execution guard has fired.
///
/// The guard carries the actual reason; this only unwinds the script.
#[derive(Debug, Clone, Copy)]
pub struct Aborted;

impl std::fmt::Display for Aborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "execution aborted")
    }
}

impl std::error::Error for Aborted {}

/// Instruction-count hook that raises [`Aborted`] once the guard fires.
///
/// Stored as app data on every sandboxed VM.
#[derive(Debug, Clone)]
pub struct AbortHook {
    guard: ExecutionGuard,
    interval: u32,
}

impl AbortHook {
    pub fn new(guard: ExecutionGuard, interval: u32) -> Self {
        Self {
            guard,
            interval: interval.max(1),
        }
    }

    fn triggers(&self) -> HookTriggers {
        HookTriggers::new().every_nth_instruction(self.interval)
    }

    fn callback(&self) -> impl Fn(&Lua, mlua::Debug) -> LuaResult<VmState> + Send + 'static {
        let guard = self.guard.clone();
        move |_lua, _debug| match guard.check() {
            Ok(()) => Ok(VmState::Continue),
            Err(_) => Err(LuaError::external(Aborted)),
        }
    }

    /// Make `thread` the hooked thread.
    pub fn install(&self, thread: &LuaThread) {
        thread.set_hook(self.triggers(), self.callback());
    }

    /// Drive `thread` to completion with the hook armed on every resume.
    ///
    /// `resume_on` is re-armed after each poll: it is the coroutine that
    /// keeps running once `thread` yields back.
    pub async fn drive(
        &self,
        thread: LuaThread,
        resume_on: Option<LuaThread>,
    ) -> LuaResult<LuaValue> {
        let mut running = Box::pin(thread.clone().into_async::<LuaValue>(()));
        std::future::poll_fn(|cx| {
            self.install(&thread);
            let poll = running.as_mut().poll(cx);
            if let Some(parent) = &resume_on {
                self.install(parent);
            }
            poll
        })
        .await
    }
}

/// `pcall`/`xpcall` replacements. An error caught while the execution is
/// aborted is raised again, so a script cannot swallow its own abort.
const PROTECTED_CALLS: &str = r#"
local aborted = ...
local raw_pcall, raw_xpcall = pcall, xpcall
local pack, unpack = table.pack, table.unpack

local function settle(results)
  if not results[1] and aborted() then
    error(results[2], 0)
  end
  return unpack(results, 1, results.n)
end

pcall = function(f, ...)
  return settle(pack(raw_pcall(f, ...)))
end

xpcall = function(f, handler, ...)
  return settle(pack(raw_xpcall(f, handler, ...)))
end
"#;

/// Create a VM with the restricted library set, memory cap, abort hook and
/// guarded `pcall`/`xpcall`.
pub fn new_sandboxed_vm(limits: &SandboxLimits, guard: &ExecutionGuard) -> LuaResult<Lua> {
    let lua = Lua::new_with(
        StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8,
        LuaOptions::default(),
    )?;

    let globals = lua.globals();
    for name in REMOVED_GLOBALS {
        globals.set(*name, LuaValue::Nil)?;
    }
    let string: LuaTable = globals.get("string")?;
    string.set("dump", LuaValue::Nil)?;

    lua.set_memory_limit(limits.max_memory_bytes)?;

    let hook = AbortHook::new(guard.clone(), limits.instruction_check_interval);
    lua.set_hook(hook.triggers(), hook.callback());
    lua.set_app_data(hook);

    let aborted_guard = guard.clone();
    let aborted = lua.create_function(move |_, ()| Ok(aborted_guard.is_aborted()))?;
    lua.load(PROTECTED_CALLS)
        .set_name("=sandbox")
        .call::<()>(aborted)?;

    Ok(lua)
}
