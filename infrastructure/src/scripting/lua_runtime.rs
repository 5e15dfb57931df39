//! Lua 5.4 script runtime.
//!
//! `LuaRuntime` implements [`ScriptRuntime`]: every run gets a fresh
//! sandboxed VM with the stub modules it imports, the utility globals and
//! the captured-output sink. Nothing survives between runs.

use async_trait::async_trait;
use mlua::prelude::*;
use serde_json::Value;
use toolscript_application::{ScriptFailure, ScriptRun, ScriptRuntime, ToolCallError};
use tracing::debug;

use super::convert::to_json;
use super::fanout_api::register_fanout_api;
use super::sandbox::{AbortHook, Aborted, new_sandboxed_vm};
use super::scratch_api::{ScratchDir, register_scratch_api};
use super::stdlib_api::{register_json_api, register_print, register_sleep};
use super::tools_api::register_tools_api;

/// Chunk name used in script error messages (`script:3: ...`)
const SCRIPT_CHUNK: &str = "=script";

/// Sandboxed Lua runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct LuaRuntime;

impl LuaRuntime {
    pub fn new() -> Self {
        Self
    }

    /// Build the VM for one run.
    fn prepare(run: &ScriptRun) -> LuaResult<Lua> {
        let lua = new_sandboxed_vm(&run.limits, &run.guard)?;

        register_print(&lua, run.output.clone())?;
        register_json_api(&lua)?;
        register_sleep(&lua, run.guard.clone(), run.limits.max_sleep)?;
        register_fanout_api(&lua, run.limits.max_fanout)?;
        register_tools_api(&lua, run.modules.clone(), run.bridge.clone())?;
        if let Some(dir) = &run.limits.scratch_dir {
            let scratch = ScratchDir::new(dir, run.limits.max_scratch_bytes);
            register_scratch_api(&lua, scratch)?;
        }

        Ok(lua)
    }
}

#[async_trait]
impl ScriptRuntime for LuaRuntime {
    async fn run(&self, run: ScriptRun) -> Result<Value, ScriptFailure> {
        let lua = Self::prepare(&run)
            .map_err(|e| ScriptFailure::Internal(format!("sandbox setup failed: {}", e)))?;
        debug!(
            "Execution {}: VM ready with {} module(s)",
            run.execution_id,
            run.modules.len()
        );

        let chunk = lua
            .load(run.script.as_str())
            .set_name(SCRIPT_CHUNK)
            .into_function()
            .map_err(into_failure)?;
        let thread = lua.create_thread(chunk).map_err(into_failure)?;
        let hook = AbortHook::new(run.guard.clone(), run.limits.instruction_check_interval);
        let value = hook.drive(thread, None).await.map_err(into_failure)?;

        to_json(&lua, value).map_err(|e| {
            ScriptFailure::Script(format!("return value cannot be converted to JSON: {}", e))
        })
    }
}

/// Classify an error that escaped the script.
pub fn into_failure(err: LuaError) -> ScriptFailure {
    classify(&err)
}

fn classify(err: &LuaError) -> ScriptFailure {
    match err {
        LuaError::CallbackError { cause, .. } | LuaError::WithContext { cause, .. } => {
            classify(cause)
        }
        LuaError::ExternalError(inner) => {
            if let Some(tool_error) = inner.downcast_ref::<ToolCallError>() {
                ScriptFailure::Tool(tool_error.clone())
            } else if inner.downcast_ref::<Aborted>().is_some() {
                ScriptFailure::Aborted
            } else {
                ScriptFailure::Script(inner.to_string())
            }
        }
        LuaError::MemoryError(message) => ScriptFailure::MemoryLimit(message.clone()),
        LuaError::SyntaxError { message, .. } => ScriptFailure::Script(message.clone()),
        LuaError::RuntimeError(message) => ScriptFailure::Script(message.clone()),
        other => ScriptFailure::Internal(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;
    use toolscript_application::{
        AbortReason, ExecutionGuard, OutputSink, SandboxLimits, ToolBridge,
    };

    struct EchoBridge;

    #[async_trait]
    impl ToolBridge for EchoBridge {
        async fn call(
            &self,
            _domain: &str,
            tool: &str,
            params: Value,
            _idempotency_key: Option<String>,
        ) -> Result<Value, ToolCallError> {
            match tool {
                "open" => Err(ToolCallError::CircuitOpen {
                    tool: "svc.open".to_string(),
                    retry_after: Duration::from_secs(5),
                }),
                _ => Ok(params),
            }
        }
    }

    fn run_for(script: &str, limits: SandboxLimits) -> (ScriptRun, ExecutionGuard, OutputSink) {
        run_with_modules(script, limits, Vec::new())
    }

    fn run_with_modules(
        script: &str,
        limits: SandboxLimits,
        modules: Vec<toolscript_domain::StubModule>,
    ) -> (ScriptRun, ExecutionGuard, OutputSink) {
        let guard = ExecutionGuard::new(Instant::now() + limits.wall_clock_timeout, None);
        let output = OutputSink::new(limits.max_output_bytes);
        let run = ScriptRun {
            execution_id: "test".to_string(),
            script: script.to_string(),
            modules,
            bridge: Arc::new(EchoBridge),
            guard: guard.clone(),
            output: output.clone(),
            limits,
        };
        (run, guard, output)
    }

    #[tokio::test]
    async fn test_return_value_and_output() {
        let (run, _, output) = run_for(
            r#"
            print("hello", 42)
            return { ok = true, items = {1, 2} }
        "#,
            SandboxLimits::default(),
        );

        let value = LuaRuntime::new().run(run).await.unwrap();
        assert_eq!(value, json!({"ok": true, "items": [1, 2]}));
        assert_eq!(output.contents(), "hello\t42\n");
    }

    #[tokio::test]
    async fn test_no_return_is_null() {
        let (run, _, _) = run_for("local x = 1", SandboxLimits::default());
        assert_eq!(LuaRuntime::new().run(run).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_syntax_and_runtime_errors_are_script_errors() {
        let (run, _, _) = run_for("local = 1", SandboxLimits::default());
        assert!(matches!(
            LuaRuntime::new().run(run).await,
            Err(ScriptFailure::Script(_))
        ));

        let (run, _, _) = run_for("error('boom')", SandboxLimits::default());
        match LuaRuntime::new().run(run).await {
            Err(ScriptFailure::Script(message)) => assert!(message.contains("boom")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_memory_cap() {
        let limits = SandboxLimits::default().with_max_memory_bytes(4 * 1024 * 1024);
        let (run, _, _) = run_for(
            "local t = {} for i = 1, 100000000 do t[i] = string.rep('x', 100) .. i end",
            limits,
        );
        assert!(matches!(
            LuaRuntime::new().run(run).await,
            Err(ScriptFailure::MemoryLimit(_))
        ));
    }

    #[tokio::test]
    async fn test_deadline_stops_busy_loop() {
        let limits =
            SandboxLimits::default().with_wall_clock_timeout(Duration::from_millis(50));
        let (run, guard, _) = run_for("while true do end", limits);

        let result = LuaRuntime::new().run(run).await;
        assert!(matches!(result, Err(ScriptFailure::Aborted)));
        assert_eq!(guard.reason(), Some(AbortReason::Timeout));
    }

    #[tokio::test]
    async fn test_deadline_reaches_every_coroutine() {
        let scripts = [
            // caught by pcall
            "pcall(function() while true do end end) return 'escaped'",
            // inside a fan-out task
            "parallel({ function() return 1 end, function() while true do end end })",
            // back on the main coroutine after a fan-out
            "parallel({ function() return 1 end }) while true do end",
            // nested fan-out
            "parallel({ function() return parallel({ function() while true do end end }) end })",
        ];
        for script in scripts {
            let limits =
                SandboxLimits::default().with_wall_clock_timeout(Duration::from_millis(50));
            let (run, guard, _) = run_for(script, limits);

            let result = LuaRuntime::new().run(run).await;
            assert!(matches!(result, Err(ScriptFailure::Aborted)), "{}", script);
            assert_eq!(guard.reason(), Some(AbortReason::Timeout), "{}", script);
        }
    }

    #[tokio::test]
    async fn test_scratch_only_when_configured() {
        let (run, _, _) = run_for("return scratch == nil", SandboxLimits::default());
        assert_eq!(LuaRuntime::new().run(run).await.unwrap(), json!(true));

        let dir = tempfile::tempdir().unwrap();
        let limits = SandboxLimits::default().with_scratch_dir(dir.path());
        let (run, _, _) = run_for(
            r#"scratch.write("a.txt", "x") return scratch.read("a.txt")"#,
            limits,
        );
        assert_eq!(LuaRuntime::new().run(run).await.unwrap(), json!("x"));

        let limits = SandboxLimits::default()
            .with_scratch_dir(dir.path())
            .with_max_scratch_bytes(8);
        let (run, _, _) = run_for(
            r#"scratch.write("b.txt", "12345") scratch.write("c.txt", "12345")"#,
            limits,
        );
        match LuaRuntime::new().run(run).await {
            Err(ScriptFailure::Script(message)) => assert!(message.contains("limit of 8")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(dir.path().join("b.txt").exists());
        assert!(!dir.path().join("c.txt").exists());
    }

    #[tokio::test]
    async fn test_uncaught_tool_error_keeps_its_type() {
        let catalog = toolscript_domain::ToolCatalog::new("test", "1")
            .with_tool(toolscript_domain::ToolDefinition::new(
                "svc",
                "open",
                toolscript_domain::ToolKind::RemoteWorker,
                "",
            ))
            .unwrap();
        let modules = toolscript_domain::StubGenerator::generate(&catalog)
            .modules()
            .cloned()
            .collect();
        let (run, _, _) = run_with_modules(
            r#"local svc = require("tools.svc") svc.open()"#,
            SandboxLimits::default(),
            modules,
        );

        match LuaRuntime::new().run(run).await {
            Err(ScriptFailure::Tool(ToolCallError::CircuitOpen { tool, .. })) => {
                assert_eq!(tool, "svc.open")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_into_failure_unwraps_tool_errors() {
        let tool_error = ToolCallError::CircuitOpen {
            tool: "svc.open".to_string(),
            retry_after: Duration::from_secs(5),
        };
        let wrapped = LuaError::CallbackError {
            traceback: String::new(),
            cause: Arc::new(LuaError::external(tool_error.clone())),
        };
        match into_failure(wrapped) {
            ScriptFailure::Tool(e) => assert_eq!(e, tool_error),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            into_failure(LuaError::external(Aborted)),
            ScriptFailure::Aborted
        ));
    }
}
