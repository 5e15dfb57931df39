//! Execute Script use case
//!
//! Orchestrates one script run end to end: validation, stub preparation,
//! the deadline-bounded run, and assembly of the [`ExecutionResult`].
//! Every path, including rejection and timeout, returns a complete result.

use crate::config::{EngineConfig, SandboxLimits};
use crate::ports::execution_events::{
    ExecutionEvent, ExecutionEventSink, NoExecutionEvents, event_types,
};
use crate::ports::script_runtime::{ScriptFailure, ScriptRun, ScriptRuntime};
use crate::sandbox::{AbortReason, ExecutionGuard, OutputSink};
use crate::use_cases::route_tool_call::ToolRouter;
use crate::use_cases::stub_cache::StubCache;
use crate::use_cases::toolset::Toolset;
use crate::use_cases::track_calls::ExecutionTracker;
use serde_json::{Value, json};
use std::sync::{Arc, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use toolscript_domain::{
    ErrorKind, ExecutionError, ExecutionResult, ExecutionState, ScriptValidator, StubModule,
};
use uuid::Uuid;

/// Use case for running planner-authored scripts
pub struct ScriptExecutor<R: ScriptRuntime + 'static> {
    runtime: Arc<R>,
    router: Arc<ToolRouter>,
    toolset: RwLock<Arc<Toolset>>,
    stubs: StubCache,
    config: EngineConfig,
    events: Arc<dyn ExecutionEventSink>,
    cancellation: Option<CancellationToken>,
}

impl<R: ScriptRuntime + 'static> ScriptExecutor<R> {
    pub fn new(runtime: Arc<R>, toolset: Toolset, config: EngineConfig) -> Self {
        Self::with_events(runtime, toolset, config, Arc::new(NoExecutionEvents))
    }

    /// Executor whose router and executions report to `events`
    pub fn with_events(
        runtime: Arc<R>,
        toolset: Toolset,
        config: EngineConfig,
        events: Arc<dyn ExecutionEventSink>,
    ) -> Self {
        let router = Arc::new(ToolRouter::new(config.router, events.clone()));
        Self {
            runtime,
            router,
            toolset: RwLock::new(Arc::new(toolset)),
            stubs: StubCache::default(),
            config,
            events,
            cancellation: None,
        }
    }

    /// Share an existing router (and its breaker/cache state)
    pub fn with_router(mut self, router: Arc<ToolRouter>) -> Self {
        self.router = router;
        self
    }

    /// Cancelling `token` cancels any execution in progress
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn router(&self) -> &Arc<ToolRouter> {
        &self.router
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn toolset(&self) -> Arc<Toolset> {
        self.toolset
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Swap catalog and workers. Running executions keep the toolset they
    /// started with.
    pub fn replace_toolset(&self, toolset: Toolset) {
        info!(
            "Replacing toolset: catalog {} {} ({} tools)",
            toolset.catalog.name(),
            toolset.catalog.version(),
            toolset.catalog.len()
        );
        *self.toolset.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(toolset);
    }

    /// Execute with the configured default limits
    pub async fn execute(&self, script: &str) -> ExecutionResult {
        let limits = self.config.sandbox.clone();
        self.execute_with_limits(script, &limits).await
    }

    pub async fn execute_with_limits(&self, script: &str, limits: &SandboxLimits) -> ExecutionResult {
        let execution_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let mut state = ExecutionState::Pending;

        info!("Execution {} started ({} bytes)", execution_id, script.len());
        self.emit(
            event_types::EXECUTION_STARTED,
            json!({
                "execution_id": execution_id,
                "script_bytes": script.len(),
            }),
        );

        // Validation
        state = self.advance(&execution_id, state, ExecutionState::Validating);
        let toolset = self.toolset();
        let modules = match self.prepare(script, limits, &toolset) {
            Ok(modules) => modules,
            Err(violation) => {
                self.advance(&execution_id, state, ExecutionState::Rejected);
                warn!("Execution {} rejected: {}", execution_id, violation);
                self.emit(
                    event_types::VALIDATION_REJECTED,
                    json!({
                        "execution_id": execution_id,
                        "reason": violation,
                    }),
                );
                let result = ExecutionResult::rejected(
                    execution_id,
                    ExecutionError::new(ErrorKind::SecurityViolation, violation),
                    started.elapsed().as_secs_f64(),
                );
                self.finish(&result);
                return result;
            }
        };

        // Run
        state = self.advance(&execution_id, state, ExecutionState::Running);
        let guard = ExecutionGuard::new(
            started + limits.wall_clock_timeout,
            self.cancellation.as_ref(),
        );
        let output = OutputSink::new(limits.max_output_bytes);
        let tracker = Arc::new(ExecutionTracker::new(
            execution_id.clone(),
            self.router.clone(),
            toolset,
            guard.clone(),
            self.config.redaction.clone(),
            limits.max_tool_calls,
            self.events.clone(),
        ));
        let run = ScriptRun {
            execution_id: execution_id.clone(),
            script: script.to_string(),
            modules,
            bridge: tracker.clone(),
            guard: guard.clone(),
            output: output.clone(),
            limits: limits.clone(),
        };

        let outcome = self.drive(run, &guard, limits).await;
        let (return_value, error) = classify(outcome, &guard, limits);

        let terminal = ExecutionState::terminal_for(error.as_ref().map(|e| e.kind));
        self.advance(&execution_id, state, terminal);

        let result = ExecutionResult {
            error,
            execution_time: started.elapsed().as_secs_f64(),
            captured_output: output.contents(),
            return_value,
            tool_calls: tracker.snapshot(),
            execution_id,
        };
        self.finish(&result);
        result
    }

    /// Validate and select the stub modules the script imports
    fn prepare(
        &self,
        script: &str,
        limits: &SandboxLimits,
        toolset: &Toolset,
    ) -> Result<Vec<StubModule>, String> {
        let validated = ScriptValidator::new(limits.max_script_bytes)
            .validate(script)
            .map_err(|v| v.to_string())?;

        if let Some(unknown) = validated
            .imports
            .iter()
            .find(|domain| !toolset.catalog.has_domain(domain))
        {
            return Err(format!("module 'tools.{}' does not exist", unknown));
        }

        let bundle = self.stubs.get_or_generate(&toolset.catalog);
        Ok(validated
            .imports
            .iter()
            .filter_map(|domain| bundle.module(domain).cloned())
            .collect())
    }

    /// Run under the deadline. After an abort the runtime gets
    /// `cancel_grace` to unwind before its future is dropped.
    async fn drive(
        &self,
        run: ScriptRun,
        guard: &ExecutionGuard,
        limits: &SandboxLimits,
    ) -> Result<Value, ScriptFailure> {
        let runtime = self.runtime.clone();
        let fut = async move { runtime.run(run).await };
        tokio::pin!(fut);

        tokio::select! {
            result = &mut fut => return result,
            _ = tokio::time::sleep_until(guard.deadline()) => {
                guard.abort(AbortReason::Timeout);
            }
            _ = guard.token().cancelled() => {}
        }

        debug!("Execution aborted ({:?}), waiting for runtime to unwind", guard.reason());
        match tokio::time::timeout(limits.cancel_grace, &mut fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Runtime did not unwind within {:?}", limits.cancel_grace);
                Err(ScriptFailure::Aborted)
            }
        }
    }

    fn advance(
        &self,
        execution_id: &str,
        from: ExecutionState,
        to: ExecutionState,
    ) -> ExecutionState {
        match from.transition(to) {
            Ok(state) => {
                debug!("Execution {}: {} -> {}", execution_id, from, state);
                self.emit(
                    event_types::EXECUTION_STATE,
                    json!({
                        "execution_id": execution_id,
                        "from": from.as_str(),
                        "to": state.as_str(),
                    }),
                );
                state
            }
            Err(e) => {
                warn!("Execution {}: {}", execution_id, e);
                from
            }
        }
    }

    fn finish(&self, result: &ExecutionResult) {
        match &result.error {
            None => info!(
                "Execution {} completed in {:.3}s with {} tool call(s)",
                result.execution_id,
                result.execution_time,
                result.tool_calls.len()
            ),
            Some(error) => info!(
                "Execution {} failed in {:.3}s with {} tool call(s): {}",
                result.execution_id,
                result.execution_time,
                result.tool_calls.len(),
                error
            ),
        }
        self.emit(
            event_types::EXECUTION_FINISHED,
            json!({
                "execution_id": result.execution_id,
                "execution_time": result.execution_time,
                "tool_calls": result.tool_calls.len(),
                "error": result.error,
            }),
        );
    }

    fn emit(&self, event_type: &'static str, payload: Value) {
        self.events.emit(ExecutionEvent::new(event_type, payload));
    }
}

/// Map a run outcome to `(return_value, error)`.
///
/// An abort recorded on the guard outranks whatever the runtime reported,
/// since the script only saw the abort's side effects.
fn classify(
    outcome: Result<Value, ScriptFailure>,
    guard: &ExecutionGuard,
    limits: &SandboxLimits,
) -> (Value, Option<ExecutionError>) {
    if let Some(reason) = guard.reason() {
        return (
            Value::Null,
            Some(ExecutionError::new(
                reason.error_kind(),
                reason.message(limits.wall_clock_timeout),
            )),
        );
    }
    match outcome {
        Ok(value) => (value, None),
        Err(failure) => {
            let kind = match &failure {
                ScriptFailure::Tool(e) => e.error_kind(),
                ScriptFailure::MemoryLimit(_) => ErrorKind::ResourceLimitExceeded,
                ScriptFailure::Script(_) => ErrorKind::ScriptError,
                ScriptFailure::Aborted | ScriptFailure::Internal(_) => ErrorKind::InternalError,
            };
            (Value::Null, Some(ExecutionError::new(kind, failure.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::ports::tool_bridge::ToolCallError;
    use crate::ports::tool_worker::{ToolWorker, WorkerError, WorkerRegistry};
    use async_trait::async_trait;
    use futures::future::BoxFuture;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use toolscript_domain::{ToolCatalog, ToolDefinition, ToolKind, ToolParameter};

    type RunFn = dyn Fn(ScriptRun) -> BoxFuture<'static, Result<Value, ScriptFailure>> + Send + Sync;

    /// Runtime whose behaviour is a closure over the run
    struct FnRuntime {
        body: Box<RunFn>,
        ran: AtomicBool,
    }

    impl FnRuntime {
        fn new(
            body: impl Fn(ScriptRun) -> BoxFuture<'static, Result<Value, ScriptFailure>>
            + Send
            + Sync
            + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                body: Box::new(body),
                ran: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl ScriptRuntime for FnRuntime {
        async fn run(&self, run: ScriptRun) -> Result<Value, ScriptFailure> {
            self.ran.store(true, Ordering::SeqCst);
            (self.body)(run).await
        }
    }

    struct Weather;

    #[async_trait]
    impl ToolWorker for Weather {
        async fn invoke(&self, _tool: &ToolDefinition, params: &Value) -> Result<Value, WorkerError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(json!({"location": params["location"], "temp_c": 21}))
        }
    }

    fn toolset() -> Toolset {
        let catalog = ToolCatalog::new("test", "1")
            .with_tool(
                ToolDefinition::new("weather", "get_weather", ToolKind::RemoteWorker, "weather")
                    .with_parameter(ToolParameter::new("location", "city", true)),
            )
            .unwrap();
        Toolset::new(
            catalog,
            WorkerRegistry::new().with_worker("weather.get_weather", Arc::new(Weather)),
        )
    }

    fn config() -> EngineConfig {
        EngineConfig::default()
            .with_sandbox(
                SandboxLimits::default()
                    .with_wall_clock_timeout(Duration::from_secs(2))
                    .with_max_tool_calls(3),
            )
            .with_router(RouterConfig::default())
    }

    const WEATHER_SCRIPT: &str = "local weather = require('tools.weather')\nreturn 1";

    fn call_weather(run: &ScriptRun, location: &str) -> BoxFuture<'static, Result<Value, ToolCallError>> {
        let bridge = run.bridge.clone();
        let location = location.to_string();
        Box::pin(async move {
            bridge
                .call("weather", "get_weather", json!({"location": location}), None)
                .await
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_happy_path_collects_output_and_calls() {
        let runtime = FnRuntime::new(|run| {
            Box::pin(async move {
                assert_eq!(run.modules.len(), 1);
                assert_eq!(run.modules[0].module_name, "tools.weather");
                let r = call_weather(&run, "NYC").await.map_err(ScriptFailure::Tool)?;
                run.output.write_line(&r.to_string());
                Ok(json!("done"))
            })
        });
        let executor = ScriptExecutor::new(runtime, toolset(), config());

        let result = executor.execute(WEATHER_SCRIPT).await;

        assert!(result.error.is_none(), "{:?}", result.error);
        assert_eq!(result.return_value, json!("done"));
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].tool, "get_weather");
        assert!(result.captured_output.contains("NYC"));
        assert!(!result.execution_id.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_script_never_runs() {
        let runtime = FnRuntime::new(|_| Box::pin(async { Ok(Value::Null) }));
        let executor = ScriptExecutor::new(runtime.clone(), toolset(), config());

        let result = executor.execute("os.execute('rm -rf /')").await;

        assert_eq!(result.error_kind(), Some(ErrorKind::SecurityViolation));
        assert!(result.tool_calls.is_empty());
        assert!(!runtime.ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_domain_is_rejected() {
        let runtime = FnRuntime::new(|_| Box::pin(async { Ok(Value::Null) }));
        let executor = ScriptExecutor::new(runtime.clone(), toolset(), config());

        let result = executor.execute("local s = require('tools.search')").await;

        assert_eq!(result.error_kind(), Some(ErrorKind::SecurityViolation));
        assert!(result.error.unwrap().message.contains("tools.search"));
        assert!(!runtime.ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_completed_calls() {
        let runtime = FnRuntime::new(|run| {
            Box::pin(async move {
                call_weather(&run, "NYC").await.map_err(ScriptFailure::Tool)?;
                // Stuck until aborted
                run.guard.token().cancelled().await;
                Err(ScriptFailure::Aborted)
            })
        });
        let executor = ScriptExecutor::new(runtime, toolset(), config());

        let result = executor.execute(WEATHER_SCRIPT).await;

        assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
        assert_eq!(result.tool_calls.len(), 1);
        assert!(result.tool_calls[0].error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_that_ignores_abort_is_dropped_after_grace() {
        let runtime = FnRuntime::new(|_| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Value::Null)
            })
        });
        let executor = ScriptExecutor::new(runtime, toolset(), config());

        let result = executor.execute("return 1").await;

        assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
        assert!(result.execution_time < 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_cap_aborts_with_resource_limit() {
        let runtime = FnRuntime::new(|run| {
            Box::pin(async move {
                loop {
                    call_weather(&run, "NYC").await.map_err(ScriptFailure::Tool)?;
                }
            })
        });
        let executor = ScriptExecutor::new(runtime, toolset(), config());

        let result = executor.execute(WEATHER_SCRIPT).await;

        assert_eq!(result.error_kind(), Some(ErrorKind::ResourceLimitExceeded));
        assert_eq!(result.tool_calls.len(), 3);
        let indexes: Vec<u64> = result.tool_calls.iter().map(|r| r.call_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncaught_tool_error_surfaces_its_kind() {
        let runtime = FnRuntime::new(|_| {
            Box::pin(async {
                Err(ScriptFailure::Tool(ToolCallError::CircuitOpen {
                    tool: "weather.get_weather".to_string(),
                    retry_after: Duration::from_secs(3),
                }))
            })
        });
        let executor = ScriptExecutor::new(runtime, toolset(), config());

        let result = executor.execute("return 1").await;
        assert_eq!(result.error_kind(), Some(ErrorKind::CircuitOpen));
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_cancellation() {
        let token = CancellationToken::new();
        let runtime = FnRuntime::new(|run| {
            Box::pin(async move {
                run.guard.token().cancelled().await;
                Err(ScriptFailure::Aborted)
            })
        });
        let executor =
            ScriptExecutor::new(runtime, toolset(), config()).with_cancellation(token.clone());

        let cancel = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        };
        let (result, _) = tokio::join!(executor.execute("return 1"), cancel);
        assert_eq!(result.error_kind(), Some(ErrorKind::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_toolset_between_executions() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let runtime = {
            let seen = seen.clone();
            FnRuntime::new(move |run| {
                seen.lock()
                    .unwrap()
                    .push(run.modules.iter().map(|m| m.module_name.clone()).collect::<Vec<_>>());
                Box::pin(async { Ok(Value::Null) })
            })
        };
        let executor = ScriptExecutor::new(runtime, toolset(), config());
        assert!(executor.execute("require('tools.search')").await.error.is_some());

        let catalog = ToolCatalog::new("test", "2")
            .with_tool(ToolDefinition::new("search", "query", ToolKind::RemoteWorker, ""))
            .unwrap();
        executor.replace_toolset(Toolset::new(catalog, WorkerRegistry::new()));

        let result = executor.execute("require('tools.search')").await;
        assert!(result.error.is_none());
        assert_eq!(*seen.lock().unwrap(), vec![vec!["tools.search".to_string()]]);
    }
}
