//! `parallel(tasks [, width])`: bounded concurrent fan-out.
//!
//! ```lua
//! local results = parallel({
//!     function() return weather.get_weather("NYC") end,
//!     function() return weather.get_weather("Paris") end,
//! }, 2)
//! ```
//!
//! Results come back in task order. The first task to fail raises its
//! error and the tasks still running are dropped. Inside a sandboxed VM
//! each task runs on its own coroutine carrying the abort hook.

use futures::StreamExt;
use futures::stream;
use mlua::prelude::*;

use super::sandbox::AbortHook;

/// Register `parallel` with the given width cap.
pub fn register_fanout_api(lua: &Lua, max_fanout: usize) -> LuaResult<()> {
    let max_fanout = max_fanout.max(1);
    let parallel = lua.create_async_function(
        move |lua, (tasks, width): (LuaTable, Option<i64>)| {
            let parent = lua.current_thread();
            let hook = lua.app_data_ref::<AbortHook>().map(|hook| AbortHook::clone(&hook));
            run_parallel(lua, tasks, width, max_fanout, parent, hook)
        },
    )?;
    lua.globals().set("parallel", parallel)
}

async fn run_parallel(
    lua: Lua,
    tasks: LuaTable,
    width: Option<i64>,
    max_fanout: usize,
    parent: LuaThread,
    hook: Option<AbortHook>,
) -> LuaResult<LuaTable> {
    let width = match width {
        None => max_fanout,
        Some(w) if w >= 1 => (w as usize).min(max_fanout),
        Some(w) => {
            return Err(LuaError::external(format!(
                "parallel: width must be at least 1, got {}",
                w
            )));
        }
    };

    let tasks = tasks
        .sequence_values::<LuaFunction>()
        .collect::<LuaResult<Vec<_>>>()
        .map_err(|e| LuaError::external(format!("parallel: tasks must be functions ({})", e)))?;
    let count = tasks.len();

    let (lua_ref, parent, hook) = (&lua, &parent, &hook);
    let mut running = stream::iter(tasks.into_iter().enumerate().map(
        |(index, task)| async move {
            let value = match hook {
                Some(hook) => {
                    let thread = lua_ref.create_thread(task)?;
                    hook.drive(thread, Some(parent.clone())).await?
                }
                None => task.call_async::<LuaValue>(()).await?,
            };
            Ok::<_, LuaError>((index, value))
        },
    ))
    .buffer_unordered(width);

    let mut results = vec![LuaValue::Nil; count];
    while let Some(outcome) = running.next().await {
        let (index, value) = outcome?;
        results[index] = value;
    }

    let table = lua.create_table_with_capacity(count, 0)?;
    for (index, value) in results.into_iter().enumerate() {
        table.raw_set(index + 1, value)?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// `wait(ms)` that tracks how many waits overlap
    fn register_wait(lua: &Lua, active: Arc<AtomicUsize>, peak: Arc<AtomicUsize>) {
        let wait = lua
            .create_async_function(move |_, ms: u64| {
                let active = active.clone();
                let peak = peak.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(ms)
                }
            })
            .unwrap();
        lua.globals().set("wait", wait).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_in_task_order() {
        let lua = Lua::new();
        register_fanout_api(&lua, 8).unwrap();
        register_wait(&lua, Arc::default(), Arc::default());

        let results: Vec<u64> = lua
            .load(
                r#"
                return parallel({
                    function() return wait(30) end,
                    function() return wait(10) end,
                    function() return wait(20) end,
                })
            "#,
            )
            .eval_async()
            .await
            .unwrap();
        assert_eq!(results, vec![30, 10, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_width_is_capped() {
        let lua = Lua::new();
        let peak = Arc::new(AtomicUsize::new(0));
        register_fanout_api(&lua, 2).unwrap();
        register_wait(&lua, Arc::default(), peak.clone());

        lua.load(
            r#"
            local tasks = {}
            for i = 1, 6 do
                tasks[i] = function() return wait(10) end
            end
            parallel(tasks, 5)
        "#,
        )
        .exec_async()
        .await
        .unwrap();
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_failure_is_raised() {
        let lua = Lua::new();
        register_fanout_api(&lua, 4).unwrap();
        register_wait(&lua, Arc::default(), Arc::default());

        let result = lua
            .load(
                r#"
                return parallel({
                    function() return wait(50) end,
                    function() error("task failed") end,
                })
            "#,
            )
            .exec_async()
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("task failed"), "{}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_and_invalid_input() {
        let lua = Lua::new();
        register_fanout_api(&lua, 4).unwrap();

        let n: i64 = lua
            .load("return #parallel({})")
            .eval_async()
            .await
            .unwrap();
        assert_eq!(n, 0);

        assert!(lua.load("parallel({1, 2})").exec_async().await.is_err());
        assert!(
            lua.load("parallel({function() end}, 0)")
                .exec_async()
                .await
                .is_err()
        );
    }
}
