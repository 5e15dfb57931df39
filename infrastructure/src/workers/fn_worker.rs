//! In-process workers backed by closures.

use async_trait::async_trait;
use serde_json::Value;
use toolscript_application::{ToolWorker, WorkerError};
use toolscript_domain::ToolDefinition;

type WorkerFn = dyn Fn(&Value) -> Result<Value, WorkerError> + Send + Sync;

/// Worker that runs a synchronous function on the parameters.
///
/// Suited to `local-function` tools: cheap, deterministic, no I/O.
pub struct FnWorker {
    func: Box<WorkerFn>,
}

impl FnWorker {
    pub fn new(func: impl Fn(&Value) -> Result<Value, WorkerError> + Send + Sync + 'static) -> Self {
        Self {
            func: Box::new(func),
        }
    }
}

impl std::fmt::Debug for FnWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnWorker").finish_non_exhaustive()
    }
}

#[async_trait]
impl ToolWorker for FnWorker {
    async fn invoke(&self, _tool: &ToolDefinition, params: &Value) -> Result<Value, WorkerError> {
        (self.func)(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolscript_domain::ToolKind;

    #[tokio::test]
    async fn test_fn_worker() {
        let worker = FnWorker::new(|params| {
            let values = params["values"]
                .as_array()
                .ok_or_else(|| WorkerError::permanent("values must be an array"))?;
            Ok(json!(values.iter().filter_map(Value::as_f64).sum::<f64>()))
        });
        let tool = ToolDefinition::new("math", "sum", ToolKind::LocalFunction, "");

        assert_eq!(
            worker.invoke(&tool, &json!({"values": [1, 2.5]})).await.unwrap(),
            json!(3.5)
        );
        assert!(!worker.invoke(&tool, &json!({})).await.unwrap_err().retryable);
    }
}
