//! Static worker: always answers with the same JSON value.
//!
//! Useful for fixtures, dry runs and tools whose answer never changes.

use async_trait::async_trait;
use serde_json::Value;
use toolscript_application::{ToolWorker, WorkerError};
use toolscript_domain::ToolDefinition;

#[derive(Debug, Clone)]
pub struct StaticWorker {
    response: Value,
}

impl StaticWorker {
    pub fn new(response: Value) -> Self {
        Self { response }
    }
}

#[async_trait]
impl ToolWorker for StaticWorker {
    async fn invoke(&self, _tool: &ToolDefinition, _params: &Value) -> Result<Value, WorkerError> {
        Ok(self.response.clone())
    }
}
