//! Tool worker port
//!
//! Defines the interface for the concrete workers that actually perform a
//! tool's work (a subprocess, an HTTP endpoint, an in-process function).

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use toolscript_domain::ToolDefinition;

/// Failure reported by a worker.
///
/// `retryable` tells the router whether another attempt could succeed
/// (transport errors, overload) or not (bad input, permanent refusal).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct WorkerError {
    pub message: String,
    pub retryable: bool,
}

impl WorkerError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

/// Port for tool workers
///
/// Implementations (adapters) live in the infrastructure layer. `params` is
/// always a JSON object that already passed argument validation.
#[async_trait]
pub trait ToolWorker: Send + Sync {
    async fn invoke(&self, tool: &ToolDefinition, params: &Value) -> Result<Value, WorkerError>;
}

/// Workers keyed by qualified tool name (`domain.name`)
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    workers: HashMap<String, Arc<dyn ToolWorker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a worker (builder pattern)
    pub fn with_worker(mut self, qualified: impl Into<String>, worker: Arc<dyn ToolWorker>) -> Self {
        self.register(qualified, worker);
        self
    }

    pub fn register(&mut self, qualified: impl Into<String>, worker: Arc<dyn ToolWorker>) {
        self.workers.insert(qualified.into(), worker);
    }

    pub fn get(&self, qualified: &str) -> Option<Arc<dyn ToolWorker>> {
        self.workers.get(qualified).cloned()
    }

    pub fn contains(&self, qualified: &str) -> bool {
        self.workers.contains_key(qualified)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.workers.keys().collect();
        names.sort();
        f.debug_struct("WorkerRegistry")
            .field("workers", &names)
            .finish()
    }
}
