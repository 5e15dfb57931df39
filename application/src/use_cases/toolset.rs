//! Catalog plus the workers bound to it.

use crate::ports::tool_worker::WorkerRegistry;
use std::sync::Arc;
use toolscript_domain::ToolCatalog;

/// What an execution may call. Replaced as a whole between executions.
#[derive(Debug, Clone)]
pub struct Toolset {
    pub catalog: Arc<ToolCatalog>,
    pub workers: WorkerRegistry,
}

impl Toolset {
    pub fn new(catalog: ToolCatalog, workers: WorkerRegistry) -> Self {
        Self {
            catalog: Arc::new(catalog),
            workers,
        }
    }

    /// Qualified names of catalog tools with no worker bound
    pub fn unbound_tools(&self) -> Vec<String> {
        self.catalog
            .all()
            .map(|t| t.qualified_name())
            .filter(|name| !self.workers.contains(name))
            .collect()
    }
}

impl Default for Toolset {
    fn default() -> Self {
        Self::new(ToolCatalog::default(), WorkerRegistry::new())
    }
}
