//! Infrastructure layer for toolscript
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: the sandboxed Lua runtime, tool workers, the JSONL
//! event log, and configuration/catalog file loading.

pub mod config;
pub mod logging;
pub mod scripting;
pub mod workers;

// Re-export commonly used types
pub use config::{
    CatalogFile, CatalogFileError, ConfigLoader, ConfigSources, ConfigValidationError, FileConfig,
    FileOutputConfig, FileOutputFormat,
};
pub use logging::JsonlEventLogger;
pub use scripting::{LuaRuntime, ScratchDir};
#[cfg(feature = "http-workers")]
pub use workers::HttpWorker;
pub use workers::{CommandWorker, FnWorker, StaticWorker};
