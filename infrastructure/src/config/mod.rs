//! Configuration and catalog file loading for toolscript
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `TOOLSCRIPT_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./toolscript.toml` or `./.toolscript.toml`
//! 4. Global: `$XDG_CONFIG_HOME/toolscript/config.toml`
//! 5. Default values
//!
//! Tool catalogs are separate TOML files, see [`CatalogFile`].

mod catalog_file;
mod file_config;
mod loader;

pub use catalog_file::{CatalogFile, CatalogFileError, FileToolEntry, FileWorkerBinding};
pub use file_config::{
    ConfigValidationError, FileBreakerConfig, FileConfig, FileIdempotencyConfig, FileOutputConfig,
    FileOutputFormat, FileRedactionConfig, FileRetryConfig, FileRouterConfig, FileSandboxConfig,
};
pub use loader::{ConfigLoader, ConfigSources, ENV_PREFIX};
