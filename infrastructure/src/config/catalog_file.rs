//! Tool catalog file (TOML) and worker bindings
//!
//! ```toml
//! name = "demo"
//! version = "1"
//!
//! [[tools]]
//! name = "get_weather"
//! domain = "weather"
//! kind = "remote-worker"
//! description = "Current weather for a city"
//! examples = ['weather.get_weather{ location = "NYC" }']
//!
//! [[tools.parameters]]
//! name = "location"
//! type = "string"
//! required = true
//!
//! [tools.worker]
//! type = "command"
//! command = "curl -s https://wttr.in/{location}?format=j1"
//! retry_exit_codes = [6, 7, 28]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use toolscript_application::{ToolWorker, Toolset, WorkerRegistry};
use toolscript_domain::{DomainError, ToolCatalog, ToolDefinition, ToolKind, ToolParameter};

use crate::workers::{CommandWorker, StaticWorker};

/// Errors from loading a catalog file
#[derive(Debug, Error)]
pub enum CatalogFileError {
    #[error("failed to read catalog {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error("tool '{tool}' uses an http worker, which requires the 'http-workers' feature")]
    HttpWorkersDisabled { tool: String },
}

/// How a tool's worker is provided
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileWorkerBinding {
    /// Shell command template with `{param}` placeholders
    Command {
        command: String,
        #[serde(default)]
        retry_exit_codes: Vec<i32>,
        /// Relative paths resolve against the catalog file's directory
        #[serde(default)]
        working_dir: Option<PathBuf>,
    },
    /// Fixed JSON response
    Static { response: Value },
    /// POST the parameters as JSON
    Http {
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

/// One `[[tools]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileToolEntry {
    pub name: String,
    pub domain: String,
    pub kind: ToolKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub worker: Option<FileWorkerBinding>,
}

impl FileToolEntry {
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            domain: self.domain.clone(),
            kind: self.kind,
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            examples: self.examples.clone(),
        }
    }
}

/// Raw catalog file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogFile {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub tools: Vec<FileToolEntry>,
    /// Directory used to resolve relative worker paths
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

fn default_version() -> String {
    "0".to_string()
}

impl CatalogFile {
    pub fn load(path: &Path) -> Result<Self, CatalogFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut file = Self::parse(&text, path)?;
        file.base_dir = path.parent().map(Path::to_path_buf);
        Ok(file)
    }

    /// Parse catalog text; `origin` is only used in error messages
    pub fn parse(text: &str, origin: &Path) -> Result<Self, CatalogFileError> {
        toml::from_str(text).map_err(|source| CatalogFileError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Build the catalog alone (no workers)
    pub fn to_catalog(&self) -> Result<ToolCatalog, CatalogFileError> {
        let mut catalog = ToolCatalog::new(self.name.as_str(), self.version.as_str());
        for entry in &self.tools {
            catalog.insert(entry.definition())?;
        }
        Ok(catalog)
    }

    /// Build the catalog plus a worker for every bound tool
    pub fn to_toolset(&self) -> Result<Toolset, CatalogFileError> {
        let catalog = self.to_catalog()?;
        let mut workers = WorkerRegistry::new();
        #[cfg(feature = "http-workers")]
        let client = reqwest::Client::new();

        for entry in &self.tools {
            let Some(binding) = &entry.worker else {
                continue;
            };
            let qualified = entry.definition().qualified_name();
            let worker: Arc<dyn ToolWorker> = match binding {
                FileWorkerBinding::Command {
                    command,
                    retry_exit_codes,
                    working_dir,
                } => {
                    let mut worker = CommandWorker::new(command.as_str())
                        .with_retry_exit_codes(retry_exit_codes.clone());
                    if let Some(dir) = working_dir {
                        worker = worker.with_working_dir(self.resolve(dir));
                    }
                    Arc::new(worker)
                }
                FileWorkerBinding::Static { response } => {
                    Arc::new(StaticWorker::new(response.clone()))
                }
                #[cfg(feature = "http-workers")]
                FileWorkerBinding::Http { url, headers } => {
                    let mut worker = crate::workers::HttpWorker::new(client.clone(), url.as_str());
                    for (name, value) in headers {
                        worker = worker.with_header(name.as_str(), value.as_str());
                    }
                    Arc::new(worker)
                }
                #[cfg(not(feature = "http-workers"))]
                FileWorkerBinding::Http { .. } => {
                    return Err(CatalogFileError::HttpWorkersDisabled { tool: qualified });
                }
            };
            workers.register(qualified, worker);
        }

        Ok(Toolset::new(catalog, workers))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}
