//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// Prefix for environment overrides (`TOOLSCRIPT_ROUTER__RETRY__MAX_ATTEMPTS=5`)
pub const ENV_PREFIX: &str = "TOOLSCRIPT_";

/// Project-level config file names, checked in order
const PROJECT_FILES: [&str; 2] = ["toolscript.toml", ".toolscript.toml"];

/// Files taking part in one load, lowest priority first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSources {
    pub global: Option<PathBuf>,
    pub project: Option<PathBuf>,
    pub explicit: Option<PathBuf>,
    pub env_prefix: String,
}

impl ConfigSources {
    /// Discover the global and project files; `explicit` comes from `--config`.
    pub fn discover(explicit: Option<&Path>) -> Self {
        Self {
            global: ConfigLoader::global_config_path().filter(|p| p.exists()),
            project: ConfigLoader::project_config_path(),
            explicit: explicit.map(Path::to_path_buf),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    fn figment(&self) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));
        if let Some(path) = &self.global {
            figment = figment.merge(Toml::file(path));
        }
        if let Some(path) = &self.project {
            figment = figment.merge(Toml::file(path));
        }
        // An explicit file must exist
        if let Some(path) = &self.explicit {
            figment = figment.merge(Toml::file_exact(path));
        }
        if !self.env_prefix.is_empty() {
            figment = figment.merge(Env::prefixed(&self.env_prefix).split("__"));
        }
        figment
    }
}

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `TOOLSCRIPT_*` environment variables (`__` separates sections)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./toolscript.toml` or `./.toolscript.toml`
    /// 4. Global: `$XDG_CONFIG_HOME/toolscript/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, Box<figment::Error>> {
        Self::load_from(&ConfigSources::discover(config_path))
    }

    pub fn load_from(sources: &ConfigSources) -> Result<FileConfig, Box<figment::Error>> {
        sources.figment().extract().map_err(Box::new)
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// `$XDG_CONFIG_HOME/toolscript/config.toml` (or the platform equivalent)
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("toolscript").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Describe the config sources in priority order
    pub fn describe_sources(explicit: Option<&Path>) -> Vec<String> {
        let mut lines = vec!["Configuration sources (in priority order):".to_string()];

        lines.push(format!("  [ENV  ] Environment: {}*", ENV_PREFIX));

        match explicit {
            Some(path) if path.exists() => {
                lines.push(format!("  [FOUND] Explicit: {}", path.display()))
            }
            Some(path) => lines.push(format!("  [MISS ] Explicit: {}", path.display())),
            None => lines.push("  [     ] Explicit: --config <FILE>".to_string()),
        }

        match Self::project_config_path() {
            Some(path) => lines.push(format!("  [FOUND] Project: {}", path.display())),
            None => lines.push(format!(
                "  [     ] Project: ./{} or ./{}",
                PROJECT_FILES[0], PROJECT_FILES[1]
            )),
        }

        if let Some(path) = Self::global_config_path() {
            let marker = if path.exists() { "FOUND" } else { "     " };
            lines.push(format!("  [{}] Global:  {}", marker, path.display()));
        }

        lines.push("  [     ] Default: built-in defaults".to_string());
        lines
    }
}
