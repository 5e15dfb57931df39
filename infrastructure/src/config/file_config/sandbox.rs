//! Sandbox limits from TOML (`[sandbox]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use toolscript_application::SandboxLimits;

/// Raw sandbox limits; durations in milliseconds, sizes in bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSandboxConfig {
    pub wall_clock_timeout_ms: u64,
    pub max_tool_calls: usize,
    pub max_fanout: usize,
    pub max_memory_bytes: usize,
    pub max_output_bytes: usize,
    pub max_script_bytes: usize,
    pub max_sleep_ms: u64,
    pub instruction_check_interval: u32,
    pub cancel_grace_ms: u64,
    /// Directory backing the `scratch` API; unset disables it
    pub scratch_dir: Option<PathBuf>,
    pub max_scratch_bytes: usize,
}

impl Default for FileSandboxConfig {
    fn default() -> Self {
        let limits = SandboxLimits::default();
        Self {
            wall_clock_timeout_ms: limits.wall_clock_timeout.as_millis() as u64,
            max_tool_calls: limits.max_tool_calls,
            max_fanout: limits.max_fanout,
            max_memory_bytes: limits.max_memory_bytes,
            max_output_bytes: limits.max_output_bytes,
            max_script_bytes: limits.max_script_bytes,
            max_sleep_ms: limits.max_sleep.as_millis() as u64,
            instruction_check_interval: limits.instruction_check_interval,
            cancel_grace_ms: limits.cancel_grace.as_millis() as u64,
            scratch_dir: limits.scratch_dir,
            max_scratch_bytes: limits.max_scratch_bytes,
        }
    }
}

impl FileSandboxConfig {
    pub fn to_limits(&self) -> SandboxLimits {
        SandboxLimits {
            wall_clock_timeout: Duration::from_millis(self.wall_clock_timeout_ms),
            max_tool_calls: self.max_tool_calls,
            max_fanout: self.max_fanout,
            max_memory_bytes: self.max_memory_bytes,
            max_output_bytes: self.max_output_bytes,
            max_script_bytes: self.max_script_bytes,
            max_sleep: Duration::from_millis(self.max_sleep_ms),
            instruction_check_interval: self.instruction_check_interval,
            cancel_grace: Duration::from_millis(self.cancel_grace_ms),
            scratch_dir: self.scratch_dir.clone(),
            max_scratch_bytes: self.max_scratch_bytes,
        }
    }
}
