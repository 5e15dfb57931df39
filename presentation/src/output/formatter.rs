//! Output formatter trait

use toolscript_domain::ExecutionResult;

/// Trait for formatting execution results
pub trait OutputFormatter {
    /// Human-readable summary
    fn format(&self, result: &ExecutionResult) -> String;

    /// Format as JSON
    fn format_json(&self, result: &ExecutionResult) -> String;
}
