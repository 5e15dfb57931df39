//! Console output formatter for execution results

use crate::output::formatter::OutputFormatter;
use colored::Colorize;
use toolscript_domain::{ExecutionResult, SecurityViolation, ToolCallRecord, ValidatedScript};

/// Formats execution results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format the complete result: status, output, return value and call log
    pub fn format(result: &ExecutionResult) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Execution Result"));
        output.push('\n');

        let status = match &result.error {
            None => "ok".green().bold().to_string(),
            Some(error) => format!("{} {}", error.kind.as_str().red().bold(), error.message),
        };
        output.push_str(&format!("{} {}\n", "Status:".cyan().bold(), status));
        output.push_str(&format!(
            "{} {:.3}s ({})\n",
            "Time:".cyan().bold(),
            result.execution_time,
            result.execution_id.dimmed()
        ));

        if !result.captured_output.is_empty() {
            output.push_str(&Self::section_header("Output"));
            output.push_str(&result.captured_output);
            if !result.captured_output.ends_with('\n') {
                output.push('\n');
            }
        }

        if !result.return_value.is_null() {
            output.push_str(&Self::section_header("Return Value"));
            let value = serde_json::to_string_pretty(&result.return_value)
                .unwrap_or_else(|_| result.return_value.to_string());
            output.push_str(&value);
            output.push('\n');
        }

        if !result.tool_calls.is_empty() {
            output.push_str(&Self::section_header(&format!(
                "Tool Calls ({})",
                result.tool_calls.len()
            )));
            for record in &result.tool_calls {
                output.push_str(&Self::call_line(record));
                output.push('\n');
            }
        }

        output.push_str(&Self::footer());
        output
    }

    /// Format as JSON
    pub fn format_json(result: &ExecutionResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string())
    }

    /// Outcome of `validate`
    pub fn format_validation(outcome: &Result<ValidatedScript, SecurityViolation>) -> String {
        match outcome {
            Ok(validated) if validated.imports.is_empty() => {
                format!("{} no tool modules imported\n", "valid".green().bold())
            }
            Ok(validated) => {
                let mut output = format!("{} imports:\n", "valid".green().bold());
                for domain in &validated.imports {
                    output.push_str(&format!("  tools.{}\n", domain));
                }
                output
            }
            Err(violation) => format!("{} {}\n", "rejected".red().bold(), violation),
        }
    }

    fn call_line(record: &ToolCallRecord) -> String {
        let duration = record
            .duration
            .map(|d| format!("{:.3}s", d))
            .unwrap_or_else(|| "-".to_string());
        match &record.error {
            None => format!(
                "  {} #{} {}.{} {} ({} bytes)",
                "v".green(),
                record.call_index,
                record.domain,
                record.tool,
                duration.dimmed(),
                record.result_size.unwrap_or(0)
            ),
            Some(error) => format!(
                "  {} #{} {}.{} {} {}",
                "x".red(),
                record.call_index,
                record.domain,
                record.tool,
                duration.dimmed(),
                error
            ),
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, result: &ExecutionResult) -> String {
        Self::format(result)
    }

    fn format_json(&self, result: &ExecutionResult) -> String {
        Self::format_json(result)
    }
}
