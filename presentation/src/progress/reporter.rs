//! Live progress for script executions, driven by execution events

use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;
use toolscript_application::{ExecutionEvent, ExecutionEventSink, event_types};

#[derive(Default)]
struct ReporterState {
    spinner: Option<ProgressBar>,
    finished_calls: u64,
    failed_calls: u64,
}

/// Spinner on stderr showing the call in flight and a running tally
pub struct ProgressReporter {
    state: Mutex<ReporterState>,
    hidden: bool,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ReporterState::default()),
            hidden: false,
        }
    }

    /// Tracks events without drawing anything
    pub fn hidden() -> Self {
        Self {
            hidden: true,
            ..Self::new()
        }
    }

    /// Calls finished so far, and how many of those failed
    pub fn tally(&self) -> (u64, u64) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        (state.finished_calls, state.failed_calls)
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn start(&self, state: &mut ReporterState) {
        let target = if self.hidden {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        };
        let spinner = ProgressBar::with_draw_target(None, target);
        spinner.set_style(Self::spinner_style());
        spinner.set_prefix("toolscript");
        spinner.set_message("running...");
        if !self.hidden {
            spinner.enable_steady_tick(Duration::from_millis(100));
        }
        *state = ReporterState {
            spinner: Some(spinner),
            ..ReporterState::default()
        };
    }

    fn note(state: &ReporterState, line: String) {
        if let Some(spinner) = &state.spinner {
            spinner.println(line);
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn text<'a>(payload: &'a Value, field: &str) -> &'a str {
    payload.get(field).and_then(Value::as_str).unwrap_or("?")
}

impl ExecutionEventSink for ProgressReporter {
    fn emit(&self, event: ExecutionEvent) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let payload = &event.payload;

        match event.event_type {
            event_types::EXECUTION_STARTED => self.start(&mut state),
            event_types::TOOL_CALL_STARTED => {
                if let Some(spinner) = &state.spinner {
                    spinner.set_message(format!(
                        "#{} {}.{}",
                        payload["call_index"],
                        text(payload, "domain"),
                        text(payload, "tool")
                    ));
                }
            }
            event_types::TOOL_CALL_FINISHED => {
                state.finished_calls += 1;
                if let Some(error) = payload.get("error").and_then(Value::as_str) {
                    state.failed_calls += 1;
                    let line = format!(
                        "  {} #{} {}: {}",
                        "x".red(),
                        payload["call_index"],
                        text(payload, "tool"),
                        error
                    );
                    Self::note(&state, line);
                }
                if let Some(spinner) = &state.spinner {
                    spinner.set_message(format!(
                        "{} call(s) finished, {} failed",
                        state.finished_calls, state.failed_calls
                    ));
                }
            }
            event_types::CACHE_HIT => {
                let line = format!("  {} replayed {}", "=".cyan(), text(payload, "tool"));
                Self::note(&state, line);
            }
            event_types::RETRY_SCHEDULED => {
                let line = format!(
                    "  {} {} attempt {} failed, retrying in {}ms",
                    "~".yellow(),
                    text(payload, "tool"),
                    payload["attempt"],
                    payload["delay_ms"]
                );
                Self::note(&state, line);
            }
            event_types::CIRCUIT_TRANSITION => {
                let line = format!(
                    "  {} circuit {} {} -> {}",
                    "!".yellow().bold(),
                    text(payload, "tool"),
                    text(payload, "from"),
                    text(payload, "to")
                );
                Self::note(&state, line);
            }
            event_types::EXECUTION_FINISHED => {
                if let Some(spinner) = state.spinner.take() {
                    let summary = if payload["error"].is_null() {
                        let seconds = payload["execution_time"].as_f64().unwrap_or(0.0);
                        format!("{} in {:.2}s", "done".green(), seconds)
                    } else {
                        "failed".red().to_string()
                    };
                    spinner.finish_with_message(summary);
                }
            }
            _ => {}
        }
    }
}

/// Plain line-per-event progress on stderr (no fancy UI)
pub struct SimpleProgress;

impl ExecutionEventSink for SimpleProgress {
    fn emit(&self, event: ExecutionEvent) {
        let payload = &event.payload;
        match event.event_type {
            event_types::TOOL_CALL_FINISHED => match payload.get("error").and_then(Value::as_str) {
                None => eprintln!("  {} {}", "v".green(), text(payload, "tool")),
                Some(error) => eprintln!("  {} {} ({})", "x".red(), text(payload, "tool"), error),
            },
            event_types::CIRCUIT_TRANSITION => eprintln!(
                "{} circuit {} -> {}",
                "->".cyan(),
                text(payload, "tool"),
                text(payload, "to")
            ),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(event_type: &'static str, payload: Value) -> ExecutionEvent {
        ExecutionEvent::new(event_type, payload)
    }

    #[test]
    fn test_tally_follows_call_events() {
        let reporter = ProgressReporter::hidden();
        reporter.emit(event(event_types::EXECUTION_STARTED, json!({"execution_id": "e"})));
        for (index, error) in [(0, Value::Null), (1, json!("boom")), (2, Value::Null)] {
            reporter.emit(event(
                event_types::TOOL_CALL_STARTED,
                json!({"call_index": index, "domain": "weather", "tool": "get_weather"}),
            ));
            reporter.emit(event(
                event_types::TOOL_CALL_FINISHED,
                json!({"call_index": index, "tool": "get_weather", "error": error}),
            ));
        }
        reporter.emit(event(
            event_types::EXECUTION_FINISHED,
            json!({"execution_time": 0.2, "error": null}),
        ));

        assert_eq!(reporter.tally(), (3, 1));
    }

    #[test]
    fn test_new_execution_resets_tally() {
        let reporter = ProgressReporter::hidden();
        reporter.emit(event(event_types::EXECUTION_STARTED, json!({})));
        reporter.emit(event(
            event_types::TOOL_CALL_FINISHED,
            json!({"call_index": 0, "tool": "t", "error": "x"}),
        ));
        reporter.emit(event(event_types::EXECUTION_STARTED, json!({})));
        assert_eq!(reporter.tally(), (0, 0));
    }

    #[test]
    fn test_events_before_start_are_ignored() {
        let reporter = ProgressReporter::hidden();
        reporter.emit(event(event_types::CACHE_HIT, json!({"tool": "t"})));
        reporter.emit(event(event_types::EXECUTION_FINISHED, json!({"error": null})));
        assert_eq!(reporter.tally(), (0, 0));
    }
}
