//! Command worker: a tool backed by a shell command template.
//!
//! Each `{param}` placeholder is replaced with the shell-escaped parameter
//! value; placeholders for omitted optionals become empty. Stdout that
//! parses as JSON is returned as JSON, anything else as a string.
//!
//! ```toml
//! [tools.worker]
//! type = "command"
//! command = "curl -s https://wttr.in/{location}?format=j1"
//! retry_exit_codes = [6, 7, 28]
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use toolscript_application::{ToolWorker, WorkerError};
use toolscript_domain::ToolDefinition;
use toolscript_domain::core::string::truncate;
use tracing::debug;

/// Maximum captured stdout/stderr (1 MB)
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Longest stderr/stdout excerpt carried in an error message
const MAX_ERROR_DETAIL: usize = 2048;

#[derive(Debug, Clone)]
pub struct CommandWorker {
    template: String,
    working_dir: Option<PathBuf>,
    retry_exit_codes: Vec<i32>,
}

impl CommandWorker {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            working_dir: None,
            retry_exit_codes: Vec::new(),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Exit codes reported as retryable failures
    pub fn with_retry_exit_codes(mut self, codes: Vec<i32>) -> Self {
        self.retry_exit_codes = codes;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Substitute `{name}` placeholders with escaped values.
    pub fn build_command(&self, params: &Value) -> String {
        let mut result = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            result.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    let name = &after[..close];
                    let is_placeholder = !name.is_empty()
                        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
                    if is_placeholder {
                        if let Some(value) = params.get(name).filter(|v| !v.is_null()) {
                            let text = match value {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            };
                            result.push_str(&shell_escape(&text));
                        }
                    } else {
                        result.push('{');
                        result.push_str(name);
                        result.push('}');
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    result.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        result.push_str(rest);
        result
    }
}

#[async_trait]
impl ToolWorker for CommandWorker {
    async fn invoke(&self, tool: &ToolDefinition, params: &Value) -> Result<Value, WorkerError> {
        let command_str = self.build_command(params);
        debug!("Running command for {}: {}", tool.qualified_name(), command_str);

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", &command_str]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", &command_str]);
            c
        };

        if let Some(dir) = &self.working_dir
            && dir.is_dir()
        {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Linux: have the kernel terminate the child if we die first.
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| WorkerError::retryable(format!("failed to execute command: {}", e)))?;

        let stdout = truncate_output(&output.stdout);
        let stderr = truncate_output(&output.stderr);

        if output.status.success() {
            let trimmed = stdout.trim();
            return Ok(serde_json::from_str(trimmed)
                .unwrap_or_else(|_| Value::String(trimmed.to_string())));
        }

        let code = output.status.code();
        let detail = if stderr.trim().is_empty() {
            truncate(stdout.trim(), MAX_ERROR_DETAIL)
        } else {
            truncate(stderr.trim(), MAX_ERROR_DETAIL)
        };
        let message = match code {
            Some(code) => format!("command exited with code {}: {}", code, detail),
            None => format!("command terminated by signal: {}", detail),
        };

        match code {
            Some(code) if self.retry_exit_codes.contains(&code) => {
                Err(WorkerError::retryable(message))
            }
            _ => Err(WorkerError::permanent(message)),
        }
    }
}

fn truncate_output(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= MAX_OUTPUT_SIZE {
        return text.into_owned();
    }
    let mut end = MAX_OUTPUT_SIZE;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Escape a string for safe shell substitution.
///
/// - **Unix**: single-quote wrapping (`it's` → `'it'\''s'`)
/// - **Windows**: double-quote wrapping with `"` → `\"`, `%` → `%%`, `!` → `^!`
pub fn shell_escape(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '/')
    {
        return s.to_string();
    }

    if cfg!(target_os = "windows") {
        shell_escape_windows(s)
    } else {
        shell_escape_unix(s)
    }
}

fn shell_escape_unix(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len() + 4);
    escaped.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            escaped.push_str("'\\''");
        } else {
            escaped.push(ch);
        }
    }
    escaped.push('\'');
    escaped
}

fn shell_escape_windows(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len() + 4);
    escaped.push('"');
    for ch in s.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '%' => escaped.push_str("%%"),
            '!' => escaped.push_str("^!"),
            _ => escaped.push(ch),
        }
    }
    escaped.push('"');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolscript_domain::ToolKind;

    fn tool() -> ToolDefinition {
        ToolDefinition::new("shell", "echo", ToolKind::RemoteWorker, "")
    }

    #[test]
    fn test_build_command_escapes_values() {
        let worker = CommandWorker::new("echo {message} {count}");
        let cmd = worker.build_command(&json!({"message": "hi; rm -rf /", "count": 3}));
        if cfg!(target_os = "windows") {
            assert_eq!(cmd, "echo \"hi; rm -rf /\" 3");
        } else {
            assert_eq!(cmd, "echo 'hi; rm -rf /' 3");
        }
    }

    #[test]
    fn test_build_command_drops_missing_and_keeps_non_placeholders() {
        let worker = CommandWorker::new("jq '{a: .b}' {file} {missing} {unclosed");
        let cmd = worker.build_command(&json!({"file": "x.json"}));
        assert_eq!(cmd, "jq '{a: .b}' x.json  {unclosed");
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_escape_unix() {
        assert_eq!(shell_escape("simple"), "simple");
        assert_eq!(shell_escape("it's"), "'it'\\''s'");
        assert_eq!(shell_escape(""), "''");
        assert_eq!(shell_escape("$(whoami)"), "'$(whoami)'");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_parses_json_stdout() {
        let worker = CommandWorker::new(r#"printf '{"location": "%s"}' {location}"#);
        let result = worker
            .invoke(&tool(), &json!({"location": "NYC"}))
            .await
            .unwrap();
        assert_eq!(result, json!({"location": "NYC"}));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_plain_text_stdout() {
        let worker = CommandWorker::new("echo hello {name}");
        let result = worker.invoke(&tool(), &json!({"name": "world"})).await.unwrap();
        assert_eq!(result, json!("hello world"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_codes_decide_retryability() {
        let worker = CommandWorker::new("echo oops >&2; exit {code}").with_retry_exit_codes(vec![75]);

        let err = worker.invoke(&tool(), &json!({"code": 75})).await.unwrap_err();
        assert!(err.retryable);
        assert!(err.message.contains("code 75"));
        assert!(err.message.contains("oops"));

        let err = worker.invoke(&tool(), &json!({"code": 1})).await.unwrap_err();
        assert!(!err.retryable);
    }
}
