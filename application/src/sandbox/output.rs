//! Captured-output sink shared between the runtime and the executor.

use std::sync::{Arc, Mutex};

/// Appended once when output overflows the cap
pub const TRUNCATION_MARKER: &str = "...[output truncated]";

#[derive(Debug)]
struct OutputBuffer {
    text: String,
    limit: usize,
    truncated: bool,
}

/// Line-oriented, size-capped text buffer
#[derive(Debug, Clone)]
pub struct OutputSink {
    inner: Arc<Mutex<OutputBuffer>>,
}

impl OutputSink {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(OutputBuffer {
                text: String::new(),
                limit,
                truncated: false,
            })),
        }
    }

    /// Append `line` plus a newline; what does not fit is dropped
    pub fn write_line(&self, line: &str) {
        let mut buffer = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if buffer.truncated {
            return;
        }
        let room = buffer.limit.saturating_sub(buffer.text.len());
        if line.len() < room {
            buffer.text.push_str(line);
            buffer.text.push('\n');
            return;
        }
        let mut end = room.min(line.len());
        while end > 0 && !line.is_char_boundary(end) {
            end -= 1;
        }
        buffer.text.push_str(&line[..end]);
        buffer.text.push_str(TRUNCATION_MARKER);
        buffer.truncated = true;
    }

    pub fn contents(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .text
            .clone()
    }

    pub fn is_truncated(&self) -> bool {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).truncated
    }
}
