//! HTTP worker: POSTs the parameters as JSON to a fixed URL.
//!
//! Transport errors, 429 and 5xx responses are retryable; other non-2xx
//! responses are not. A JSON body is returned as JSON, any other body as a
//! string.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use toolscript_application::{ToolWorker, WorkerError};
use toolscript_domain::ToolDefinition;
use tracing::debug;

/// Maximum accepted response body (5 MB)
const MAX_BODY_SIZE: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct HttpWorker {
    client: reqwest::Client,
    url: String,
    headers: BTreeMap<String, String>,
}

impl HttpWorker {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Whether a non-success status is worth retrying
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

#[async_trait]
impl ToolWorker for HttpWorker {
    async fn invoke(&self, tool: &ToolDefinition, params: &Value) -> Result<Value, WorkerError> {
        debug!("POST {} for {}", self.url, tool.qualified_name());

        let mut request = self
            .client
            .post(&self.url)
            .header("User-Agent", concat!("toolscript/", env!("CARGO_PKG_VERSION")))
            .header("X-Tool-Name", tool.qualified_name())
            .json(params);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| WorkerError::retryable(format!("request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| WorkerError::retryable(format!("failed to read response body: {}", e)))?;
        if body.len() > MAX_BODY_SIZE {
            return Err(WorkerError::permanent(format!(
                "response too large: {} bytes (max: {} bytes)",
                body.len(),
                MAX_BODY_SIZE
            )));
        }
        let text = String::from_utf8_lossy(&body);

        if !status.is_success() {
            let message = format!(
                "HTTP error: {} {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
                text.trim()
            );
            return if is_retryable_status(status.as_u16()) {
                Err(WorkerError::retryable(message))
            } else {
                Err(WorkerError::permanent(message))
            };
        }

        Ok(serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(text.into_owned())))
    }
}
