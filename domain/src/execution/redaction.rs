//! Secret redaction for recorded call parameters

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const REDACTED: &str = "[REDACTED]";

/// Key fragments whose values are never recorded
pub const DEFAULT_REDACTED_KEYS: &[&str] = &[
    "password",
    "secret",
    "token",
    "api_key",
    "apikey",
    "authorization",
    "credential",
];

/// Replaces values under sensitive keys, at any depth.
///
/// A key matches when it contains any configured fragment, ignoring case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionPolicy {
    pub keys: Vec<String>,
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self {
            keys: DEFAULT_REDACTED_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl RedactionPolicy {
    pub fn new(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            keys: keys
                .into_iter()
                .map(|k| k.into().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        self.keys
            .iter()
            .any(|fragment| key.contains(&fragment.to_ascii_lowercase()))
    }

    pub fn redact(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| {
                        let v = if self.is_sensitive(k) {
                            Value::String(REDACTED.to_string())
                        } else {
                            self.redact(v)
                        };
                        (k.clone(), v)
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact(v)).collect()),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redacts_nested_keys_case_insensitively() {
        let policy = RedactionPolicy::default();
        let redacted = policy.redact(&json!({
            "query": "weather",
            "API_KEY": "abc",
            "auth": {"Authorization": "Bearer x", "user": "me"},
            "items": [{"db_password": "hunter2"}]
        }));
        assert_eq!(
            redacted,
            json!({
                "query": "weather",
                "API_KEY": "[REDACTED]",
                "auth": {"Authorization": "[REDACTED]", "user": "me"},
                "items": [{"db_password": "[REDACTED]"}]
            })
        );
    }

    #[test]
    fn test_custom_keys() {
        let policy = RedactionPolicy::new(["ssn"]);
        let redacted = policy.redact(&json!({"SSN": "1", "token": "t"}));
        assert_eq!(redacted, json!({"SSN": "[REDACTED]", "token": "t"}));
    }
}
