//! Idempotency keys and cached results

use crate::core::canonical::{canonical_json, sha256_hex};
use crate::core::error::DomainError;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Longest explicit key accepted, in characters
pub const MAX_KEY_LEN: usize = 256;

/// Prefix reserved for derived keys
const DERIVED_PREFIX: &str = "derived:";

/// Identifies a logically repeatable call
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Caller-supplied key: 1..=256 characters, no control characters and
    /// not starting with the reserved `derived:` prefix
    pub fn explicit(key: impl Into<String>) -> Result<Self, DomainError> {
        let key = key.into();
        let len = key.chars().count();
        if len == 0 || len > MAX_KEY_LEN {
            return Err(DomainError::InvalidIdempotencyKey(format!(
                "key must be 1..={} characters, got {}",
                MAX_KEY_LEN, len
            )));
        }
        if key.chars().any(char::is_control) {
            return Err(DomainError::InvalidIdempotencyKey(
                "key must not contain control characters".to_string(),
            ));
        }
        if key.starts_with(DERIVED_PREFIX) {
            return Err(DomainError::InvalidIdempotencyKey(format!(
                "key must not start with the reserved prefix '{}'",
                DERIVED_PREFIX
            )));
        }
        Ok(Self(key))
    }

    /// Key derived from the qualified tool name and canonical parameters.
    ///
    /// The `derived:` prefix keeps derived keys disjoint from explicit ones.
    pub fn derive(qualified_tool: &str, parameters: &Value) -> Self {
        let material = format!("{}\n{}", qualified_tool, canonical_json(parameters));
        Self(format!("{}{}", DERIVED_PREFIX, sha256_hex(material.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_derived(&self) -> bool {
        self.0.starts_with(DERIVED_PREFIX)
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A successful result stored under an idempotency key
#[derive(Debug, Clone, PartialEq)]
pub struct IdempotencyEntry {
    pub result: Value,
    pub stored_at: Instant,
}

impl IdempotencyEntry {
    pub fn new(result: Value, stored_at: Instant) -> Self {
        Self { result, stored_at }
    }

    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= ttl
    }
}
