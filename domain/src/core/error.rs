//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Duplicate tool '{name}' in domain '{domain}'")]
    DuplicateTool { domain: String, name: String },

    #[error("Tool '{tool}' declares parameter '{parameter}' more than once")]
    DuplicateParameter { tool: String, parameter: String },

    #[error("Invalid tool definition '{tool}': {reason}")]
    InvalidTool { tool: String, reason: String },

    #[error("Invalid idempotency key: {0}")]
    InvalidIdempotencyKey(String),

    #[error("Invalid execution state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

impl DomainError {
    /// Whether this error was raised while building a catalog
    pub fn is_catalog_error(&self) -> bool {
        matches!(
            self,
            DomainError::DuplicateTool { .. }
                | DomainError::DuplicateParameter { .. }
                | DomainError::InvalidTool { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_tool_display() {
        let error = DomainError::DuplicateTool {
            domain: "weather".to_string(),
            name: "get_weather".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Duplicate tool 'get_weather' in domain 'weather'"
        );
    }

    #[test]
    fn test_is_catalog_error() {
        assert!(
            DomainError::InvalidTool {
                tool: "x".to_string(),
                reason: "empty".to_string()
            }
            .is_catalog_error()
        );
        assert!(!DomainError::InvalidIdempotencyKey("".to_string()).is_catalog_error());
    }
}
