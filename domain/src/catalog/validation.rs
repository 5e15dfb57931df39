//! Argument validation against tool definitions
//!
//! Pure domain logic: no I/O. The router runs this before any worker is
//! contacted.

use super::entities::ToolDefinition;
use serde_json::{Map, Value};

/// Validator for tool call arguments
pub trait ArgumentValidator {
    /// Validate arguments against the tool's declared parameters
    fn validate(&self, definition: &ToolDefinition, arguments: &Map<String, Value>)
    -> Result<(), String>;
}

/// Checks required parameters, unknown parameters and declared types
#[derive(Debug, Clone, Default)]
pub struct DefaultArgumentValidator;

impl ArgumentValidator for DefaultArgumentValidator {
    fn validate(
        &self,
        definition: &ToolDefinition,
        arguments: &Map<String, Value>,
    ) -> Result<(), String> {
        for param in &definition.parameters {
            if param.required && !arguments.contains_key(&param.name) {
                return Err(format!(
                    "Missing required parameter '{}' for tool '{}'",
                    param.name, definition.name
                ));
            }
        }

        for (arg_name, value) in arguments {
            let Some(param) = definition.parameter(arg_name) else {
                return Err(format!(
                    "Unknown parameter '{}' for tool '{}'",
                    arg_name, definition.name
                ));
            };
            if !param.param_type.accepts(value) {
                return Err(format!(
                    "Parameter '{}' for tool '{}' expects {}, got {}",
                    arg_name,
                    definition.name,
                    param.param_type,
                    json_type_name(value)
                ));
            }
        }

        Ok(())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::entities::{ParamType, ToolKind, ToolParameter};
    use serde_json::json;

    fn definition() -> ToolDefinition {
        ToolDefinition::new("test", "test", ToolKind::RemoteWorker, "test tool")
            .with_parameter(ToolParameter::new("required_param", "A required param", true))
            .with_parameter(
                ToolParameter::new("count", "A number", false).with_type(ParamType::Number),
            )
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_validator_missing_required() {
        let result = DefaultArgumentValidator.validate(&definition(), &args(json!({})));
        assert!(result.unwrap_err().contains("Missing required parameter"));
    }

    #[test]
    fn test_validator_unknown_param() {
        let result = DefaultArgumentValidator.validate(
            &definition(),
            &args(json!({"required_param": "x", "unknown_param": "value"})),
        );
        assert!(result.unwrap_err().contains("Unknown parameter"));
    }

    #[test]
    fn test_validator_type_mismatch() {
        let result = DefaultArgumentValidator.validate(
            &definition(),
            &args(json!({"required_param": "x", "count": "three"})),
        );
        assert!(result.unwrap_err().contains("expects number, got string"));
    }

    #[test]
    fn test_validator_valid_call() {
        let result = DefaultArgumentValidator.validate(
            &definition(),
            &args(json!({"required_param": "x", "count": 3})),
        );
        assert!(result.is_ok());
    }
}
