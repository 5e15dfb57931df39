//! Tool catalog entities

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a tool is reached when a script calls it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    /// Out-of-process worker reached over a transport; gets full resilience
    RemoteWorker,
    /// In-process function; invoked directly with only the per-call timeout
    LocalFunction,
    /// Another agent the call is handed to; gets full resilience
    DelegatedAgent,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::RemoteWorker => "remote-worker",
            ToolKind::LocalFunction => "local-function",
            ToolKind::DelegatedAgent => "delegated-agent",
        }
    }

    /// Whether calls of this kind go through the idempotency cache,
    /// circuit breaker and retry loop
    pub fn is_resilient(&self) -> bool {
        !matches!(self, ToolKind::LocalFunction)
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote-worker" => Ok(ToolKind::RemoteWorker),
            "local-function" => Ok(ToolKind::LocalFunction),
            "delegated-agent" => Ok(ToolKind::DelegatedAgent),
            other => Err(format!("unknown tool kind '{}'", other)),
        }
    }
}

/// JSON type a tool parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }

    /// Whether `value` is acceptable for this type.
    ///
    /// An empty Lua table converts to an empty JSON array or object depending
    /// on context, so either empty container satisfies `object` and `array`.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ParamType::String, Value::String(_)) => true,
            (ParamType::Number, Value::Number(_)) => true,
            (ParamType::Boolean, Value::Bool(_)) => true,
            (ParamType::Object, Value::Object(_)) => true,
            (ParamType::Array, Value::Array(_)) => true,
            (ParamType::Object, Value::Array(items)) => items.is_empty(),
            (ParamType::Array, Value::Object(map)) => map.is_empty(),
            _ => false,
        }
    }

    /// Whether a value of this type is a Lua table
    pub fn is_container(&self) -> bool {
        matches!(self, ParamType::Object | ParamType::Array)
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameter specification for a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    /// Parameter name
    pub name: String,
    /// Accepted JSON type
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    /// Parameter description
    #[serde(default)]
    pub description: String,
    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,
    /// Value used when an optional parameter is not supplied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            param_type: ParamType::String,
            description: description.into(),
            required,
            default: None,
        }
    }

    pub fn with_type(mut self, param_type: ParamType) -> Self {
        self.param_type = param_type;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Definition of a tool that scripts can call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Name of the tool, unique within its domain (e.g., "get_weather")
    pub name: String,
    /// Namespace used for stub modules and resilience bucketing
    pub domain: String,
    pub kind: ToolKind,
    #[serde(default)]
    pub description: String,
    /// Parameters in declared (positional) order
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
    /// Usage snippets shown alongside the signature
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

impl ToolDefinition {
    pub fn new(
        domain: impl Into<String>,
        name: impl Into<String>,
        kind: ToolKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            kind,
            description: description.into(),
            parameters: Vec::new(),
            examples: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, param: ToolParameter) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    /// `domain.name`, the key used by the catalog, breaker and cache
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.domain, self.name)
    }

    pub fn parameter(&self, name: &str) -> Option<&ToolParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Structural checks performed when the tool joins a catalog
    pub fn check(&self) -> Result<(), DomainError> {
        let invalid = |reason: &str| DomainError::InvalidTool {
            tool: self.qualified_name(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("tool name must not be empty"));
        }
        if !is_domain_name(&self.domain) {
            return Err(invalid(
                "domain must be non-empty and use only letters, digits and '_'",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for param in &self.parameters {
            if param.name.is_empty() {
                return Err(invalid("parameter name must not be empty"));
            }
            if param.name.starts_with('_') {
                return Err(invalid("parameter names starting with '_' are reserved"));
            }
            if !seen.insert(param.name.as_str()) {
                return Err(DomainError::DuplicateParameter {
                    tool: self.qualified_name(),
                    parameter: param.name.clone(),
                });
            }
            if let Some(default) = &param.default {
                if param.required {
                    return Err(invalid(&format!(
                        "required parameter '{}' cannot declare a default",
                        param.name
                    )));
                }
                if !param.param_type.accepts(default) {
                    return Err(invalid(&format!(
                        "default for '{}' is not a {}",
                        param.name, param.param_type
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Domains become part of a `tools.<domain>` module path
pub fn is_domain_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
