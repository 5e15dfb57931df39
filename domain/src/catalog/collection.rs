//! Named, versioned collection of tool definitions

use super::entities::ToolDefinition;
use crate::core::canonical::{canonical_json, sha256_hex};
use crate::core::error::DomainError;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Collection of tools keyed by qualified name (`domain.name`).
///
/// Read-only once handed to an executor; swapping in a new catalog replaces
/// the whole value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCatalog {
    name: String,
    version: String,
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolCatalog {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            tools: BTreeMap::new(),
        }
    }

    /// Add a tool (builder pattern)
    pub fn with_tool(mut self, tool: ToolDefinition) -> Result<Self, DomainError> {
        self.insert(tool)?;
        Ok(self)
    }

    pub fn insert(&mut self, tool: ToolDefinition) -> Result<(), DomainError> {
        tool.check()?;
        let key = tool.qualified_name();
        if self.tools.contains_key(&key) {
            return Err(DomainError::DuplicateTool {
                domain: tool.domain,
                name: tool.name,
            });
        }
        self.tools.insert(key, tool);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn get(&self, domain: &str, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(&format!("{}.{}", domain, name))
    }

    pub fn get_qualified(&self, qualified: &str) -> Option<&ToolDefinition> {
        self.tools.get(qualified)
    }

    /// All tools, ordered by qualified name
    pub fn all(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.values()
    }

    /// Tools of one domain, ordered by name
    pub fn tools_in<'a>(&'a self, domain: &'a str) -> impl Iterator<Item = &'a ToolDefinition> {
        self.tools.values().filter(move |t| t.domain == domain)
    }

    /// Distinct domains in sorted order
    pub fn domains(&self) -> Vec<&str> {
        let mut domains: Vec<&str> = self.tools.values().map(|t| t.domain.as_str()).collect();
        domains.dedup();
        domains
    }

    pub fn has_domain(&self, domain: &str) -> bool {
        self.tools.values().any(|t| t.domain == domain)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// SHA-256 over the canonical JSON of the whole catalog.
    ///
    /// Equal catalogs hash equally regardless of insertion order, which is
    /// what stub caches key on.
    pub fn content_hash(&self) -> String {
        let tools: Vec<Value> = self
            .tools
            .values()
            .map(|t| serde_json::to_value(t).unwrap_or(Value::Null))
            .collect();
        let doc = json!({
            "name": self.name,
            "version": self.version,
            "tools": tools,
        });
        sha256_hex(canonical_json(&doc).as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::entities::{ToolKind, ToolParameter};

    fn tool(domain: &str, name: &str) -> ToolDefinition {
        ToolDefinition::new(domain, name, ToolKind::RemoteWorker, "test tool")
            .with_parameter(ToolParameter::new("q", "query", true))
    }

    #[test]
    fn test_insert_and_lookup() {
        let catalog = ToolCatalog::new("demo", "1")
            .with_tool(tool("weather", "get_weather"))
            .unwrap()
            .with_tool(tool("search", "query"))
            .unwrap();

        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("weather", "get_weather").is_some());
        assert!(catalog.get_qualified("search.query").is_some());
        assert!(catalog.get("weather", "query").is_none());
        assert_eq!(catalog.domains(), vec!["search", "weather"]);
    }

    #[test]
    fn test_same_name_in_different_domains() {
        let catalog = ToolCatalog::new("demo", "1")
            .with_tool(tool("a", "lookup"))
            .unwrap()
            .with_tool(tool("b", "lookup"))
            .unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_duplicate_tool_rejected() {
        let result = ToolCatalog::new("demo", "1")
            .with_tool(tool("a", "lookup"))
            .unwrap()
            .with_tool(tool("a", "lookup"));
        assert!(matches!(result, Err(DomainError::DuplicateTool { .. })));
    }

    #[test]
    fn test_content_hash_ignores_insertion_order() {
        let a = ToolCatalog::new("demo", "1")
            .with_tool(tool("x", "one"))
            .unwrap()
            .with_tool(tool("y", "two"))
            .unwrap();
        let b = ToolCatalog::new("demo", "1")
            .with_tool(tool("y", "two"))
            .unwrap()
            .with_tool(tool("x", "one"))
            .unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }

    #[test]
    fn test_content_hash_changes_with_version() {
        let a = ToolCatalog::new("demo", "1").with_tool(tool("x", "one")).unwrap();
        let b = ToolCatalog::new("demo", "2").with_tool(tool("x", "one")).unwrap();
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
