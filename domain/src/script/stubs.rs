//! Stub generation: one Lua module per catalog domain.
//!
//! Each stub only shapes its arguments into a parameter table and hands it
//! to `route(domain, tool, params, idempotency_key)`, the function the
//! runtime passes to the module chunk. Output depends only on the catalog,
//! so the same catalog always yields byte-identical source.

use super::lua_literal::{field_access, quote, to_lua_literal};
use super::validator::MODULE_PREFIX;
use crate::catalog::collection::ToolCatalog;
use crate::catalog::entities::{ToolDefinition, ToolParameter};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Reserved named argument carrying an explicit idempotency key
pub const IDEMPOTENCY_ARG: &str = "_idempotency_key";

/// Argument binding shared by every stub in a module.
///
/// `table_first` is set when the first parameter is itself a table, so a
/// single table argument is positional rather than named.
const BIND_HELPER: &str = r##"local function bind(tool, order, table_first, ...)
  local count = select("#", ...)
  local first = ...
  local args = {}
  if count == 1 and type(first) == "table" and not table_first then
    local known = {}
    for _, name in ipairs(order) do
      known[name] = true
    end
    for key, value in pairs(first) do
      if key ~= "_idempotency_key" and not known[key] then
        error(tool .. ": unknown parameter '" .. tostring(key) .. "'", 3)
      end
      args[key] = value
    end
    return args
  end
  if count > #order then
    local extra = select(#order + 1, ...)
    if count > #order + 1 or type(extra) ~= "table" or extra._idempotency_key == nil then
      error(tool .. ": expected at most " .. #order .. " arguments, got " .. count, 3)
    end
    args._idempotency_key = extra._idempotency_key
  end
  for i = 1, math.min(count, #order) do
    args[order[i]] = (select(i, ...))
  end
  return args
end
"##;

/// Generated source for one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubModule {
    pub domain: String,
    /// `tools.<domain>`
    pub module_name: String,
    pub source: String,
    /// Tool names in emitted order
    pub tools: Vec<String>,
    signatures: Vec<String>,
}

/// All stub modules generated from one catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubBundle {
    pub catalog_hash: String,
    modules: BTreeMap<String, StubModule>,
}

impl StubBundle {
    pub fn module(&self, domain: &str) -> Option<&StubModule> {
        self.modules.get(domain)
    }

    pub fn modules(&self) -> impl Iterator<Item = &StubModule> {
        self.modules.values()
    }

    pub fn domains(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    /// Planner-facing listing for one domain: a line per tool, plus examples
    pub fn signatures(&self, domain: &str) -> Option<String> {
        let module = self.modules.get(domain)?;
        let mut out = format!("-- {}\n", module.module_name);
        for line in &module.signatures {
            out.push_str(line);
            out.push('\n');
        }
        Some(out)
    }

    /// One line per domain with its tool names
    pub fn index(&self) -> String {
        let mut out = String::new();
        for module in self.modules.values() {
            let _ = writeln!(
                out,
                "{} ({} tool{}): {}",
                module.module_name,
                module.tools.len(),
                if module.tools.len() == 1 { "" } else { "s" },
                module.tools.join(", ")
            );
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StubGenerator;

impl StubGenerator {
    pub fn generate(catalog: &ToolCatalog) -> StubBundle {
        let catalog_hash = catalog.content_hash();
        let modules = catalog
            .domains()
            .into_iter()
            .map(|domain| {
                let tools: Vec<&ToolDefinition> = catalog.tools_in(domain).collect();
                (domain.to_string(), render_module(catalog, domain, &tools))
            })
            .collect();
        StubBundle {
            catalog_hash,
            modules,
        }
    }
}

fn render_module(catalog: &ToolCatalog, domain: &str, tools: &[&ToolDefinition]) -> StubModule {
    let module_name = format!("{}{}", MODULE_PREFIX, domain);
    let mut source = String::new();
    let _ = writeln!(
        source,
        "-- {}: generated from catalog {} {}",
        module_name,
        catalog.name(),
        catalog.version()
    );
    source.push_str("local route = ...\nlocal M = {}\n\n");
    source.push_str(BIND_HELPER);

    for tool in tools {
        source.push('\n');
        render_stub(&mut source, tool);
    }
    source.push_str("\nreturn M\n");

    StubModule {
        domain: domain.to_string(),
        module_name,
        source,
        tools: tools.iter().map(|t| t.name.clone()).collect(),
        signatures: tools.iter().flat_map(|t| signature_lines(t)).collect(),
    }
}

fn render_stub(out: &mut String, tool: &ToolDefinition) {
    let _ = writeln!(out, "-- {}", signature(tool));
    for line in tool.description.lines().filter(|l| !l.trim().is_empty()) {
        let _ = writeln!(out, "--   {}", line.trim());
    }

    let target = field_access("M", &tool.name);
    let _ = writeln!(out, "{} = function(...)", target);

    let order: Vec<String> = tool.parameters.iter().map(|p| quote(&p.name)).collect();
    let table_first = tool
        .parameters
        .first()
        .is_some_and(|p| p.param_type.is_container());
    let _ = writeln!(
        out,
        "  local args = bind({}, {{ {} }}, {}, ...)",
        quote(&tool.name),
        order.join(", "),
        table_first
    );
    out.push_str("  local params = {}\n");

    for param in &tool.parameters {
        render_param(out, tool, param);
    }

    let _ = writeln!(
        out,
        "  return route({}, {}, params, args.{})",
        quote(&tool.domain),
        quote(&tool.name),
        IDEMPOTENCY_ARG
    );
    out.push_str("end\n");
}

fn render_param(out: &mut String, tool: &ToolDefinition, param: &ToolParameter) {
    let arg = field_access("args", &param.name);
    let slot = field_access("params", &param.name);

    if param.required {
        let message = format!("{}: missing required parameter '{}'", tool.name, param.name);
        let _ = writeln!(out, "  if {} == nil then", arg);
        let _ = writeln!(out, "    error({}, 2)", quote(&message));
        out.push_str("  end\n");
        let _ = writeln!(out, "  {} = {}", slot, arg);
    } else if let Some(default) = param.default.as_ref().filter(|d| !d.is_null()) {
        let _ = writeln!(out, "  if {} == nil then", arg);
        let _ = writeln!(out, "    {} = {}", slot, to_lua_literal(default));
        out.push_str("  else\n");
        let _ = writeln!(out, "    {} = {}", slot, arg);
        out.push_str("  end\n");
    } else {
        let _ = writeln!(out, "  {} = {}", slot, arg);
    }
}

/// `name(a: string, b?: number = 3)`
pub fn signature(tool: &ToolDefinition) -> String {
    let params: Vec<String> = tool
        .parameters
        .iter()
        .map(|p| {
            let mut s = format!(
                "{}{}: {}",
                p.name,
                if p.required { "" } else { "?" },
                p.param_type
            );
            if let Some(default) = &p.default {
                let _ = write!(s, " = {}", default);
            }
            s
        })
        .collect();
    format!("{}({})", tool.name, params.join(", "))
}

fn signature_lines(tool: &ToolDefinition) -> Vec<String> {
    let summary = tool.description.lines().next().unwrap_or("").trim();
    let mut lines = vec![if summary.is_empty() {
        signature(tool)
    } else {
        format!("{}  -- {}", signature(tool), summary)
    }];
    lines.extend(
        tool.examples
            .iter()
            .map(|example| format!("    example: {}", example)),
    );
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::entities::{ParamType, ToolKind};

    fn catalog() -> ToolCatalog {
        ToolCatalog::new("demo", "1")
            .with_tool(
                ToolDefinition::new(
                    "weather",
                    "get_weather",
                    ToolKind::RemoteWorker,
                    "Current weather\nfor one location",
                )
                .with_parameter(ToolParameter::new("location", "City", true))
                .with_parameter(ToolParameter::new("units", "Units", false).with_default("metric"))
                .with_example("weather.get_weather{ location = \"NYC\" }"),
            )
            .unwrap()
            .with_tool(
                ToolDefinition::new("weather", "get-forecast", ToolKind::RemoteWorker, "")
                    .with_parameter(
                        ToolParameter::new("days", "", false).with_type(ParamType::Number),
                    ),
            )
            .unwrap()
            .with_tool(
                ToolDefinition::new("docs", "index", ToolKind::LocalFunction, "Index docs")
                    .with_parameter(
                        ToolParameter::new("records", "", true).with_type(ParamType::Array),
                    ),
            )
            .unwrap()
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = StubGenerator::generate(&catalog());
        let b = StubGenerator::generate(&catalog());
        assert_eq!(a, b);
        assert_eq!(a.domains(), vec!["docs", "weather"]);
    }

    #[test]
    fn test_module_shape() {
        let bundle = StubGenerator::generate(&catalog());
        let module = bundle.module("weather").unwrap();
        assert_eq!(module.module_name, "tools.weather");
        assert_eq!(module.tools, vec!["get-forecast", "get_weather"]);

        let src = &module.source;
        assert!(src.starts_with("-- tools.weather: generated from catalog demo 1\n"));
        assert!(src.contains("local route = ...\n"));
        assert!(src.contains("M.get_weather = function(...)\n"));
        assert!(src.contains("M[\"get-forecast\"] = function(...)\n"));
        assert!(src.contains("error(\"get_weather: missing required parameter 'location'\", 2)"));
        assert!(src.contains("    params.units = \"metric\"\n"));
        assert!(src.contains("  params.days = args.days\n"));
        assert!(src.contains(
            "  return route(\"weather\", \"get_weather\", params, args._idempotency_key)\n"
        ));
        assert!(src.ends_with("return M\n"));
    }

    #[test]
    fn test_every_module_embeds_the_binding_helper() {
        let bundle = StubGenerator::generate(&catalog());
        for module in bundle.modules() {
            assert!(module.source.contains(BIND_HELPER), "{}", module.module_name);
        }
        // argument counting must see trailing nils
        assert!(BIND_HELPER.contains("local count = select(\"#\", ...)\n"));
        assert!(BIND_HELPER.ends_with("  return args\nend\n"));
    }

    #[test]
    fn test_table_first_parameter_is_positional() {
        let bundle = StubGenerator::generate(&catalog());
        let src = &bundle.module("docs").unwrap().source;
        assert!(src.contains("bind(\"index\", { \"records\" }, true, ...)"));
    }

    #[test]
    fn test_signatures_and_index() {
        let bundle = StubGenerator::generate(&catalog());
        let listing = bundle.signatures("weather").unwrap();
        assert!(listing.contains(
            "get_weather(location: string, units?: string = \"metric\")  -- Current weather"
        ));
        assert!(listing.contains("get-forecast(days?: number)\n"));
        assert!(listing.contains("    example: weather.get_weather{ location = \"NYC\" }"));
        assert!(bundle.signatures("missing").is_none());

        assert_eq!(
            bundle.index(),
            "tools.docs (1 tool): index\ntools.weather (2 tools): get-forecast, get_weather\n"
        );
    }
}
