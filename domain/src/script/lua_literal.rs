//! Rendering JSON values as Lua source literals

use crate::core::string::is_lua_identifier;
use serde_json::Value;

/// Lua expression that evaluates to `value`. `null` becomes `nil`.
pub fn to_lua_literal(value: &Value) -> String {
    match value {
        Value::Null => "nil".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            if items.is_empty() {
                return "{}".to_string();
            }
            let parts: Vec<String> = items.iter().map(to_lua_literal).collect();
            format!("{{ {} }}", parts.join(", "))
        }
        Value::Object(map) => {
            if map.is_empty() {
                return "{}".to_string();
            }
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{} = {}", table_key(k), to_lua_literal(&map[k.as_str()])))
                .collect();
            format!("{{ {} }}", parts.join(", "))
        }
    }
}

/// Double-quoted Lua string literal
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\{:03}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Key inside a table constructor: `name` or `["not an identifier"]`
pub fn table_key(key: &str) -> String {
    if is_lua_identifier(key) {
        key.to_string()
    } else {
        format!("[{}]", quote(key))
    }
}

/// Field access on `base`: `base.name` or `base["not an identifier"]`
pub fn field_access(base: &str, key: &str) -> String {
    if is_lua_identifier(key) {
        format!("{}.{}", base, key)
    } else {
        format!("{}[{}]", base, quote(key))
    }
}
