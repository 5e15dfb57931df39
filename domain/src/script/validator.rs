//! Static policy checks for scripts.
//!
//! Works on the token stream only. A script that passes may still fail at
//! runtime; a script that fails never runs.

use super::lexer::{Token, TokenKind, tokenize};
use crate::catalog::entities::is_domain_name;

/// Prefix every importable module shares
pub const MODULE_PREFIX: &str = "tools.";

/// Globals a script may never reference
pub const FORBIDDEN_GLOBALS: &[&str] = &[
    "load",
    "loadstring",
    "dofile",
    "loadfile",
    "os",
    "io",
    "debug",
    "package",
    "coroutine",
    "collectgarbage",
    "getmetatable",
    "setmetatable",
    "rawget",
    "rawset",
    "rawequal",
    "rawlen",
    "_G",
    "_ENV",
    "module",
    "setfenv",
    "getfenv",
    "newproxy",
];

/// Default cap on script size
pub const DEFAULT_MAX_SCRIPT_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityViolation {
    pub reason: String,
    pub line: Option<usize>,
}

impl std::fmt::Display for SecurityViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: {}", line, self.reason),
            None => write!(f, "{}", self.reason),
        }
    }
}

impl std::error::Error for SecurityViolation {}

impl SecurityViolation {
    pub fn new(reason: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            reason: reason.into(),
            line,
        }
    }
}

/// A script that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedScript {
    /// Domains named by `require("tools.<domain>")`, in first-use order
    pub imports: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ScriptValidator {
    max_script_bytes: usize,
}

impl Default for ScriptValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SCRIPT_BYTES)
    }
}

impl ScriptValidator {
    pub fn new(max_script_bytes: usize) -> Self {
        Self { max_script_bytes }
    }

    pub fn max_script_bytes(&self) -> usize {
        self.max_script_bytes
    }

    pub fn validate(&self, script: &str) -> Result<ValidatedScript, SecurityViolation> {
        if script.len() > self.max_script_bytes {
            return Err(SecurityViolation::new(
                format!(
                    "script is {} bytes, limit is {}",
                    script.len(),
                    self.max_script_bytes
                ),
                None,
            ));
        }

        let tokens = tokenize(script).map_err(|e| {
            SecurityViolation::new(format!("malformed script: {}", e.message), Some(e.line))
        })?;

        let mut imports: Vec<String> = Vec::new();
        let mut brace_depth = 0usize;

        for (i, token) in tokens.iter().enumerate() {
            let prev = i.checked_sub(1).and_then(|p| tokens.get(p));
            let next = tokens.get(i + 1);

            match &token.kind {
                TokenKind::Symbol("{") => brace_depth += 1,
                TokenKind::Symbol("}") => brace_depth = brace_depth.saturating_sub(1),
                TokenKind::Symbol("[") => check_string_index(&tokens, i)?,
                TokenKind::Name(name) => {
                    if name.starts_with("__") {
                        return Err(violation(
                            token,
                            format!("reflective name '{}' is not allowed", name),
                        ));
                    }

                    let is_field = prev.is_some_and(|p| p.is_symbol(".") || p.is_symbol(":"));
                    if is_field {
                        if name == "dump" {
                            return Err(violation(token, "access to 'dump' is not allowed"));
                        }
                        continue;
                    }

                    if FORBIDDEN_GLOBALS.contains(&name.as_str()) {
                        let is_constructor_key = brace_depth > 0
                            && next.is_some_and(|n| n.is_symbol("="))
                            && prev.is_some_and(|p| {
                                p.is_symbol("{") || p.is_symbol(",") || p.is_symbol(";")
                            });
                        if !is_constructor_key {
                            return Err(violation(
                                token,
                                format!("use of '{}' is not allowed", name),
                            ));
                        }
                        continue;
                    }

                    match name.as_str() {
                        "require" => {
                            let domain = require_target(&tokens, i)?;
                            if !imports.contains(&domain) {
                                imports.push(domain);
                            }
                        }
                        "scratch" => check_scratch_path(&tokens, i)?,
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        Ok(ValidatedScript { imports })
    }
}

fn violation(token: &Token, reason: impl Into<String>) -> SecurityViolation {
    SecurityViolation::new(reason, Some(token.line))
}

/// `t["__index"]` and `{ ["__gc"] = f }` reach metamethods by string
fn check_string_index(tokens: &[Token], i: usize) -> Result<(), SecurityViolation> {
    if let (Some(key), Some(close)) = (tokens.get(i + 1), tokens.get(i + 2))
        && let Some(s) = key.string()
        && close.is_symbol("]")
        && s.starts_with("__")
    {
        return Err(violation(
            key,
            format!("reflective index '{}' is not allowed", s),
        ));
    }
    Ok(())
}

/// Accepts `require("tools.x")` and `require "tools.x"`; returns the domain
fn require_target(tokens: &[Token], i: usize) -> Result<String, SecurityViolation> {
    let token = &tokens[i];
    let literal = match (tokens.get(i + 1), tokens.get(i + 2), tokens.get(i + 3)) {
        (Some(open), Some(arg), Some(close))
            if open.is_symbol("(") && close.is_symbol(")") && arg.string().is_some() =>
        {
            arg.string()
        }
        (Some(arg), _, _) => arg.string(),
        _ => None,
    };
    let Some(module) = literal else {
        return Err(violation(
            token,
            "require must be called with a single string literal",
        ));
    };

    match module.strip_prefix(MODULE_PREFIX) {
        Some(domain) if is_domain_name(domain) => Ok(domain.to_string()),
        _ => Err(violation(
            token,
            format!(
                "module '{}' is not allowed; only '{}<domain>' can be required",
                module, MODULE_PREFIX
            ),
        )),
    }
}

/// Literal paths passed to `scratch.read/write/exists` stay inside the
/// scratch directory
fn check_scratch_path(tokens: &[Token], i: usize) -> Result<(), SecurityViolation> {
    let (Some(dot), Some(_method), Some(open), Some(arg)) = (
        tokens.get(i + 1),
        tokens.get(i + 2),
        tokens.get(i + 3),
        tokens.get(i + 4),
    ) else {
        return Ok(());
    };
    if !dot.is_symbol(".") || !open.is_symbol("(") {
        return Ok(());
    }
    if let Some(path) = arg.string()
        && !is_relative_inside(path)
    {
        return Err(violation(
            arg,
            format!("scratch path '{}' escapes the scratch directory", path),
        ));
    }
    Ok(())
}

/// Relative, with no `..` component
pub fn is_relative_inside(path: &str) -> bool {
    if path.starts_with('/') || path.starts_with('\\') {
        return false;
    }
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        return false;
    }
    !path.split(['/', '\\']).any(|part| part == "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(script: &str) -> Result<ValidatedScript, SecurityViolation> {
        ScriptValidator::default().validate(script)
    }

    #[test]
    fn test_allow_listed_script_passes() {
        let script = r#"
            local weather = require("tools.weather")
            local search = require "tools.search"
            local results = {}
            for _, city in ipairs({"NYC", "SF"}) do
              results[#results + 1] = weather.get_weather{ location = city }
            end
            print(json.encode(results))
            return #results
        "#;
        let validated = validate(script).unwrap();
        assert_eq!(validated.imports, vec!["weather", "search"]);
    }

    #[test]
    fn test_forbidden_globals_rejected() {
        for script in [
            "os.execute('ls')",
            "local f = io.open('/etc/passwd')",
            "load('return 1')()",
            "local g = _G",
            "setmetatable({}, {})",
            "local x = rawget(t, 1)",
            "coroutine.wrap(f)",
        ] {
            let err = validate(script).unwrap_err();
            assert!(err.reason.contains("is not allowed"), "{script}: {err}");
            assert_eq!(err.line, Some(1));
        }
    }

    #[test]
    fn test_forbidden_names_as_fields_and_keys_are_fine() {
        assert!(validate("local t = { os = 'linux', io = 1 }\nprint(t.os, t.load)").is_ok());
        assert!(validate("local t = {}\nt.debug = true").is_ok());
    }

    #[test]
    fn test_string_dump_rejected() {
        assert!(validate("local d = string.dump(f)").is_err());
        assert!(validate("local d = ('x'):dump()").is_err());
    }

    #[test]
    fn test_dunder_access_rejected() {
        assert!(validate("local mt = t.__index").is_err());
        assert!(validate("local mt = t['__index']").is_err());
        assert!(validate("local t = { ['__gc'] = f }").is_err());
        assert!(validate("local __x = 1").is_err());
        // A string mentioning a dunder outside an index is just data
        assert!(validate("print('__index')").is_ok());
    }

    #[test]
    fn test_require_rules() {
        assert!(validate("local m = require(name)").is_err());
        assert!(validate("local r = require").is_err());
        assert!(validate("require('socket')").is_err());
        assert!(validate("require('tools.')").is_err());
        assert!(validate("require('tools.a.b')").is_err());
        assert!(validate("require([[tools.weather]])").is_ok());
    }

    #[test]
    fn test_scratch_paths() {
        assert!(validate("scratch.write('notes/a.txt', 'x')").is_ok());
        assert!(validate("scratch.read('/etc/passwd')").is_err());
        assert!(validate("scratch.read('../outside')").is_err());
        assert!(validate("scratch.read('a/../../b')").is_err());
        assert!(validate("scratch.read('C:\\\\x')").is_err());
    }

    #[test]
    fn test_size_limit_and_malformed_tokens() {
        let validator = ScriptValidator::new(8);
        let err = validator.validate("print('too long')").unwrap_err();
        assert!(err.reason.contains("limit is 8"));

        let err = validate("print('x)").unwrap_err();
        assert!(err.reason.contains("malformed script"));
    }

    #[test]
    fn test_comments_do_not_trigger_rules() {
        assert!(validate("-- os.exit() is not called here\nreturn 1").is_ok());
    }

    #[test]
    fn test_violation_display_includes_line() {
        let err = validate("local a = 1\nos.exit()").unwrap_err();
        assert_eq!(err.to_string(), "line 2: use of 'os' is not allowed");
    }
}
