//! Conversions between Lua values and JSON.
//!
//! Tool parameters and results cross the VM boundary as `serde_json::Value`.
//! JSON `null` nested in a document becomes `json.null` so keys and array
//! slots survive the trip; a top-level `null` becomes `nil`.

use mlua::SerializeOptions;
use mlua::prelude::*;
use serde_json::{Map, Number, Value};

/// Lua value to JSON.
///
/// `nil` and `json.null` are `null` at any depth. A table with a sequence
/// part (or the array marker) is an array, anything else an object with
/// string keys; integer keys of an object are written as strings. Host-only
/// values (functions, coroutines, userdata) become `null` in arrays and are
/// left out of objects. Cyclic tables are rejected.
pub fn to_json(lua: &Lua, value: LuaValue) -> LuaResult<Value> {
    let array_marker = lua.array_metatable();
    let mut path = Vec::new();
    convert(&array_marker, &mut path, value).map(|json| json.unwrap_or(Value::Null))
}

/// `None` for values with no JSON form.
fn convert(
    array_marker: &LuaTable,
    path: &mut Vec<*const std::ffi::c_void>,
    value: LuaValue,
) -> LuaResult<Option<Value>> {
    let json = match value {
        LuaValue::Nil => Value::Null,
        LuaValue::LightUserData(ud) if ud.0.is_null() => Value::Null,
        LuaValue::Boolean(b) => Value::Bool(b),
        LuaValue::Integer(n) => Value::from(n),
        LuaValue::Number(n) => Number::from_f64(n).map_or(Value::Null, Value::Number),
        LuaValue::String(s) => Value::String(s.to_string_lossy().to_string()),
        LuaValue::Table(table) => {
            let pointer = table.to_pointer();
            if path.contains(&pointer) {
                return Err(LuaError::external("recursive table detected"));
            }
            path.push(pointer);
            let json = convert_table(array_marker, path, table);
            path.pop();
            json?
        }
        _ => return Ok(None),
    };
    Ok(Some(json))
}

fn convert_table(
    array_marker: &LuaTable,
    path: &mut Vec<*const std::ffi::c_void>,
    table: LuaTable,
) -> LuaResult<Value> {
    let is_array = table.raw_len() > 0 || table.metatable().as_ref() == Some(array_marker);
    if is_array {
        let mut items = Vec::with_capacity(table.raw_len());
        for item in table.sequence_values::<LuaValue>() {
            items.push(convert(array_marker, path, item?)?.unwrap_or(Value::Null));
        }
        return Ok(Value::Array(items));
    }

    let mut object = Map::new();
    for pair in table.pairs::<LuaValue, LuaValue>() {
        let (key, value) = pair?;
        let key = match key {
            LuaValue::String(s) => s.to_string_lossy().to_string(),
            LuaValue::Integer(n) => n.to_string(),
            _ => continue,
        };
        if let Some(value) = convert(array_marker, path, value)? {
            object.insert(key, value);
        }
    }
    Ok(Value::Object(object))
}

/// JSON to Lua. A top-level `null` is `nil`.
pub fn to_lua(lua: &Lua, value: &Value) -> LuaResult<LuaValue> {
    if value.is_null() {
        return Ok(LuaValue::Nil);
    }
    lua.to_value_with(value, SerializeOptions::new())
}

/// Text for one `print` argument: tables as JSON, the rest like `tostring`.
pub fn display(lua: &Lua, value: LuaValue) -> String {
    match value {
        LuaValue::Nil => "nil".to_string(),
        LuaValue::Boolean(b) => b.to_string(),
        LuaValue::Integer(n) => n.to_string(),
        LuaValue::Number(n) => format_number(n),
        LuaValue::String(s) => s.to_string_lossy().to_string(),
        LuaValue::Table(_) => match to_json(lua, value) {
            Ok(json) => json.to_string(),
            Err(_) => "<table>".to_string(),
        },
        LuaValue::LightUserData(ud) if ud.0.is_null() => "null".to_string(),
        other => format!("<{}>", other.type_name()),
    }
}

/// Lua prints floats with integral values as `2.0`
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.1}", n)
    } else {
        n.to_string()
    }
}
