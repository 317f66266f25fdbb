//! Typed readers for schema facets.
//!
//! A facet holding JSON `null` reads as absent. A facet of the wrong JSON
//! type is an error rather than silently ignored.

use serde_json::{Map, Value};

use crate::error::ResolveError;
use crate::types::json_type_name;

fn lookup<'a>(schema: &'a Value, key: &str) -> Option<&'a Value> {
    schema.get(key).filter(|v| !v.is_null())
}

fn invalid(key: &str, expected: &'static str, actual: &Value) -> ResolveError {
    ResolveError::InvalidFacet {
        key: key.to_string(),
        expected,
        actual: json_type_name(actual),
    }
}

fn as_string<'a>(key: &str, value: Option<&'a Value>) -> Result<Option<&'a str>, ResolveError> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(invalid(key, "string", other)),
    }
}

fn as_boolean(key: &str, value: Option<&Value>) -> Result<Option<bool>, ResolveError> {
    match value {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(invalid(key, "boolean", other)),
    }
}

fn as_object<'a>(
    key: &str,
    value: Option<&'a Value>,
) -> Result<Option<&'a Map<String, Value>>, ResolveError> {
    match value {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(invalid(key, "object", other)),
    }
}

pub fn string<'a>(schema: &'a Value, key: &str) -> Result<Option<&'a str>, ResolveError> {
    as_string(key, lookup(schema, key))
}

pub fn boolean(schema: &Value, key: &str) -> Result<Option<bool>, ResolveError> {
    as_boolean(key, lookup(schema, key))
}

pub fn unsigned(schema: &Value, key: &str) -> Result<Option<u64>, ResolveError> {
    match lookup(schema, key) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| invalid(key, "non-negative integer", value)),
    }
}

pub fn object<'a>(
    schema: &'a Value,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ResolveError> {
    as_object(key, lookup(schema, key))
}

/// Read a list of strings, e.g. `required`.
pub fn string_list(schema: &Value, key: &str) -> Result<Vec<String>, ResolveError> {
    match lookup(schema, key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(String::from)
                    .ok_or_else(|| invalid(key, "list of strings", item))
            })
            .collect(),
        Some(other) => Err(invalid(key, "list of strings", other)),
    }
}

/// Find a facet declared on the schema itself or on one of its inline
/// `allOf` members, without following any `$ref`.
///
/// Later inline members win, matching the flattening precedence.
pub fn local<'a>(schema: &'a Value, key: &str) -> Option<&'a Value> {
    let mut found = None;
    if let Some(members) = schema.get("allOf").and_then(Value::as_array) {
        for member in members {
            if member.get("$ref").is_some() {
                continue;
            }
            if let Some(value) = local(member, key) {
                found = Some(value);
            }
        }
    }
    if schema.get("$ref").is_none() {
        if let Some(value) = lookup(schema, key) {
            found = Some(value);
        }
    }
    found
}

pub fn local_string<'a>(schema: &'a Value, key: &str) -> Result<Option<&'a str>, ResolveError> {
    as_string(key, local(schema, key))
}

pub fn local_boolean(schema: &Value, key: &str) -> Result<Option<bool>, ResolveError> {
    as_boolean(key, local(schema, key))
}

pub fn local_object<'a>(
    schema: &'a Value,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ResolveError> {
    as_object(key, local(schema, key))
}
